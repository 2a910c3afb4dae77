use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use img_yasuo::png_pipeline::compress_png;
use img_yasuo::{Capabilities, CompressionOptions, Compressor, OutputFormatRequest};
use std::path::PathBuf;
use tempfile::TempDir;

fn photo_like(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 7 + y * 3) % 256) as u8,
            ((x * y) % 256) as u8,
            ((x + 2 * y) % 256) as u8,
        ])
    }))
}

fn icon_like(size: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(size, size, |x, y| {
        let alpha = if (x + y) % 5 == 0 { 0 } else { 255 };
        Rgba([(x * 3) as u8, (y * 3) as u8, 200, alpha])
    }))
}

fn create_test_image(width: u32, height: u32) -> (PathBuf, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let test_file = temp_dir.path().join("bench.jpg");
    photo_like(width, height)
        .save_with_format(&test_file, ImageFormat::Jpeg)
        .unwrap();
    (test_file, temp_dir)
}

fn bench_jpeg_pipeline(c: &mut Criterion) {
    let compressor = Compressor::with_capabilities(Capabilities::none());
    let mut group = c.benchmark_group("jpeg_pipeline");
    group.sample_size(20);

    for (width, height) in [(320, 240), (1280, 720)] {
        let (input, temp_dir) = create_test_image(width, height);
        let output = temp_dir.path().join("out.jpg");
        let options = CompressionOptions::default();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &input,
            |b, input| b.iter(|| compressor.compress_image(black_box(input), Some(&output), &options)),
        );
    }
    group.finish();
}

fn bench_png_quantization(c: &mut Criterion) {
    let image = icon_like(256);
    let mut group = c.benchmark_group("png_quantization");
    group.sample_size(20);

    let built_in = Capabilities::none();
    group.bench_function("built_in", |b| {
        b.iter(|| compress_png(black_box(&image), 85, &built_in))
    });

    if cfg!(feature = "imagequant") {
        let with_quantizer = Capabilities {
            quantizer_available: true,
            ..Capabilities::none()
        };
        group.bench_function("imagequant", |b| {
            b.iter(|| compress_png(black_box(&image), 85, &with_quantizer))
        });
    }
    group.finish();
}

fn bench_webp_quality(c: &mut Criterion) {
    let compressor = Compressor::with_capabilities(Capabilities::none());
    let (input, temp_dir) = create_test_image(640, 480);
    let output = temp_dir.path().join("out.webp");
    let mut group = c.benchmark_group("webp_quality");
    group.sample_size(20);

    for quality in [50u8, 85] {
        let options = CompressionOptions::new(Some(quality), OutputFormatRequest::Webp).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(quality), &options, |b, options| {
            b.iter(|| compressor.compress_image(black_box(&input), Some(&output), options))
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_jpeg_pipeline,
    bench_png_quantization,
    bench_webp_quality
);
criterion_main!(benches);
