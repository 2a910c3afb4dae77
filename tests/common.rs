#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Smooth RGB gradient; compresses less trivially than a flat fill.
pub fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    }))
}

/// Left half fully transparent, right half opaque blue.
pub fn half_transparent(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([0, 0, 255, 255])
        }
    }))
}

pub fn save_image(img: &DynamicImage, dir: &Path, name: &str, format: ImageFormat) -> PathBuf {
    let path = dir.join(name);
    img.save_with_format(&path, format).unwrap();
    path
}

/// A mix of real images and a non-image file, as found in a typical folder.
pub fn create_test_image_files(dir: &Path) -> Vec<PathBuf> {
    let jpg = save_image(&gradient_rgb(64, 48), dir, "photo.jpg", ImageFormat::Jpeg);
    let png = save_image(&half_transparent(32, 32), dir, "icon.png", ImageFormat::Png);
    let bmp = save_image(&solid_rgb(16, 16, [10, 20, 30]), dir, "tile.bmp", ImageFormat::Bmp);
    let txt = dir.join("readme.txt");
    fs::write(&txt, b"not an image").unwrap();
    vec![bmp, png, jpg, txt]
}

pub fn create_test_output_directory(dir: &Path) -> PathBuf {
    let output_dir = dir.join("output");
    fs::create_dir(&output_dir).unwrap();
    output_dir
}
