use anyhow::{bail, Context, Result};
use clap::Parser;
use img_yasuo::cli::{Args, Commands};
use img_yasuo::constants::{
    ERROR_PREFIX, INFO_PREFIX, ORIGINAL_SIZE_PREFIX, PROGRESS_BAR_TEMPLATE, SUCCESS_PREFIX,
    WARNING_PREFIX,
};
use img_yasuo::utils::print_compression_result;
use img_yasuo::{
    collect_image_files, logger, report, BatchRunner, BatchSummary, Capabilities,
    CompressionOptions, CompressionResult, Compressor, LosslessPngTool, OutputFormatRequest,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.verbose, args.quiet);

    match args.command {
        Commands::Compress {
            input,
            output,
            quality,
            format,
        } => compress(&input, output.as_deref(), quality, format),
        Commands::Batch {
            input,
            output,
            quality,
            format,
            json,
        } => batch(&input, output, quality, format, json),
        Commands::Capabilities { json } => show_capabilities(json),
    }
}

fn compress(
    input: &Path,
    output: Option<&Path>,
    quality: Option<u8>,
    format: OutputFormatRequest,
) -> Result<()> {
    if !input.is_file() {
        bail!("Input file not found: {:?}", input);
    }
    let options = CompressionOptions::new(quality, format)?;
    let compressor = Compressor::new();

    report!("🖼️  Compressing {:?} (quality {})", input, options.quality);
    let Some(result) = compressor.compress_image(input, output, &options) else {
        bail!("Unsupported image format: {:?}", input);
    };

    match (result.compressed_path(), result.compressed_size()) {
        (Some(path), Some(size)) => {
            report!(
                "{} {} ({})",
                ORIGINAL_SIZE_PREFIX,
                result.original_size,
                result.original_size_formatted()
            );
            print_compression_result(result.original_size, size);
            report!("💾 Saved to {:?}", path);
        }
        _ => report!(
            "{} Failed to compress {:?}: {}",
            ERROR_PREFIX,
            input,
            result.error().unwrap_or("unknown error")
        ),
    }
    Ok(())
}

fn batch(
    input: &str,
    output: Option<PathBuf>,
    quality: Option<u8>,
    format: OutputFormatRequest,
    json: bool,
) -> Result<()> {
    let options = CompressionOptions::new(quality, format)?;
    let files = collect_image_files(input)
        .with_context(|| format!("Failed to collect images from {}", input))?;

    let compressor = Compressor::new();
    let mut runner = BatchRunner::new(&compressor, options);
    if let Some(dir) = output {
        runner = runner.output_dir(dir);
    }

    if !json {
        report!("🚀 Starting batch compression...");
        report!("📁 Input: {}", input);
        report!("📊 Found {} image files to process", files.len());
    }

    let progress = if json || logger::is_quiet() {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(files.len() as u64)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_BAR_TEMPLATE)
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let start_time = Instant::now();
    let (results, summary) = runner.run(&files, |processed, _total, result| {
        progress.set_position(processed as u64);
        if let Some(name) = result.and_then(|r| r.original_path.file_name()) {
            progress.set_message(name.to_string_lossy().into_owned());
        }
    });
    progress.finish_with_message("done");

    if json {
        let document = json!({ "summary": summary, "results": results });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print_summary(&results, &summary, start_time);
    }
    Ok(())
}

fn print_summary(results: &[CompressionResult], summary: &BatchSummary, start_time: Instant) {
    for result in results.iter().filter(|r| !r.success()) {
        report!(
            "{} Failed to process {:?}: {}",
            ERROR_PREFIX,
            result.original_path,
            result.error().unwrap_or("unknown error")
        );
    }

    report!("\n📊 Batch Compression Summary:");
    report!("  📁 Total files processed: {}", summary.processed_files);
    report!("  ✅ Compressed: {}", summary.successful_files);
    report!(
        "  📊 Total original size: {}",
        summary.total_original_size_formatted()
    );
    report!(
        "  📊 Total compressed size: {}",
        summary.total_compressed_size_formatted()
    );
    report!("  🎯 Overall compression ratio: {:.1}%", summary.overall_ratio);
    report!("  ⏱️  Total time: {:?}", start_time.elapsed());
    if summary.failed_files > 0 {
        report!("  {}  Failed files: {}", WARNING_PREFIX, summary.failed_files);
    } else if summary.total_files > 0 {
        report!("{} Batch compression complete", SUCCESS_PREFIX);
    }
}

fn show_capabilities(json: bool) -> Result<()> {
    let capabilities = Capabilities::detect();
    if json {
        println!("{}", serde_json::to_string_pretty(capabilities)?);
        return Ok(());
    }

    println!("{} Compression backends:", INFO_PREFIX);
    println!("  PNG quantizer:      {}", capabilities.quantizer_label());
    println!("  Dithering:          {}", capabilities.dithering_method);
    println!("  JPEG optimizer:     {}", capabilities.jpeg_optimizer_label());
    if let Some(path) = &capabilities.jpeg_optimizer {
        println!("                      {}", path.display());
    }
    println!("  PNG lossless pass:  {}", capabilities.lossless_label());
    if let Some(LosslessPngTool::Binary(path)) = &capabilities.lossless_png_tool {
        println!("                      {}", path.display());
    }
    Ok(())
}
