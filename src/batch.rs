use crate::error::{CompressionError, Result};
use crate::formats::is_supported;
use crate::processing::{CompressionOptions, CompressionResult, Compressor};
use crate::utils::{calculate_compression_ratio, format_size};
use glob::glob;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Aggregate statistics for one batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    /// Files attempted so far, failures and skipped entries included
    pub processed_files: usize,
    pub successful_files: usize,
    pub failed_files: usize,
    /// Sums over successful results only
    pub total_original_size: u64,
    pub total_compressed_size: u64,
    pub overall_ratio: f64,
}

impl BatchSummary {
    fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Self::default()
        }
    }

    fn record(&mut self, result: Option<&CompressionResult>) {
        self.processed_files += 1;
        if let Some(result) = result {
            match result.compressed_size() {
                Some(compressed_size) => {
                    self.successful_files += 1;
                    self.total_original_size += result.original_size;
                    self.total_compressed_size += compressed_size;
                }
                None => self.failed_files += 1,
            }
        }
        self.overall_ratio =
            calculate_compression_ratio(self.total_original_size, self.total_compressed_size);
    }

    pub fn total_original_size_formatted(&self) -> String {
        format_size(self.total_original_size)
    }

    pub fn total_compressed_size_formatted(&self) -> String {
        format_size(self.total_compressed_size)
    }
}

/// Runs the engine sequentially over a list of files
pub struct BatchRunner<'a> {
    compressor: &'a Compressor,
    options: CompressionOptions,
}

impl<'a> BatchRunner<'a> {
    pub fn new(compressor: &'a Compressor, options: CompressionOptions) -> Self {
        Self {
            compressor,
            options,
        }
    }

    /// Writes every output into `output_dir` instead of next to its input.
    pub fn output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.options.output_dir = Some(output_dir.into());
        self
    }

    /// Compresses the supported files at the top level of `dir`.
    pub fn run_directory<F>(
        &self,
        dir: &Path,
        on_progress: F,
    ) -> Result<(Vec<CompressionResult>, BatchSummary)>
    where
        F: FnMut(usize, usize, Option<&CompressionResult>),
    {
        let files = list_directory(dir)?;
        Ok(self.run(&files, on_progress))
    }

    /// Compresses `files` in order.
    ///
    /// `on_progress(processed, total, result)` fires after every file;
    /// `result` is `None` for files the engine does not accept.
    pub fn run<F>(
        &self,
        files: &[PathBuf],
        mut on_progress: F,
    ) -> (Vec<CompressionResult>, BatchSummary)
    where
        F: FnMut(usize, usize, Option<&CompressionResult>),
    {
        let mut summary = BatchSummary::new(files.len());
        let mut results = Vec::with_capacity(files.len());
        info!("Compressing {} files", files.len());

        for path in files {
            let result = self.compressor.compress_image(path, None, &self.options);
            summary.record(result.as_ref());
            on_progress(summary.processed_files, summary.total_files, result.as_ref());
            if let Some(result) = result {
                results.push(result);
            }
        }

        debug!("Batch finished: {:?}", summary);
        (results, summary)
    }
}

/// Supported regular files directly inside `dir`, sorted by file name.
fn list_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        // follows symlinks to regular files
        if entry.path().is_file() && is_supported(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Resolves a CLI input into files to compress
///
/// # Arguments
/// * `input` - A directory (top level only), a single file, or a glob pattern
///
/// # Returns
/// * `Ok(files)` - Ordered file list; a directory without images yields an
///   empty list
/// * `Err(CompressionError)` - If a glob pattern is malformed or matches no
///   supported file
pub fn collect_image_files(input: &str) -> Result<Vec<PathBuf>> {
    let input_path = Path::new(input);

    if input_path.is_dir() {
        return list_directory(input_path);
    }

    if input_path.is_file() {
        return Ok(vec![input_path.to_path_buf()]);
    }

    let image_files: Vec<PathBuf> = glob(input)?
        .flatten()
        .filter(|entry| entry.is_file() && is_supported(entry))
        .collect();

    if image_files.is_empty() {
        return Err(CompressionError::NoImageFilesFound(input.to_string()));
    }
    Ok(image_files)
}
