/// Utility functions for common operations
///
/// Size formatting and ratio arithmetic shared by the engine, the batch
/// summary and the command-line output.
use crate::constants::{COMPRESSED_SIZE_PREFIX, COMPRESSION_RATIO_PREFIX, SUCCESS_PREFIX, WARNING_PREFIX};
use crate::report;

/// Format file size in human-readable format
///
/// Always two decimals, binary (1024) steps.
///
/// # Arguments
/// * `bytes` - Size in bytes
///
/// # Returns
/// * Human-readable size string (e.g., "500.00 B", "1.00 KB")
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    const THRESHOLD: f64 = 1024.0;

    let mut size = bytes as f64;
    for unit in UNITS {
        if size < THRESHOLD {
            return format!("{:.2} {}", size, unit);
        }
        size /= THRESHOLD;
    }
    format!("{:.2} TB", size)
}

/// Calculate compression ratio as a percentage
///
/// # Arguments
/// * `original_size` - Original file size in bytes
/// * `compressed_size` - Compressed file size in bytes
///
/// # Returns
/// * `(1 - compressed / original) * 100`, or 0 when the original is empty.
///   Negative values mean the file grew.
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (1.0 - compressed_size as f64 / original_size as f64) * 100.0
}

/// Print compression result with formatted output
pub fn print_compression_result(original_size: u64, compressed_size: u64) {
    let ratio = calculate_compression_ratio(original_size, compressed_size);

    report!(
        "{} {} ({})",
        COMPRESSED_SIZE_PREFIX,
        compressed_size,
        format_size(compressed_size)
    );
    report!("{} {:.1}%", COMPRESSION_RATIO_PREFIX, ratio);

    if ratio > 0.0 {
        report!("{} Successfully reduced file size by {:.1}%", SUCCESS_PREFIX, ratio);
    } else {
        report!("{}  File size increased by {:.1}%", WARNING_PREFIX, ratio.abs());
    }
}
