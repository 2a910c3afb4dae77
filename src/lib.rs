pub mod batch;
pub mod capabilities;
pub mod cli;
pub mod command;
pub mod constants;
pub mod error;
pub mod formats;
pub mod logger;
pub mod metadata;
pub mod png_pipeline;
pub mod processing;
pub mod utils;

pub use batch::{collect_image_files, BatchRunner, BatchSummary};
pub use capabilities::{Capabilities, LosslessPngTool};
pub use error::{CompressionError, Result};
pub use formats::{
    default_output_path, is_supported, resolve_output_extension, EncodeTarget, OutputFormatRequest,
};
pub use processing::{CompressionOptions, CompressionOutcome, CompressionResult, Compressor};
pub use utils::{calculate_compression_ratio, format_size};
