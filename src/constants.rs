use std::time::Duration;

pub const DEFAULT_QUALITY: u8 = 85;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];
pub const COMPRESSED_SUFFIX: &str = "_compressed";

// Palette sizing for PNG quantization
pub const MIN_PALETTE_SIZE: u32 = 32;
pub const MAX_PALETTE_SIZE: u32 = 256;
pub const MIN_QUANTIZER_QUALITY: u8 = 10;
pub const QUANTIZER_QUALITY_SLACK: u8 = 20;
pub const DITHERING_LEVEL: f32 = 1.0;
pub const DITHERING_METHOD: &str = "Floyd-Steinberg";
pub const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

pub const WEBP_METHOD: i32 = 6;

// jpeg-encoder takes u16 dimensions
pub const MAX_JPEG_DIMENSION: u32 = u16::MAX as u32;

// External tools
pub const OXIPNG_ENV_VAR: &str = "IMG_YASUO_OXIPNG";
pub const JPEGTRAN_ENV_VAR: &str = "IMG_YASUO_JPEGTRAN";
pub const OXIPNG_BINARY: &str = "oxipng";
pub const JPEGTRAN_BINARY: &str = "jpegtran";
pub const BUNDLED_TOOLS_DIR: &str = "bin";
pub const LOSSLESS_PNG_EFFORT: u8 = 4;
pub const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
pub const LOSSLESS_PNG_TIMEOUT: Duration = Duration::from_secs(60);
pub const JPEG_OPTIMIZER_TIMEOUT: Duration = Duration::from_secs(30);

pub const PROGRESS_BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

// Common output message prefixes
pub const ORIGINAL_SIZE_PREFIX: &str = "📊 Original size:";
pub const COMPRESSED_SIZE_PREFIX: &str = "📈 Compressed size:";
pub const COMPRESSION_RATIO_PREFIX: &str = "🎯 Compression ratio:";
pub const SUCCESS_PREFIX: &str = "✅";
pub const WARNING_PREFIX: &str = "⚠️";
pub const ERROR_PREFIX: &str = "❌";
pub const INFO_PREFIX: &str = "📋";
