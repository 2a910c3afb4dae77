use crate::capabilities::Capabilities;
use crate::command::{BoundedCommand, CommandOutcome};
use crate::constants::{
    DEFAULT_QUALITY, JPEG_OPTIMIZER_TIMEOUT, MAX_JPEG_DIMENSION, MAX_QUALITY, MIN_QUALITY,
    WEBP_METHOD,
};
use crate::error::{CompressionError, Result};
use crate::formats::{
    default_output_path, input_extension, is_supported, resolve_output_extension, EncodeTarget,
    OutputFormatRequest,
};
use crate::metadata;
use crate::png_pipeline;
use crate::utils::{calculate_compression_ratio, format_size};
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use jpeg_encoder::{ColorType, SamplingFactor};
use serde::Serialize;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    pub quality: u8,
    pub format: OutputFormatRequest,
    /// Where default-named outputs go; next to the input when `None`
    pub output_dir: Option<PathBuf>,
}

impl CompressionOptions {
    pub fn new(quality: Option<u8>, format: OutputFormatRequest) -> Result<Self> {
        let quality = quality.unwrap_or(DEFAULT_QUALITY);
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(CompressionError::InvalidQuality(quality));
        }

        Ok(Self {
            quality,
            format,
            output_dir: None,
        })
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            format: OutputFormatRequest::Original,
            output_dir: None,
        }
    }
}

/// How a single file ended up
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompressionOutcome {
    Compressed {
        compressed_path: PathBuf,
        compressed_size: u64,
    },
    Failed {
        error: String,
    },
}

/// Per-file record handed back to callers and progress callbacks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompressionResult {
    pub original_path: PathBuf,
    pub original_size: u64,
    #[serde(flatten)]
    pub outcome: CompressionOutcome,
}

impl CompressionResult {
    pub fn compressed(
        original_path: PathBuf,
        original_size: u64,
        compressed_path: PathBuf,
        compressed_size: u64,
    ) -> Self {
        Self {
            original_path,
            original_size,
            outcome: CompressionOutcome::Compressed {
                compressed_path,
                compressed_size,
            },
        }
    }

    pub fn failed(original_path: PathBuf, original_size: u64, error: impl ToString) -> Self {
        Self {
            original_path,
            original_size,
            outcome: CompressionOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, CompressionOutcome::Compressed { .. })
    }

    pub fn compressed_path(&self) -> Option<&Path> {
        match &self.outcome {
            CompressionOutcome::Compressed { compressed_path, .. } => Some(compressed_path),
            CompressionOutcome::Failed { .. } => None,
        }
    }

    pub fn compressed_size(&self) -> Option<u64> {
        match self.outcome {
            CompressionOutcome::Compressed { compressed_size, .. } => Some(compressed_size),
            CompressionOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            CompressionOutcome::Failed { error } => Some(error),
            CompressionOutcome::Compressed { .. } => None,
        }
    }

    /// Percentage saved; 0 for failures and empty originals.
    pub fn compression_ratio(&self) -> f64 {
        self.compressed_size()
            .map(|size| calculate_compression_ratio(self.original_size, size))
            .unwrap_or(0.0)
    }

    pub fn original_size_formatted(&self) -> String {
        format_size(self.original_size)
    }

    pub fn compressed_size_formatted(&self) -> Option<String> {
        self.compressed_size().map(format_size)
    }
}

/// The compression engine. Holds nothing but the backend descriptor, so a
/// single instance can serve any number of files and batches.
#[derive(Debug, Clone)]
pub struct Compressor {
    capabilities: Capabilities,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor {
    /// Uses the process-wide detected backends.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::detect().clone())
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Compresses one file
    ///
    /// # Arguments
    /// * `input_path` - Image to compress
    /// * `output_path` - Explicit destination; defaults to
    ///   `<stem>_compressed<ext>` (see [`default_output_path`])
    /// * `options` - Quality, output format and output directory
    ///
    /// # Returns
    /// * `None` when the input extension is not supported
    /// * `Some(result)` otherwise, successful or not
    pub fn compress_image(
        &self,
        input_path: &Path,
        output_path: Option<&Path>,
        options: &CompressionOptions,
    ) -> Option<CompressionResult> {
        if !is_supported(input_path) {
            debug!("Skipping unsupported file {:?}", input_path);
            return None;
        }

        let original_size = fs::metadata(input_path).map(|m| m.len()).unwrap_or(0);
        let result = match self.compress_to(input_path, output_path, options) {
            Ok((compressed_path, compressed_size)) => {
                debug!(
                    "Compressed {:?} -> {:?} ({} -> {} bytes)",
                    input_path, compressed_path, original_size, compressed_size
                );
                CompressionResult::compressed(
                    input_path.to_path_buf(),
                    original_size,
                    compressed_path,
                    compressed_size,
                )
            }
            Err(e) => {
                warn!("Error compressing {:?}: {}", input_path, e);
                CompressionResult::failed(input_path.to_path_buf(), original_size, e)
            }
        };
        Some(result)
    }

    fn compress_to(
        &self,
        input_path: &Path,
        output_path: Option<&Path>,
        options: &CompressionOptions,
    ) -> Result<(PathBuf, u64)> {
        if !input_path.is_file() {
            return Err(CompressionError::FileNotFound(input_path.to_path_buf()));
        }

        let output_ext = resolve_output_extension(&input_extension(input_path), options.format);
        let output_path = match output_path {
            Some(path) => path.to_path_buf(),
            None => default_output_path(input_path, &output_ext, options.output_dir.as_deref())?,
        };

        let image = ImageReader::open(input_path)?
            .with_guessed_format()?
            .decode()?;
        self.encode_as(
            EncodeTarget::from_extension(&output_ext),
            &image,
            input_path,
            &output_path,
            options.quality,
        )?;

        let compressed_size = fs::metadata(&output_path)?.len();
        Ok((output_path, compressed_size))
    }

    /// Encodes a decoded image to `output_path`, picking the encoder from the
    /// output extension.
    ///
    /// The output only appears once fully written; optional backends that
    /// fail are skipped silently. `input_path` is only consulted for metadata
    /// and permissions.
    pub fn encode(
        &self,
        image: &DynamicImage,
        input_path: &Path,
        output_path: &Path,
        quality: u8,
    ) -> Result<()> {
        let target = EncodeTarget::from_extension(&input_extension(output_path));
        self.encode_as(target, image, input_path, output_path, quality)
    }

    fn encode_as(
        &self,
        target: EncodeTarget,
        image: &DynamicImage,
        input_path: &Path,
        output_path: &Path,
        quality: u8,
    ) -> Result<()> {
        match target {
            EncodeTarget::Jpeg => {
                let bytes = self.encode_jpeg(image, input_path, quality)?;
                write_atomically(output_path, &bytes, input_path)
            }
            EncodeTarget::Png => {
                let mut bytes = png_pipeline::compress_png(image, quality, &self.capabilities)?;
                if let Some(tool) = &self.capabilities.lossless_png_tool {
                    bytes = png_pipeline::optimize_lossless(bytes, tool);
                }
                write_atomically(output_path, &bytes, input_path)
            }
            EncodeTarget::WebP => {
                let bytes = encode_webp(image, quality)?;
                write_atomically(output_path, &bytes, input_path)
            }
            EncodeTarget::Other => {
                let bytes = encode_generic(image, output_path)?;
                write_atomically(output_path, &bytes, input_path)
            }
        }
    }

    fn encode_jpeg(&self, image: &DynamicImage, input_path: &Path, quality: u8) -> Result<Vec<u8>> {
        let rgb = flatten_onto_white(image);
        let (width, height) = rgb.dimensions();
        let (jpeg_width, jpeg_height) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(CompressionError::ImageTooLarge(
                    width,
                    height,
                    MAX_JPEG_DIMENSION,
                ))
            }
        };

        let mut bytes = Vec::new();
        let mut encoder = jpeg_encoder::Encoder::new(&mut bytes, quality);
        encoder.set_progressive(true);
        encoder.set_optimized_huffman_tables(true);
        encoder.set_sampling_factor(SamplingFactor::R_4_2_0);

        if EncodeTarget::from_extension(&input_extension(input_path)) == EncodeTarget::Jpeg {
            if let Some(exif) = metadata::reduced_exif(input_path) {
                if let Err(e) = encoder.add_app_segment(1, &exif) {
                    debug!("Dropping metadata of {:?}: {}", input_path, e);
                }
            }
        }

        encoder.encode(rgb.as_raw(), jpeg_width, jpeg_height, ColorType::Rgb)?;
        Ok(self.reoptimize_jpeg(bytes))
    }

    /// Lossless jpegtran pass; keeps the input bytes unless the tool
    /// produced a smaller JPEG stream.
    fn reoptimize_jpeg(&self, bytes: Vec<u8>) -> Vec<u8> {
        let Some(tool) = &self.capabilities.jpeg_optimizer else {
            return bytes;
        };

        let outcome = BoundedCommand::new(tool, JPEG_OPTIMIZER_TIMEOUT)
            .args(["-copy", "all", "-optimize", "-progressive"])
            .stdin(bytes.clone())
            .run();
        match outcome {
            CommandOutcome::Success { stdout }
                if stdout.starts_with(&JPEG_SOI) && stdout.len() < bytes.len() =>
            {
                debug!("jpegtran saved {} bytes", bytes.len() - stdout.len());
                stdout
            }
            other => {
                debug!("Keeping encoder output, jpegtran gave {:?}", outcome_summary(&other));
                bytes
            }
        }
    }
}

fn outcome_summary(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Success { stdout } => format!("{} bytes, not an improvement", stdout.len()),
        other => format!("{:?}", other),
    }
}

/// Composites anything with alpha onto opaque white, converts the rest to RGB.
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = pixel[3] as u32;
        let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])])
    })
}

/// Lossy WebP at `quality`. Other pixel layouts are widened to RGBA or RGB
/// depending on whether they carry alpha.
fn encode_webp(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut config = webp::WebPConfig::new().map_err(|_| {
        CompressionError::WebPEncoding("failed to initialise encoder config".to_string())
    })?;
    config.lossless = 0;
    config.quality = quality as f32;
    config.method = WEBP_METHOD;

    let memory = match image {
        DynamicImage::ImageRgb8(rgb) => {
            webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height()).encode_advanced(&config)
        }
        DynamicImage::ImageRgba8(rgba) => {
            webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                .encode_advanced(&config)
        }
        other if other.color().has_alpha() => {
            let rgba = other.to_rgba8();
            webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height())
                .encode_advanced(&config)
        }
        other => {
            let rgb = other.to_rgb8();
            webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
                .encode_advanced(&config)
        }
    }
    .map_err(|e| CompressionError::WebPEncoding(format!("{:?}", e)))?;

    Ok(memory.to_vec())
}

/// Plain re-save in the format the output extension names (BMP in practice).
fn encode_generic(image: &DynamicImage, output_path: &Path) -> Result<Vec<u8>> {
    let format = ImageFormat::from_path(output_path).map_err(|_| {
        CompressionError::UnsupportedFormat(output_path.display().to_string())
    })?;
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format)?;
    Ok(bytes.into_inner())
}

/// Writes through a temporary file in the destination directory so a failed
/// encode never leaves a truncated output behind. The output inherits the
/// input's permissions.
fn write_atomically(output_path: &Path, bytes: &[u8], input_path: &Path) -> Result<()> {
    let dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|_| CompressionError::DirectoryCreationFailed(dir.clone()))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".img-yasuo-")
        .tempfile_in(&dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    if let Ok(meta) = fs::metadata(input_path) {
        let _ = temp.as_file().set_permissions(meta.permissions());
    }
    temp.persist(output_path)?;
    Ok(())
}
