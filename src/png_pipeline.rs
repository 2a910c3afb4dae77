//! PNG compression: palette quantization followed by an optional lossless pass.
//!
//! Quantizers are tried in order and the first one that produces a PNG wins.
//! The lossless pass runs before anything reaches the destination and can
//! only make the bytes smaller or leave them as they were.

use crate::capabilities::{Capabilities, LosslessPngTool};
use crate::command::BoundedCommand;
use crate::constants::{
    LOSSLESS_PNG_EFFORT, LOSSLESS_PNG_TIMEOUT, MAX_PALETTE_SIZE, MIN_PALETTE_SIZE,
    MIN_QUANTIZER_QUALITY, NEUQUANT_SAMPLE_FACTOR, QUANTIZER_QUALITY_SLACK,
};
use crate::error::{CompressionError, Result};
use color_quant::NeuQuant;
use image::imageops::{self, ColorMap};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Palette size for a quality setting: 32 colors at quality 0 up to 256 at 100.
pub fn palette_size(quality: u8) -> u32 {
    (MIN_PALETTE_SIZE + 224 * quality as u32 / 100).clamp(MIN_PALETTE_SIZE, MAX_PALETTE_SIZE)
}

/// Lowest result quality libimagequant may settle for before giving up.
pub fn min_quantizer_quality(quality: u8) -> u8 {
    quality
        .saturating_sub(QUANTIZER_QUALITY_SLACK)
        .clamp(MIN_QUANTIZER_QUALITY, 100)
}

/// A palette image ready to be written as an indexed PNG
#[derive(Debug, Clone)]
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    pub indices: Vec<u8>,
    pub palette: Vec<[u8; 4]>,
}

impl IndexedImage {
    pub fn has_transparency(&self) -> bool {
        self.palette.iter().any(|entry| entry[3] != 255)
    }
}

/// Quantization strategies, in the order they are attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngQuantizer {
    Imagequant,
    BuiltIn,
}

impl PngQuantizer {
    pub fn chain(capabilities: &Capabilities) -> Vec<PngQuantizer> {
        let mut chain = Vec::with_capacity(2);
        if capabilities.quantizer_available {
            chain.push(PngQuantizer::Imagequant);
        }
        chain.push(PngQuantizer::BuiltIn);
        chain
    }

    pub fn name(&self) -> &'static str {
        match self {
            PngQuantizer::Imagequant => "libimagequant",
            PngQuantizer::BuiltIn => "built-in",
        }
    }

    fn quantize(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        match self {
            PngQuantizer::Imagequant => encode_indexed_png(&quantize_with_imagequant(image, quality)?),
            PngQuantizer::BuiltIn => quantize_built_in(image, quality),
        }
    }
}

/// Runs the quantizer chain and returns the encoded PNG bytes.
///
/// Only the failure of the last strategy is reported.
pub fn compress_png(image: &DynamicImage, quality: u8, capabilities: &Capabilities) -> Result<Vec<u8>> {
    let chain = PngQuantizer::chain(capabilities);
    let mut last_error = None;

    for quantizer in chain {
        match quantizer.quantize(image, quality) {
            Ok(bytes) => {
                debug!("PNG quantized with {} ({} bytes)", quantizer.name(), bytes.len());
                return Ok(bytes);
            }
            Err(e) => {
                debug!("{} quantization failed, falling back: {}", quantizer.name(), e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| CompressionError::Quantization("no quantizer available".to_string())))
}

#[cfg(feature = "imagequant")]
fn quantize_with_imagequant(image: &DynamicImage, quality: u8) -> Result<IndexedImage> {
    use crate::constants::DITHERING_LEVEL;

    let quant_err = |e: imagequant::Error| CompressionError::Quantization(e.to_string());

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<imagequant::RGBA> = rgba
        .pixels()
        .map(|p| imagequant::RGBA::new(p[0], p[1], p[2], p[3]))
        .collect();

    let mut attributes = imagequant::new();
    attributes
        .set_max_colors(palette_size(quality))
        .map_err(quant_err)?;
    attributes
        .set_quality(min_quantizer_quality(quality), 100)
        .map_err(quant_err)?;

    let mut liq_image = attributes
        .new_image(pixels, width as usize, height as usize, 0.0)
        .map_err(quant_err)?;
    let mut result = attributes.quantize(&mut liq_image).map_err(quant_err)?;
    result
        .set_dithering_level(DITHERING_LEVEL)
        .map_err(quant_err)?;
    let (palette, indices) = result.remapped(&mut liq_image).map_err(quant_err)?;

    Ok(IndexedImage {
        width,
        height,
        indices,
        palette: palette.iter().map(|c| [c.r, c.g, c.b, c.a]).collect(),
    })
}

#[cfg(not(feature = "imagequant"))]
fn quantize_with_imagequant(_image: &DynamicImage, _quality: u8) -> Result<IndexedImage> {
    Err(CompressionError::Quantization(
        "built without the imagequant feature".to_string(),
    ))
}

/// NeuQuant palette behind image's dithering API
struct NeuQuantMap(NeuQuant);

impl NeuQuantMap {
    fn learn(rgba: &RgbaImage, colors: u32) -> Self {
        NeuQuantMap(NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, colors as usize, rgba.as_raw()))
    }

    fn palette(&self) -> Vec<[u8; 4]> {
        self.0
            .color_map_rgba()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect()
    }
}

impl ColorMap for NeuQuantMap {
    type Color = Rgba<u8>;

    fn index_of(&self, color: &Rgba<u8>) -> usize {
        self.0.index_of(&color.0)
    }

    fn lookup(&self, index: usize) -> Option<Rgba<u8>> {
        self.0.lookup(index).map(Rgba)
    }

    fn has_lookup(&self) -> bool {
        true
    }

    fn map_color(&self, color: &mut Rgba<u8>) {
        self.0.map_pixel(&mut color.0);
    }
}

/// Quantization without optional backends, Floyd-Steinberg dithered.
///
/// Images with alpha keep a full RGBA encoding so their transparency
/// survives; opaque images are written as indexed PNGs.
fn quantize_built_in(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let colors = palette_size(quality);
    let mut rgba = image.to_rgba8();
    let color_map = NeuQuantMap::learn(&rgba, colors);
    imageops::dither(&mut rgba, &color_map);

    if image.color().has_alpha() {
        return encode_rgba_png(&rgba);
    }

    let indices = imageops::index_colors(&rgba, &color_map).into_raw();
    let mut palette = color_map.palette();
    // Opaque input, so the palette carries no transparency either
    for entry in &mut palette {
        entry[3] = 255;
    }
    encode_indexed_png(&IndexedImage {
        width: rgba.width(),
        height: rgba.height(),
        indices,
        palette,
    })
}

fn png_encoder(buffer: &mut Vec<u8>, width: u32, height: u32, color: png::ColorType) -> png::Encoder<'_, &mut Vec<u8>> {
    let mut encoder = png::Encoder::new(buffer, width, height);
    encoder.set_color(color);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::Best);
    encoder
}

/// Writes an 8-bit palette PNG, with a tRNS chunk only when some entry is not opaque.
pub fn encode_indexed_png(image: &IndexedImage) -> Result<Vec<u8>> {
    let rgb_palette: Vec<u8> = image
        .palette
        .iter()
        .flat_map(|entry| [entry[0], entry[1], entry[2]])
        .collect();
    let alpha: Vec<u8> = image.palette.iter().map(|entry| entry[3]).collect();

    let mut buffer = Vec::new();
    {
        let mut encoder = png_encoder(&mut buffer, image.width, image.height, png::ColorType::Indexed);
        encoder.set_palette(rgb_palette);
        if image.has_transparency() {
            encoder.set_trns(alpha);
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&image.indices)?;
        writer.finish()?;
    }
    Ok(buffer)
}

pub fn encode_rgba_png(rgba: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let encoder = png_encoder(&mut buffer, rgba.width(), rgba.height(), png::ColorType::Rgba);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgba.as_raw())?;
        writer.finish()?;
    }
    Ok(buffer)
}

/// Lossless pass over encoded PNG bytes.
///
/// The tool works on a scratch copy; its result is adopted only when the run
/// succeeded and produced a decodable PNG that is no larger. Otherwise the
/// input bytes come back unchanged.
pub fn optimize_lossless(bytes: Vec<u8>, tool: &LosslessPngTool) -> Vec<u8> {
    let optimized = match tool {
        LosslessPngTool::Binary(binary) => optimize_with_binary(&bytes, binary),
        LosslessPngTool::Embedded => optimize_embedded(&bytes),
    };

    match optimized {
        Some(candidate) if candidate.len() <= bytes.len() && is_valid_png(&candidate) => {
            debug!("Lossless pass: {} -> {} bytes", bytes.len(), candidate.len());
            candidate
        }
        Some(candidate) => {
            debug!(
                "Discarding lossless pass output ({} bytes, input {})",
                candidate.len(),
                bytes.len()
            );
            bytes
        }
        None => bytes,
    }
}

fn is_valid_png(bytes: &[u8]) -> bool {
    image::load_from_memory_with_format(bytes, ImageFormat::Png).is_ok()
}

fn optimize_with_binary(bytes: &[u8], binary: &Path) -> Option<Vec<u8>> {
    let scratch = match write_scratch_copy(bytes) {
        Ok(scratch) => scratch,
        Err(e) => {
            debug!("No scratch file for oxipng: {}", e);
            return None;
        }
    };

    let outcome = BoundedCommand::new(binary, LOSSLESS_PNG_TIMEOUT)
        .arg("-o")
        .arg(LOSSLESS_PNG_EFFORT.to_string())
        .args(["--strip", "all"])
        .arg(scratch.path())
        .run();
    if !outcome.is_success() {
        debug!("oxipng failed, keeping quantized PNG: {:?}", outcome);
        return None;
    }

    fs::read(scratch.path())
        .map_err(|e| debug!("Reading oxipng output failed: {}", e))
        .ok()
}

fn write_scratch_copy(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut scratch = tempfile::Builder::new()
        .prefix(".img-yasuo-")
        .suffix(".png")
        .tempfile()?;
    scratch.write_all(bytes)?;
    scratch.flush()?;
    Ok(scratch)
}

#[cfg(feature = "embedded-oxipng")]
fn optimize_embedded(bytes: &[u8]) -> Option<Vec<u8>> {
    use oxipng::{Options, StripChunks};

    let mut options = Options::from_preset(LOSSLESS_PNG_EFFORT);
    options.strip = StripChunks::All;
    options.timeout = Some(LOSSLESS_PNG_TIMEOUT);

    oxipng::optimize_from_memory(bytes, &options)
        .map_err(|e| debug!("Embedded oxipng failed, keeping quantized PNG: {}", e))
        .ok()
}

#[cfg(not(feature = "embedded-oxipng"))]
fn optimize_embedded(_bytes: &[u8]) -> Option<Vec<u8>> {
    debug!("Built without embedded oxipng, skipping lossless pass");
    None
}
