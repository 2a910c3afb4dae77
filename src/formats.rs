/// Image format utilities and type-safe format handling
///
/// Decides which inputs the engine accepts, which extension an output gets
/// and which encoder branch handles it.
use crate::constants::{COMPRESSED_SUFFIX, SUPPORTED_IMAGE_EXTENSIONS};
use crate::error::{CompressionError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Requested output format for a compression run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatRequest {
    /// Keep the input file's extension
    #[default]
    Original,
    Jpeg,
    Png,
    Webp,
}

impl OutputFormatRequest {
    /// Lenient lookup: names that are not recognized keep the input format.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or(OutputFormatRequest::Original)
    }
}

impl fmt::Display for OutputFormatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormatRequest::Original => "original",
            OutputFormatRequest::Jpeg => "jpeg",
            OutputFormatRequest::Png => "png",
            OutputFormatRequest::Webp => "webp",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormatRequest {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "original" => Ok(OutputFormatRequest::Original),
            "jpeg" | "jpg" => Ok(OutputFormatRequest::Jpeg),
            "png" => Ok(OutputFormatRequest::Png),
            "webp" => Ok(OutputFormatRequest::Webp),
            _ => Err(CompressionError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Encoder branch selected from a resolved output extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeTarget {
    Jpeg,
    Png,
    WebP,
    /// Generic re-save in whatever format the extension implies
    Other,
}

impl EncodeTarget {
    /// Accepts the extension with or without its leading dot, any case.
    pub fn from_extension(extension: &str) -> Self {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" => EncodeTarget::Jpeg,
            "png" => EncodeTarget::Png,
            "webp" => EncodeTarget::WebP,
            _ => EncodeTarget::Other,
        }
    }
}

/// Check if a file path carries one of the supported image extensions
///
/// # Arguments
/// * `path` - The file path to check
///
/// # Returns
/// * `true` for `.jpg .jpeg .png .bmp .webp` in any case, `false` otherwise
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            SUPPORTED_IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}

/// The input's extension including the leading dot, as written on disk.
pub fn input_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Resolve the output extension for a requested format
///
/// `Original` returns `input_ext` untouched (case included).
pub fn resolve_output_extension(input_ext: &str, request: OutputFormatRequest) -> String {
    match request {
        OutputFormatRequest::Original => input_ext.to_string(),
        OutputFormatRequest::Jpeg => ".jpg".to_string(),
        OutputFormatRequest::Png => ".png".to_string(),
        OutputFormatRequest::Webp => ".webp".to_string(),
    }
}

/// `<stem>_compressed<ext>` next to the input, or inside `output_dir`.
pub fn default_output_path(
    input_path: &Path,
    output_ext: &str,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let file_stem = input_path
        .file_stem()
        .ok_or_else(|| CompressionError::UnsupportedFormat("Invalid file name".to_string()))?;

    let output_filename = format!(
        "{}{}{}",
        file_stem.to_string_lossy(),
        COMPRESSED_SUFFIX,
        output_ext
    );

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    Ok(dir.join(output_filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_supported() {
        for name in ["a.jpg", "a.jpeg", "a.png", "a.bmp", "a.webp", "a.JPG", "a.PnG", "a.WEBP"] {
            assert!(is_supported(Path::new(name)), "{} should be supported", name);
        }
        for name in ["a.txt", "a.pdf", "a.gif", "a.tiff", "a", "jpg"] {
            assert!(!is_supported(Path::new(name)), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormatRequest::from_str("jpeg").unwrap(), OutputFormatRequest::Jpeg);
        assert_eq!(OutputFormatRequest::from_str("jpg").unwrap(), OutputFormatRequest::Jpeg);
        assert_eq!(OutputFormatRequest::from_str("PNG").unwrap(), OutputFormatRequest::Png);
        assert_eq!(OutputFormatRequest::from_str("webp").unwrap(), OutputFormatRequest::Webp);
        assert_eq!(
            OutputFormatRequest::from_str("Original").unwrap(),
            OutputFormatRequest::Original
        );

        assert!(matches!(
            OutputFormatRequest::from_str("tiff"),
            Err(CompressionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_from_name_is_lenient() {
        assert_eq!(OutputFormatRequest::from_name("webp"), OutputFormatRequest::Webp);
        assert_eq!(OutputFormatRequest::from_name("avif"), OutputFormatRequest::Original);
        assert_eq!(OutputFormatRequest::from_name(""), OutputFormatRequest::Original);
    }

    #[test]
    fn test_resolve_output_extension() {
        assert_eq!(resolve_output_extension(".PNG", OutputFormatRequest::Original), ".PNG");
        assert_eq!(resolve_output_extension(".png", OutputFormatRequest::Jpeg), ".jpg");
        assert_eq!(resolve_output_extension(".jpg", OutputFormatRequest::Png), ".png");
        assert_eq!(resolve_output_extension(".bmp", OutputFormatRequest::Webp), ".webp");
        assert_eq!(
            resolve_output_extension(".bmp", OutputFormatRequest::from_name("heic")),
            ".bmp"
        );
    }

    #[test]
    fn test_encode_target_from_extension() {
        assert_eq!(EncodeTarget::from_extension(".JPEG"), EncodeTarget::Jpeg);
        assert_eq!(EncodeTarget::from_extension("jpg"), EncodeTarget::Jpeg);
        assert_eq!(EncodeTarget::from_extension(".png"), EncodeTarget::Png);
        assert_eq!(EncodeTarget::from_extension(".webp"), EncodeTarget::WebP);
        assert_eq!(EncodeTarget::from_extension(".bmp"), EncodeTarget::Other);
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(Path::new("/photos/cat.png"), ".png", None).unwrap();
        assert_eq!(path, PathBuf::from("/photos/cat_compressed.png"));

        let path = default_output_path(
            Path::new("/photos/cat.png"),
            ".webp",
            Some(Path::new("/tmp/out")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/out/cat_compressed.webp"));

        let path = default_output_path(Path::new("cat.jpeg"), ".jpeg", None).unwrap();
        assert_eq!(path, PathBuf::from("cat_compressed.jpeg"));
    }

    #[test]
    fn test_input_extension() {
        assert_eq!(input_extension(Path::new("a/b.JPG")), ".JPG");
        assert_eq!(input_extension(Path::new("noext")), "");
    }
}
