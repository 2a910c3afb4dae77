use exif::experimental::Writer;
use exif::{In, Reader, Tag};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;
use tracing::debug;

/// EXIF tags carried over into re-encoded JPEGs; everything else is dropped.
pub const KEPT_EXIF_TAGS: [Tag; 5] = [
    Tag::ImageDescription,
    Tag::Make,
    Tag::Model,
    Tag::Orientation,
    Tag::DateTime,
];

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Builds an APP1 payload holding only [`KEPT_EXIF_TAGS`] from the primary IFD.
///
/// Returns `None` when the file has no EXIF, none of the kept tags, or when
/// anything about reading or rewriting it fails.
pub fn reduced_exif(input_path: &Path) -> Option<Vec<u8>> {
    match read_reduced_exif(input_path) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("Dropping metadata of {:?}: {}", input_path, e);
            None
        }
    }
}

fn read_reduced_exif(input_path: &Path) -> Result<Option<Vec<u8>>, exif::Error> {
    let file = File::open(input_path)?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut reader)?;

    let kept: Vec<_> = exif
        .fields()
        .filter(|field| field.ifd_num == In::PRIMARY && KEPT_EXIF_TAGS.contains(&field.tag))
        .collect();
    if kept.is_empty() {
        return Ok(None);
    }

    let mut writer = Writer::new();
    for field in &kept {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, exif.little_endian())?;

    let mut payload = EXIF_HEADER.to_vec();
    payload.extend_from_slice(&tiff.into_inner());
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::{Field, Value};
    use std::io::Write;

    #[test]
    fn test_missing_file_has_no_metadata() {
        assert_eq!(reduced_exif(Path::new("/nonexistent/photo.jpg")), None);
    }

    #[test]
    fn test_garbage_has_no_metadata() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not a jpeg").unwrap();
        assert_eq!(reduced_exif(file.path()), None);
    }

    #[test]
    fn test_only_kept_tags_survive() {
        let make = Field {
            tag: Tag::Make,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"Acme".to_vec()]),
        };
        let software = Field {
            tag: Tag::Software,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![b"Editor 1.0".to_vec()]),
        };
        let mut writer = Writer::new();
        writer.push_field(&make);
        writer.push_field(&software);
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&tiff.into_inner()).unwrap();

        let payload = reduced_exif(file.path()).expect("Make should be kept");
        assert!(payload.starts_with(EXIF_HEADER));

        let reparsed = Reader::new()
            .read_raw(payload[EXIF_HEADER.len()..].to_vec())
            .unwrap();
        assert!(reparsed.get_field(Tag::Make, In::PRIMARY).is_some());
        assert!(reparsed.get_field(Tag::Software, In::PRIMARY).is_none());
    }
}
