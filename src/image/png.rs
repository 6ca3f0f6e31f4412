// PNG encoding via the `image` crate.
//
// Input is the crate's BGRA buffer; rows are swizzled to RGBA and pitch
// padding is dropped before encoding.

use std::fs::OpenOptions;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use super::{ImageBuffer, BYTES_PER_PIXEL};
use crate::error::{CaptureError, CaptureResult, ErrorKind};

/// Save a buffer as PNG.
///
/// The image is encoded in memory before the file is opened, so an encoding
/// failure never truncates an existing file or leaves a partial one behind.
/// Fails with an encoding error when the file exists and `overwrite` is false.
pub fn save_png(img: &ImageBuffer, path: &Path, overwrite: bool) -> CaptureResult<()> {
    let bytes = encode_png(img)?;

    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = match options.open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
            return Err(CaptureError::encoding(
                "save_png",
                format!("{} already exists (overwrite disabled)", path.display()),
            ));
        }
        Err(e) => {
            return Err(CaptureError::encoding(
                "save_png",
                format!("failed to create {}: {e}", path.display()),
            ));
        }
    };

    file.write_all(&bytes)
        .and_then(|()| file.flush())
        .map_err(|e| CaptureError::encoding("save_png", format!("failed to write {}: {e}", path.display())))
}

/// Encode a buffer into an in-memory PNG stream.
pub fn encode_png(img: &ImageBuffer) -> CaptureResult<Vec<u8>> {
    let mut bytes = Vec::new();
    encode(img, &mut bytes).map_err(|e| CaptureError::from_anyhow(ErrorKind::Encoding, "encode_png", e))?;
    Ok(bytes)
}

/// BGRA rows → tightly packed RGBA.
pub fn to_rgba(img: &ImageBuffer) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(img.width() as usize * img.height() as usize * BYTES_PER_PIXEL);
    for row in img.rows() {
        rgba.extend_from_slice(row);
    }
    for pixel in rgba.chunks_exact_mut(BYTES_PER_PIXEL) {
        pixel.swap(0, 2);
    }
    rgba
}

fn encode<W: Write>(img: &ImageBuffer, writer: W) -> Result<()> {
    let rgba = to_rgba(img);
    let encoder = PngEncoder::new_with_quality(writer, CompressionType::Fast, FilterType::Sub);
    encoder
        .write_image(&rgba, img.width(), img.height(), ExtendedColorType::Rgba8)
        .context("PNG encoding failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ImageBuffer {
        // 2x2, pitch padded to 12 bytes per row.
        let data = vec![
            1, 2, 3, 255, 4, 5, 6, 255, 0, 0, 0, 0, //
            7, 8, 9, 128, 10, 11, 12, 0, 0, 0, 0, 0,
        ];
        ImageBuffer::new(2, 2, 12, (0, 0), data).unwrap()
    }

    #[test]
    fn test_to_rgba_swizzles_and_drops_padding() {
        let rgba = to_rgba(&sample());
        assert_eq!(
            rgba,
            vec![3, 2, 1, 255, 6, 5, 4, 255, 9, 8, 7, 128, 12, 11, 10, 0]
        );
    }

    #[test]
    fn test_save_png_writes_decodable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");

        save_png(&sample(), &path, false).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(1, 1).0, [12, 11, 10, 0]);
    }

    #[test]
    fn test_save_png_respects_overwrite_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"existing").unwrap();

        let err = save_png(&sample(), &path, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert_eq!(std::fs::read(&path).unwrap(), b"existing");

        save_png(&sample(), &path, true).unwrap();
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_saved_file_is_exactly_the_encoded_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, vec![0xAB; 4096]).unwrap();

        let encoded = encode_png(&sample()).unwrap();
        save_png(&sample(), &path, true).unwrap();

        // The old, longer contents are fully replaced, with no trailing bytes.
        assert_eq!(std::fs::read(&path).unwrap(), encoded);
    }

    #[test]
    fn test_failed_create_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("shot.png");

        let err = save_png(&sample(), &path, false).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert!(!path.exists());
    }
}
