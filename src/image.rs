// Captured pixel buffer and its CPU-side post-processing.
//
// Everything here works on plain 32-bit BGRA rows in memory, so it is shared
// by all backends and testable without a display.

pub mod png;

use std::path::Path;

use crate::error::{CaptureError, CaptureResult};
use crate::geometry::Rect;

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Top-down 32-bit BGRA pixel buffer anchored in screen space.
///
/// Invariant: `data().len() == row_pitch() * height()` and
/// `row_pitch() >= width() * 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    row_pitch: usize,
    origin_x: i32,
    origin_y: i32,
    bgra: Vec<u8>,
}

impl ImageBuffer {
    /// Wrap raw BGRA rows, validating the size invariants.
    pub fn new(
        width: u32,
        height: u32,
        row_pitch: usize,
        origin: (i32, i32),
        bgra: Vec<u8>,
    ) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::config(
                "ImageBuffer::new",
                format!("image size must be non-zero ({width}x{height})"),
            ));
        }
        if width > i32::MAX as u32 || height > i32::MAX as u32 {
            return Err(CaptureError::config(
                "ImageBuffer::new",
                format!("image size {width}x{height} exceeds screen-space range"),
            ));
        }
        let min_pitch = width as usize * BYTES_PER_PIXEL;
        if row_pitch < min_pitch {
            return Err(CaptureError::config(
                "ImageBuffer::new",
                format!("row pitch {row_pitch} smaller than {min_pitch}"),
            ));
        }
        let Some(expected) = row_pitch.checked_mul(height as usize) else {
            return Err(CaptureError::config(
                "ImageBuffer::new",
                format!("row pitch {row_pitch} x height {height} overflows"),
            ));
        };
        if bgra.len() != expected {
            return Err(CaptureError::config(
                "ImageBuffer::new",
                format!("buffer length {} != row pitch {row_pitch} x height {height}", bgra.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            row_pitch,
            origin_x: origin.0,
            origin_y: origin.1,
            bgra,
        })
    }

    /// Tightly packed buffer (`row_pitch == width * 4`).
    pub fn packed(width: u32, height: u32, origin: (i32, i32), bgra: Vec<u8>) -> CaptureResult<Self> {
        Self::new(width, height, width as usize * BYTES_PER_PIXEL, origin, bgra)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Screen-space coordinate of the top-left pixel.
    pub fn origin(&self) -> (i32, i32) {
        (self.origin_x, self.origin_y)
    }

    pub fn data(&self) -> &[u8] {
        &self.bgra
    }

    pub fn into_data(self) -> Vec<u8> {
        self.bgra
    }

    /// Screen-space rectangle covered by the buffer.
    pub fn screen_rect(&self) -> Rect {
        Rect::from_xywh(
            self.origin_x,
            self.origin_y,
            self.width as i32,
            self.height as i32,
        )
    }

    /// BGRA value of a buffer-local pixel, `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.row_pitch + x as usize * BYTES_PER_PIXEL;
        let px = self.bgra.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Pixel bytes of each row, excluding any pitch padding.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        self.bgra
            .chunks_exact(self.row_pitch)
            .map(move |row| &row[..row_bytes])
    }

    /// Force every alpha byte to 255. Color channels and pitch padding are untouched.
    pub fn force_opaque_alpha(&mut self) {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        for row in self.bgra.chunks_exact_mut(self.row_pitch) {
            for px in row[..row_bytes].chunks_exact_mut(BYTES_PER_PIXEL) {
                px[3] = 0xFF;
            }
        }
    }

    /// Keep only the screen-space rectangle `crop`, re-packing rows into a
    /// fresh tightly-pitched buffer.
    ///
    /// `crop` is clipped to the buffer first, so the copy never reads outside
    /// the captured pixels.
    pub fn crop_in_place(&mut self, crop: Rect) -> CaptureResult<()> {
        let clipped = crop.intersect(&self.screen_rect());
        if !clipped.is_valid() {
            return Err(CaptureError::geometry(
                "crop_in_place",
                format!("crop {crop} does not overlap image {}", self.screen_rect()),
            ));
        }

        // Non-negative after clipping against the buffer's own rectangle.
        let x0 = (clipped.left - self.origin_x) as usize;
        let y0 = (clipped.top - self.origin_y) as usize;
        let new_width = clipped.width() as usize;
        let new_height = clipped.height() as usize;

        let row_bytes = new_width * BYTES_PER_PIXEL;
        let start = x0 * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_bytes * new_height);
        for row in self.bgra.chunks_exact(self.row_pitch).skip(y0).take(new_height) {
            out.extend_from_slice(&row[start..start + row_bytes]);
        }

        self.width = new_width as u32;
        self.height = new_height as u32;
        self.row_pitch = row_bytes;
        self.origin_x = clipped.left;
        self.origin_y = clipped.top;
        self.bgra = out;
        Ok(())
    }

    /// Coarse content statistics, useful to spot black or transparent captures.
    pub fn stats(&self) -> ImageStats {
        let pixels = self.width as usize * self.height as usize;
        let mut black = 0usize;
        let mut transparent = 0usize;
        let mut luma_sum = 0.0f64;

        for row in self.rows() {
            for px in row.chunks_exact(BYTES_PER_PIXEL) {
                let (b, g, r, a) = (px[0], px[1], px[2], px[3]);
                if r == 0 && g == 0 && b == 0 {
                    black += 1;
                }
                if a == 0 {
                    transparent += 1;
                }
                luma_sum += 0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64;
            }
        }

        ImageStats {
            black_ratio: black as f64 / pixels as f64,
            transparent_ratio: transparent as f64 / pixels as f64,
            avg_luma: luma_sum / pixels as f64,
        }
    }

    /// Save to file. Format is determined by extension; only `.png` is supported.
    pub fn save(&self, path: impl AsRef<Path>, overwrite: bool) -> CaptureResult<()> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "png" => png::save_png(self, path, overwrite),
            _ => Err(CaptureError::encoding(
                "ImageBuffer::save",
                format!("unsupported extension '.{ext}'; supported: .png"),
            )),
        }
    }
}

/// Content statistics over all pixels of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImageStats {
    /// Share of pixels with R = G = B = 0.
    pub black_ratio: f64,
    /// Share of pixels with A = 0.
    pub transparent_ratio: f64,
    /// Mean Rec.709 luma, 0..=255.
    pub avg_luma: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Buffer whose pixel at buffer-local (x, y) encodes its coordinates.
    fn coordinate_image(width: u32, height: u32, pitch_pad: usize, origin: (i32, i32)) -> ImageBuffer {
        let pitch = width as usize * 4 + pitch_pad;
        let mut data = vec![0xEEu8; pitch * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize {
                let o = y * pitch + x * 4;
                data[o] = x as u8;
                data[o + 1] = y as u8;
                data[o + 2] = (x ^ y) as u8;
                data[o + 3] = 0x10;
            }
        }
        ImageBuffer::new(width, height, pitch, origin, data).unwrap()
    }

    #[test]
    fn test_new_rejects_length_mismatch() {
        let err = ImageBuffer::new(4, 4, 16, (0, 0), vec![0; 60]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);

        assert!(ImageBuffer::new(4, 4, 12, (0, 0), vec![0; 48]).is_err());
        assert!(ImageBuffer::new(0, 4, 0, (0, 0), vec![]).is_err());
    }

    #[test]
    fn test_new_rejects_overflowing_pitch() {
        let err = ImageBuffer::new(1, 3, usize::MAX / 2, (0, 0), vec![]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert!(err.message().contains("overflows"));
    }

    #[test]
    fn test_crop_maps_pixels_back_to_source() {
        let source = coordinate_image(200, 150, 0, (50, 50));
        let mut img = source.clone();
        img.crop_in_place(Rect::new(100, 100, 150, 130)).unwrap();

        assert_eq!((img.width(), img.height()), (50, 30));
        assert_eq!(img.origin(), (100, 100));
        assert_eq!(img.row_pitch(), 50 * 4);
        assert_eq!(img.data().len(), 50 * 30 * 4);

        for y in 0..img.height() {
            for x in 0..img.width() {
                let (sx, sy) = (
                    (x as i32 + 100 - 50) as u32,
                    (y as i32 + 100 - 50) as u32,
                );
                assert_eq!(img.pixel(x, y), source.pixel(sx, sy), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_crop_ignores_pitch_padding() {
        let source = coordinate_image(10, 6, 24, (-5, -3));
        let mut img = source.clone();
        img.crop_in_place(Rect::new(-5, -3, 5, 3)).unwrap();

        assert_eq!(img.row_pitch(), 40);
        assert!(!img.data().contains(&0xEE));
        assert_eq!(img.pixel(9, 5), source.pixel(9, 5));
    }

    #[test]
    fn test_crop_clips_to_buffer() {
        let mut img = coordinate_image(20, 20, 0, (0, 0));
        img.crop_in_place(Rect::new(15, -10, 100, 5)).unwrap();
        assert_eq!(img.screen_rect(), Rect::new(15, 0, 20, 5));
    }

    #[test]
    fn test_crop_outside_buffer_fails() {
        let mut img = coordinate_image(20, 20, 0, (0, 0));
        let before = img.clone();
        let err = img.crop_in_place(Rect::new(30, 30, 40, 40)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Geometry);
        assert_eq!(img, before);
    }

    #[test]
    fn test_force_opaque_alpha_keeps_colors() {
        let source = coordinate_image(16, 8, 8, (0, 0));
        let mut img = source.clone();
        img.force_opaque_alpha();

        for y in 0..img.height() {
            for x in 0..img.width() {
                let before = source.pixel(x, y).unwrap();
                let after = img.pixel(x, y).unwrap();
                assert_eq!(after[3], 255);
                assert_eq!(after[..3], before[..3]);
            }
        }
        // Padding bytes stay as they were.
        assert_eq!(img.data()[16 * 4], 0xEE);
    }

    #[test]
    fn test_stats() {
        // Two pixels: opaque black and transparent white.
        let img = ImageBuffer::packed(2, 1, (0, 0), vec![0, 0, 0, 255, 255, 255, 255, 0]).unwrap();
        let stats = img.stats();
        assert!((stats.black_ratio - 0.5).abs() < 1e-9);
        assert!((stats.transparent_ratio - 0.5).abs() < 1e-9);
        assert!((stats.avg_luma - 127.5).abs() < 1e-6);
    }

    #[test]
    fn test_save_rejects_unknown_extension() {
        let img = ImageBuffer::packed(1, 1, (0, 0), vec![0; 4]).unwrap();
        let err = img.save("out.gif", true).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Encoding);
    }
}
