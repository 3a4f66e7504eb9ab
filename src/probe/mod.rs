/// Image metadata probe
///
/// This module handles:
/// - The codec seam (`ShapeDecoder`) the pipeline uses to learn image shapes
/// - The default decoder backed by the `image` crate
/// - Converting per-image decode failures into missing metadata
/// - Parallel probing with timeouts (loader.rs)

pub mod loader;

use image::{ImageDecoder, ImageReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::state::record::Shape;

pub use loader::probe_all;

/// Why a single image could not be measured.
/// Never escapes `extract`; the batch keeps going.
#[derive(Debug, Error)]
pub enum DecodeFailure {
    #[error("cannot open file: {0}")]
    Open(#[from] std::io::Error),

    #[error("cannot decode image: {0}")]
    Codec(#[from] image::ImageError),

    #[error("decode exceeded {0}ms")]
    Timeout(u128),

    #[error("decoder task failed: {0}")]
    Task(String),
}

/// The image-codec collaborator: given a path, report (height, width, channels).
pub trait ShapeDecoder: Send + Sync {
    fn decode_shape(&self, path: &Path) -> Result<Shape, DecodeFailure>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec {
    /// Decode every pixel instead of stopping at the header.
    /// Slower, but truncated files are reported as unreadable.
    pub full_decode: bool,
}

impl ImageCodec {
    pub fn new(full_decode: bool) -> Self {
        Self { full_decode }
    }
}

impl ShapeDecoder for ImageCodec {
    fn decode_shape(&self, path: &Path) -> Result<Shape, DecodeFailure> {
        // Sniff the format from magic bytes, extensions can lie
        let reader = ImageReader::open(path)?.with_guessed_format()?;

        if self.full_decode {
            let img = reader.decode()?;
            return Ok(Shape::new(
                img.height(),
                img.width(),
                img.color().channel_count(),
            ));
        }

        let decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        let depth = decoder.color_type().channel_count();

        Ok(Shape::new(height, width, depth))
    }
}

/// Probe one image.
///
/// # Returns
/// * `Some(shape)` - the image could be decoded
/// * `None` - corrupt, missing or unsupported file (logged, not an error)
pub fn extract(decoder: &dyn ShapeDecoder, absolute_path: &str) -> Option<Shape> {
    match decoder.decode_shape(Path::new(absolute_path)) {
        Ok(shape) => Some(shape),
        Err(e) => {
            debug!(path = absolute_path, error = %e, "image could not be probed");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fake codec returning fixed shapes; unknown paths fail to decode
    pub(crate) struct FixedDecoder {
        pub shapes: HashMap<String, Shape>,
    }

    impl FixedDecoder {
        pub(crate) fn new(entries: &[(&str, Shape)]) -> Self {
            Self {
                shapes: entries
                    .iter()
                    .map(|(path, shape)| (path.to_string(), *shape))
                    .collect(),
            }
        }
    }

    impl ShapeDecoder for FixedDecoder {
        fn decode_shape(&self, path: &Path) -> Result<Shape, DecodeFailure> {
            self.shapes
                .get(path.to_string_lossy().as_ref())
                .copied()
                .ok_or_else(|| {
                    DecodeFailure::Open(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "not an image",
                    ))
                })
        }
    }

    #[test]
    fn test_extract_png_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        image::RgbImage::new(40, 30).save(&path).unwrap();

        let shape = extract(&ImageCodec::default(), &path.to_string_lossy()).unwrap();
        assert_eq!(shape, Shape::new(30, 40, 3));
    }

    #[test]
    fn test_extract_reports_alpha_and_gray_channels() {
        let dir = tempfile::tempdir().unwrap();
        let rgba = dir.path().join("rgba.png");
        let gray = dir.path().join("gray.png");
        image::RgbaImage::new(8, 16).save(&rgba).unwrap();
        image::GrayImage::new(5, 7).save(&gray).unwrap();

        let codec = ImageCodec::new(true);
        assert_eq!(extract(&codec, &rgba.to_string_lossy()), Some(Shape::new(16, 8, 4)));
        assert_eq!(extract(&codec, &gray.to_string_lossy()), Some(Shape::new(7, 5, 1)));
    }

    #[test]
    fn test_extract_ignores_misleading_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("real.png");
        image::RgbImage::new(12, 9).save(&png).unwrap();
        let renamed = dir.path().join("actually_png.jpg");
        std::fs::rename(&png, &renamed).unwrap();

        let shape = extract(&ImageCodec::default(), &renamed.to_string_lossy());
        assert_eq!(shape, Some(Shape::new(9, 12, 3)));
    }

    #[test]
    fn test_extract_corrupt_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"<html>definitely not a jpeg</html>").unwrap();

        assert_eq!(extract(&ImageCodec::default(), &path.to_string_lossy()), None);
        assert_eq!(extract(&ImageCodec::new(true), &path.to_string_lossy()), None);
    }

    #[test]
    fn test_extract_missing_file_is_none() {
        assert_eq!(extract(&ImageCodec::default(), "/nonexistent/path.png"), None);
    }
}
