//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode | `image::ImageReader` with content sniffing |
//! | Orientation | `kamadak-exif` tag read + `DynamicImage` rotate/flip |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{oriented_dimensions, scaled_dimensions};
use super::params::ScaleParams;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// EXIF orientation of a file, 1 when absent or unreadable.
fn read_orientation(path: &Path) -> u32 {
    let Ok(file) = File::open(path) else {
        return 1;
    };
    let mut reader = BufReader::new(file);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut reader) else {
        return 1;
    };
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

/// Rotate/flip pixels so they match the displayed orientation.
fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        // transpose: rotate90 + flip_horizontal
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        // transverse: rotate270 + flip_horizontal
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn save_jpeg(img: &DynamicImage, path: &Path, quality: u8) -> Result<(), BackendError> {
    let file = File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(writer, quality);
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::Encode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| BackendError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(oriented_dimensions(
            Dimensions { width, height },
            read_orientation(path),
        ))
    }

    fn scale(&self, params: &ScaleParams) -> Result<Dimensions, BackendError> {
        let img = load_image(&params.source)?;
        let img = apply_orientation(img, read_orientation(&params.source));

        let target = scaled_dimensions(
            Dimensions {
                width: img.width(),
                height: img.height(),
            },
            params.target_height,
        );
        let resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
        save_jpeg(&resized, &params.output, params.quality.as_u8())?;

        tracing::debug!(
            source = %params.source.display(),
            output = %params.output.display(),
            width = target.width,
            height = target.height,
            "scaled"
        );
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::params::Quality;
    use crate::test_helpers::{create_test_jpeg, set_orientation};
    use tempfile::TempDir;

    fn scale_params(source: &Path, output: &Path, target_height: u32) -> ScaleParams {
        ScaleParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            target_height,
            quality: Quality::new(85),
        }
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions::new(200, 150));
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn identify_honors_orientation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rotated.jpg");
        create_test_jpeg(&path, 40, 20);
        set_orientation(&path, 6);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions::new(20, 40));
    }

    #[test]
    fn scale_anchors_height() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.jpg");
        let output = tmp.path().join("out.jpg");
        create_test_jpeg(&source, 400, 300);

        let dims = RustBackend::new()
            .scale(&scale_params(&source, &output, 150))
            .unwrap();

        assert_eq!(dims, Dimensions::new(200, 150));
        assert_eq!(image::image_dimensions(&output).unwrap(), (200, 150));
    }

    #[test]
    fn scale_applies_orientation_before_resizing() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("rotated.jpg");
        let output = tmp.path().join("out.jpg");
        create_test_jpeg(&source, 40, 20);
        set_orientation(&source, 6);

        let dims = RustBackend::new()
            .scale(&scale_params(&source, &output, 10))
            .unwrap();

        assert_eq!(dims, Dimensions::new(5, 10));
        assert_eq!(image::image_dimensions(&output).unwrap(), (5, 10));
    }

    #[test]
    fn scale_decodes_by_content_not_extension() {
        let tmp = TempDir::new().unwrap();
        let jpeg = tmp.path().join("real.jpg");
        let source = tmp.path().join("misnamed.png");
        let output = tmp.path().join("out.jpg");
        create_test_jpeg(&jpeg, 60, 30);
        std::fs::rename(&jpeg, &source).unwrap();

        let dims = RustBackend::new()
            .scale(&scale_params(&source, &output, 10))
            .unwrap();
        assert_eq!(dims, Dimensions::new(20, 10));
    }

    #[test]
    fn scale_garbage_is_decode_error() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("broken.jpg");
        std::fs::write(&source, b"\xFF\xD8 not really").unwrap();

        let result = RustBackend::new().scale(&scale_params(
            &source,
            &tmp.path().join("out.jpg"),
            10,
        ));
        assert!(matches!(result, Err(BackendError::Decode { .. })));
    }

    #[test]
    fn apply_orientation_transforms() {
        let img = DynamicImage::new_rgb8(4, 2);
        assert_eq!(apply_orientation(img.clone(), 1).width(), 4);
        assert_eq!(apply_orientation(img.clone(), 3).width(), 4);
        for orientation in 5..=8 {
            let out = apply_orientation(img.clone(), orientation);
            assert_eq!((out.width(), out.height()), (2, 4));
        }
    }
}
