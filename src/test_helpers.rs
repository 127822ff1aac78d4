//! Shared test utilities.
//!
//! Synthetic JPEGs are generated with the `image` encoder so tests never
//! depend on fixture files or external tools.
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let photo = tmp.path().join("2021/a.jpg");
//! create_test_jpeg(&photo, 40, 30);
//! tag_photo(&photo, &[("Xmp.xmp.Rating", "2")]);
//! ```

use crate::config::FotosConfig;
use crate::imaging::JpegTagStore;
use crate::metadata::{TagStore, TagValue};
use image::{ImageEncoder, RgbImage};
use std::path::Path;

// =========================================================================
// Image fixtures
// =========================================================================

/// Write a gradient JPEG of the given size, creating parent directories.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Set the EXIF orientation of an existing JPEG.
pub fn set_orientation(path: &Path, orientation: u32) {
    tag_photo(path, &[("Exif.Image.Orientation", &orientation.to_string())]);
}

/// Write text tags into an existing JPEG.
pub fn tag_photo(path: &Path, tags: &[(&str, &str)]) {
    let mut store = JpegTagStore::open(path).unwrap();
    for (key, value) in tags {
        store.set(key, TagValue::text(*value)).unwrap();
    }
    store.save().unwrap();
}

/// Read one tag of a JPEG as text.
pub fn read_tag(path: &Path, key: &str) -> Option<String> {
    JpegTagStore::open(path)
        .unwrap()
        .get(key)
        .map(|v| v.as_text())
}

// =========================================================================
// Config
// =========================================================================

/// Default config searching only `base`, with small sizes so tests stay fast.
pub fn test_config(base: &Path) -> FotosConfig {
    let mut config = FotosConfig {
        paths: vec![base.to_path_buf()],
        ..FotosConfig::default()
    };
    config.images.height = 64;
    config.thumbnails.small = 16;
    config.thumbnails.large = 32;
    config
}

/// Whether `path` is a symbolic link (without following it).
pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}
