//! High-level image operations.
//!
//! These functions combine calculations with backend execution and put the
//! photo's metadata back into the derivative afterwards.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::jpeg_tags::JpegTagStore;
use super::params::{Quality, ScaleParams};
use crate::metadata::{ORIENTATION_KEYS, TagStore};
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Plan a scale operation without executing it.
pub fn plan_scale(
    source: &Path,
    output: &Path,
    target_height: u32,
    quality: Quality,
) -> ScaleParams {
    ScaleParams {
        source: source.to_path_buf(),
        output: output.to_path_buf(),
        target_height,
        quality,
    }
}

/// Produce a height-anchored JPEG derivative of `source` at `output`.
///
/// The output directory is created if needed. When `metadata` is given it is
/// embedded into the derivative, minus the orientation tags: the pixels are
/// already upright.
pub fn scale_image(
    backend: &(impl ImageBackend + ?Sized),
    source: &Path,
    output: &Path,
    target_height: u32,
    quality: Quality,
    metadata: Option<&JpegTagStore>,
) -> Result<Dimensions> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let dims = backend.scale(&plan_scale(source, output, target_height, quality))?;

    if let Some(metadata) = metadata {
        let mut derivative = JpegTagStore::open(output)?;
        derivative.copy_from(metadata);
        for key in ORIENTATION_KEYS {
            derivative.delete(key);
        }
        derivative.save()?;
    }

    Ok(dims)
}

/// Link `album_path` to the original `file` one directory up (`../<file>`).
///
/// The link is relative so the folder can be moved as a whole.
pub fn link_original(album_path: &Path, file: &str) -> std::io::Result<()> {
    symlink_file(&Path::new("..").join(file), album_path)
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
