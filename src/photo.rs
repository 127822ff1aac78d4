//! Per-photo selection policy and derivative generation.
//!
//! For every photo file of a folder, [`process_photo`] decides whether the
//! photo is *selected* (`rating >= 1` or favorite) and keeps its derivatives
//! in step:
//!
//! ```text
//! 2021/
//! ├── IMG_0001.JPG                 ← source, rating 3
//! └── album/
//!     ├── IMG_0001.jpg             ← album image (scaled, or a link for small photos)
//!     └── thumbs/IMG_0001.jpg      ← thumbnail, regenerated on every build
//! ```
//!
//! ## Metadata of record
//!
//! Once an album image exists its metadata wins over the source's, so
//! captions and tags edited on the album image stick. The rating is the
//! exception: it is always read from the source, after the source has been
//! lifted to at least 1 (an existing album image means the photo was
//! selected once).
//!
//! ## Derivative policy
//!
//! | Selected | Album image exists | Album image | Thumbnail |
//! |---|---|---|---|
//! | no | any | left alone | left alone |
//! | yes | yes | kept | regenerated |
//! | yes | no, photo reaches the album height | scaled | regenerated |
//! | yes | no, photo smaller on both axes | linked to `../<file>` | regenerated |

use crate::config::FotosConfig;
use crate::imaging::{
    BackendError, Dimensions, ImageBackend, JpegTagStore, Quality, link_original, needs_resize,
    scale_image, thumbnail_height,
};
use crate::metadata::{self, MetadataError, TagStore};
use crate::naming;
use crate::types::PhotoRecord;
use chrono::{Local, NaiveDateTime};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

/// Everything photo processing needs besides the photo itself.
pub struct PhotoContext<'a> {
    pub config: &'a FotosConfig,
    pub backend: &'a dyn ImageBackend,
    keep: HashSet<String>,
    quality: Quality,
}

impl<'a> PhotoContext<'a> {
    pub fn new(config: &'a FotosConfig, backend: &'a dyn ImageBackend) -> Self {
        Self {
            config,
            backend,
            keep: config.metadata.keep_set(),
            quality: Quality::new(config.images.quality),
        }
    }
}

/// What happened to the album image this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlbumImage {
    /// Already present, reused.
    Existing,
    /// Scaled from the source.
    Encoded,
    /// Linked to the source, which is smaller than the album height.
    Linked,
    /// Not selected, nothing produced.
    Skipped,
}

/// Per-photo outcome, for progress output.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoReport {
    pub file: String,
    pub selected: bool,
    pub album: AlbumImage,
    /// Thumbnail dimensions when one was generated.
    pub thumbnail: Option<Dimensions>,
    /// The source rating was lifted to 1.
    pub rating_healed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPhoto {
    pub record: PhotoRecord,
    pub report: PhotoReport,
}

/// Derivative locations of one photo.
struct DerivativePaths {
    source: PathBuf,
    album: PathBuf,
    thumbnail: PathBuf,
}

impl DerivativePaths {
    fn new(folder: &Path, file: &str, config: &FotosConfig) -> Self {
        let derived = naming::derivative_file_name(file);
        let album_dir = folder.join(&config.layout.album_dir);
        Self {
            source: folder.join(file),
            thumbnail: album_dir.join(&config.layout.thumb_dir).join(&derived),
            album: album_dir.join(derived),
        }
    }
}

/// Process one photo of `folder`.
///
/// `has_album` tells whether the folder's album directory survived from a
/// previous build; without it no album image is considered to exist.
pub fn process_photo(
    ctx: &PhotoContext<'_>,
    folder: &Path,
    file: &str,
    has_album: bool,
) -> Result<ProcessedPhoto, PhotoError> {
    let config = ctx.config;
    let keys = &config.metadata;
    let paths = DerivativePaths::new(folder, file, config);

    // A dangling link does not count as an existing album image
    let album_exists = has_album && paths.album.exists();

    let mut source_tags = JpegTagStore::open(&paths.source)?;
    let mut tags = if album_exists {
        JpegTagStore::open(&paths.album)?
    } else {
        source_tags.clone()
    };

    let caption = metadata::caption(metadata::resolve(&tags, &keys.caption_keys).as_ref());
    let date_time = metadata::capture_date(metadata::resolve(&tags, &keys.date_keys).as_ref())
        .unwrap_or_else(now);
    let favorite = metadata::is_favorite(metadata::resolve(&tags, &keys.favorite_keys).as_ref());
    let tag_list = metadata::tag_list(metadata::resolve(&tags, &keys.tags_keys).as_ref());

    let mut rating_healed = false;
    if album_exists {
        rating_healed = metadata::write_rating_floor(&mut source_tags, &keys.rating_keys)?;
        if rating_healed {
            persist_source_tags(&mut source_tags)?;
            metadata::write_rating_floor(&mut tags, &keys.rating_keys)?;
            tracing::info!(file = %paths.source.display(), "raised rating to 1");
        }
    }
    let rating = metadata::rating(metadata::resolve(&source_tags, &keys.rating_keys).as_ref());
    let selected = rating >= 1 || favorite;

    let native = ctx.backend.identify(&paths.source)?;

    let (mut album, mut album_dims) = if album_exists {
        (AlbumImage::Existing, ctx.backend.identify(&paths.album)?)
    } else {
        (AlbumImage::Skipped, native)
    };
    let mut thumbnail = None;

    if selected {
        let removed = metadata::clean(&mut tags, &ctx.keep);
        tracing::debug!(file, removed, "cleaned metadata");

        let thumb_height = thumbnail_height(
            rating,
            config.thumbnails.large_rating,
            config.thumbnails.small,
            config.thumbnails.large,
        );
        remove_stale(&paths.thumbnail)?;
        thumbnail = Some(scale_image(
            ctx.backend,
            &paths.source,
            &paths.thumbnail,
            thumb_height,
            ctx.quality,
            Some(&tags),
        )?);

        if !album_exists {
            remove_stale(&paths.album)?;
            if needs_resize(native, config.images.height) {
                album_dims = scale_image(
                    ctx.backend,
                    &paths.source,
                    &paths.album,
                    config.images.height,
                    ctx.quality,
                    Some(&tags),
                )?;
                album = AlbumImage::Encoded;
            } else {
                if let Some(parent) = paths.album.parent() {
                    fs::create_dir_all(parent)?;
                }
                link_original(&paths.album, file)?;
                album = AlbumImage::Linked;
            }
        }
    }

    let thumb_dims = thumbnail.unwrap_or(Dimensions::new(0, 0));
    let record = PhotoRecord {
        date_time,
        file: file.to_string(),
        caption,
        width: album_dims.width,
        height: album_dims.height,
        thumb_width: thumb_dims.width,
        thumb_height: thumb_dims.height,
        thumb_dir: config.layout.thumb_dir.clone(),
        tags: tag_list,
        rating,
        favorite,
    };
    let report = PhotoReport {
        file: file.to_string(),
        selected,
        album,
        thumbnail,
        rating_healed,
    };
    Ok(ProcessedPhoto { record, report })
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Save a healed rating into the source. Sources without a metadata
/// container keep their in-memory rating only.
fn persist_source_tags(store: &mut JpegTagStore) -> Result<(), MetadataError> {
    match store.save() {
        Err(MetadataError::Unsupported(path)) => {
            tracing::warn!(path = %path.display(), "cannot store rating in this file format");
            Ok(())
        }
        other => other,
    }
}

/// Remove a file or link at `path` so a fresh derivative never writes
/// through an old link into the source.
fn remove_stale(path: &Path) -> std::io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(path),
        _ => Ok(()),
    }
}
