//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `fotos.toml`. The file is sparse:
//! user values are merged over the stock defaults, so it only needs the keys
//! it wants to change. Unknown keys are rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! paths = ["."]                     # Base search paths, first match wins
//! extensions = ["jpg", "jpeg"]      # Photo extensions, case-insensitive
//! skip_dirs = ["js", "css", "default-skin", "img"]
//!
//! [layout]
//! album_dir = "album"               # Derivative subfolder of every folder
//! thumb_dir = "thumbs"              # Thumbnail subfolder inside album_dir
//! snapshot_file = "album.json"      # Tree snapshot inside album_dir
//!
//! [thumbnails]
//! small = 200                       # Thumbnail height
//! large = 400                       # Thumbnail height for highly rated photos
//! large_rating = 3                  # Rating from which thumbnails are large
//!
//! [images]
//! height = 1600                     # Album image height
//! quality = 90                      # JPEG quality (1-100)
//!
//! [metadata]
//! caption_keys = ["Xmp.dc.description", "Iptc.Application2.Caption", ...]
//! rating_keys = ["Xmp.xmp.Rating", "Exif.Image.Rating"]
//! # ... date_keys, favorite_keys, tags_keys, keep_keys
//!
//! [processing]
//! max_processes = 4                 # Max parallel workers (omit for auto = CPU cores)
//! ```

use crate::imaging::is_writable_key;
use crate::metadata::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "fotos.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `fotos.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FotosConfig {
    /// Base directories searched, in order, for a requested folder.
    pub paths: Vec<PathBuf>,
    /// File extensions treated as photos, without the dot.
    pub extensions: Vec<String>,
    /// Directory names never descended into. The album and thumbnail
    /// directories are always skipped as well.
    pub skip_dirs: Vec<String>,
    pub layout: LayoutConfig,
    pub thumbnails: ThumbnailsConfig,
    pub images: ImagesConfig,
    pub metadata: MetadataConfig,
    pub processing: ProcessingConfig,
}

impl Default for FotosConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(".")],
            extensions: strings(&["jpg", "jpeg"]),
            skip_dirs: strings(&["js", "css", "default-skin", "img"]),
            layout: LayoutConfig::default(),
            thumbnails: ThumbnailsConfig::default(),
            images: ImagesConfig::default(),
            metadata: MetadataConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl FotosConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.is_empty() {
            return Err(ConfigError::Validation("paths must not be empty".into()));
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "extensions must not be empty".into(),
            ));
        }
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.height == 0 {
            return Err(ConfigError::Validation(
                "images.height must be non-zero".into(),
            ));
        }
        if self.thumbnails.small == 0 || self.thumbnails.large == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.small and thumbnails.large must be non-zero".into(),
            ));
        }
        self.layout.validate()?;
        self.metadata.validate()?;
        Ok(())
    }

    /// First configured base path that contains the folder `relative`.
    pub fn find_base(&self, relative: &Path) -> Option<&Path> {
        self.paths
            .iter()
            .map(PathBuf::as_path)
            .find(|base| base.join(relative).is_dir())
    }

    /// Directory names the folder walk never descends into.
    pub fn skip_set(&self) -> HashSet<String> {
        self.skip_dirs
            .iter()
            .cloned()
            .chain([self.layout.album_dir.clone(), self.layout.thumb_dir.clone()])
            .collect()
    }
}

/// Names of the derivative subfolders and the snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub album_dir: String,
    pub thumb_dir: String,
    pub snapshot_file: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            album_dir: "album".into(),
            thumb_dir: "thumbs".into(),
            snapshot_file: "album.json".into(),
        }
    }
}

impl LayoutConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("layout.album_dir", &self.album_dir),
            ("layout.thumb_dir", &self.thumb_dir),
            ("layout.snapshot_file", &self.snapshot_file),
        ] {
            let plain = !value.is_empty()
                && value != "."
                && value != ".."
                && !value.contains(['/', '\\']);
            if !plain {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a plain file name, got {value:?}"
                )));
            }
        }
        if self.thumb_dir == self.snapshot_file {
            return Err(ConfigError::Validation(
                "layout.thumb_dir and layout.snapshot_file must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Thumbnail heights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    pub small: u32,
    pub large: u32,
    /// Photos rated at least this get the large thumbnail.
    pub large_rating: u32,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            small: 200,
            large: 400,
            large_rating: 3,
        }
    }
}

/// Album image settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Height of album images. Photos smaller than this on both axes are
    /// linked instead of re-encoded.
    pub height: u32,
    /// JPEG encoding quality (1-100).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            height: 1600,
            quality: 90,
        }
    }
}

/// Ordered candidate keys for each curated field.
///
/// The first key present in any namespace wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    pub caption_keys: Vec<String>,
    pub date_keys: Vec<String>,
    pub favorite_keys: Vec<String>,
    pub tags_keys: Vec<String>,
    /// The first key is created when a rating has to be written. It must
    /// be an XMP or IPTC key: EXIF blocks of sources are never rewritten.
    pub rating_keys: Vec<String>,
    /// Extra keys that survive cleaning of album images.
    pub keep_keys: Vec<String>,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            caption_keys: strings(&[
                "Xmp.dc.description",
                "Iptc.Application2.Caption",
                "Exif.Image.ImageDescription",
            ]),
            date_keys: strings(&[
                "Exif.Photo.DateTimeOriginal",
                "Xmp.exif.DateTimeOriginal",
                "Xmp.photoshop.DateCreated",
                "Iptc.Application2.DateCreated",
                "Exif.Image.DateTime",
            ]),
            favorite_keys: strings(&["Xmp.fotos.Favorite"]),
            tags_keys: strings(&["Xmp.dc.subject", "Iptc.Application2.Keywords"]),
            rating_keys: strings(&["Xmp.xmp.Rating", "Exif.Image.Rating"]),
            keep_keys: strings(&[
                "Xmp.fotos.Favorite",
                "Exif.Image.Artist",
                "Exif.Image.Copyright",
            ]),
        }
    }
}

impl MetadataConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let lists = [
            ("metadata.caption_keys", &self.caption_keys),
            ("metadata.date_keys", &self.date_keys),
            ("metadata.favorite_keys", &self.favorite_keys),
            ("metadata.tags_keys", &self.tags_keys),
            ("metadata.rating_keys", &self.rating_keys),
            ("metadata.keep_keys", &self.keep_keys),
        ];
        for (name, keys) in lists {
            if let Some(bad) = keys.iter().find(|k| Namespace::of(k).is_none()) {
                return Err(ConfigError::Validation(format!(
                    "{name}: {bad:?} must start with Exif., Iptc. or Xmp."
                )));
            }
        }
        match self.rating_keys.first() {
            None => Err(ConfigError::Validation(
                "metadata.rating_keys must not be empty".into(),
            )),
            Some(first) if !is_writable_key(first) => Err(ConfigError::Validation(format!(
                "metadata.rating_keys: {first:?} cannot be written, put a writable key first"
            ))),
            Some(first) if Namespace::of(first) == Some(Namespace::Exif) => {
                Err(ConfigError::Validation(format!(
                    "metadata.rating_keys: {first:?} is EXIF, put an Xmp. or Iptc. key first"
                )))
            }
            Some(_) => Ok(()),
        }
    }

    /// Keys that survive cleaning: every caption, rating, tag and date
    /// candidate plus the explicit keep list.
    pub fn keep_set(&self) -> HashSet<String> {
        self.caption_keys
            .iter()
            .chain(&self.rating_keys)
            .chain(&self.tags_keys)
            .chain(&self.date_keys)
            .chain(&self.keep_keys)
            .cloned()
            .collect()
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel photo workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least 1
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// The stock default config as a `toml::Value::Table`, the base layer for
/// merging user overrides.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(FotosConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely, so a list
///   in the user file replaces the stock list.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` if it does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<FotosConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: FotosConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to the stock defaults when the
/// file does not exist.
pub fn load_config(path: &Path) -> Result<FotosConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_none() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
    }
    resolve_config(overlay)
}

/// A fully-commented stock `fotos.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# fotos configuration
# ====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Base directories searched for a requested folder. The first one that
# contains the folder is used.
paths = ["."]

# Photo file extensions, matched case-insensitively.
extensions = ["jpg", "jpeg"]

# Directory names that are never treated as albums. The album and thumbnail
# directories below are always skipped too.
skip_dirs = ["js", "css", "default-skin", "img"]

# ---------------------------------------------------------------------------
# Layout inside every photo folder
# ---------------------------------------------------------------------------
[layout]
# Subfolder holding album images and the snapshot.
album_dir = "album"
# Subfolder of album_dir holding thumbnails.
thumb_dir = "thumbs"
# Tree snapshot written inside album_dir. Its presence marks the folder as
# managed: only managed album folders are ever deleted by --force.
snapshot_file = "album.json"

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Thumbnail heights in pixels.
small = 200
large = 400
# Photos rated at least this get the large thumbnail.
large_rating = 3

# ---------------------------------------------------------------------------
# Album images
# ---------------------------------------------------------------------------
[images]
# Album image height in pixels. Photos smaller than this on both axes are
# linked to the original instead of re-encoded.
height = 1600
# JPEG encoding quality (1 = worst, 100 = best).
quality = 90

# ---------------------------------------------------------------------------
# Metadata keys
# ---------------------------------------------------------------------------
# Each field lists candidate keys in priority order. The first key present
# in any of the EXIF, IPTC or XMP namespaces wins.
[metadata]
caption_keys = ["Xmp.dc.description", "Iptc.Application2.Caption", "Exif.Image.ImageDescription"]
date_keys = [
    "Exif.Photo.DateTimeOriginal",
    "Xmp.exif.DateTimeOriginal",
    "Xmp.photoshop.DateCreated",
    "Iptc.Application2.DateCreated",
    "Exif.Image.DateTime",
]
# A photo is a favorite when this value is exactly "1".
favorite_keys = ["Xmp.fotos.Favorite"]
tags_keys = ["Xmp.dc.subject", "Iptc.Application2.Keywords"]
# The first key is written when a rating has to be created. It must be an
# Xmp. or Iptc. key; fotos never rewrites the EXIF block of a source.
rating_keys = ["Xmp.xmp.Rating", "Exif.Image.Rating"]
# Album images keep only the keys above plus these; everything else
# (maker notes, GPS, serial numbers) is stripped.
keep_keys = ["Xmp.fotos.Favorite", "Exif.Image.Artist", "Exif.Image.Copyright"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel photo workers within one folder.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
