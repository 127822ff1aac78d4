//! Photo metadata access across the three tag namespaces.
//!
//! Every photo can carry curation data in three independent key spaces:
//!
//! | Namespace | Example key | Typical writer |
//! |---|---|---|
//! | EXIF (capture tool) | `Exif.Image.Rating`, `Exif.Photo.DateTimeOriginal` | camera, phone |
//! | IPTC (embedded standard) | `Iptc.Application2.Caption`, `Iptc.Application2.Keywords` | Lightroom, Photo Mechanic |
//! | XMP (extensible) | `Xmp.xmp.Rating`, `Xmp.dc.subject` | Lightroom, digiKam, darktable |
//!
//! Keys use the `Family.Group.Name` convention; the family prefix selects the
//! namespace. Storage is abstracted behind [`TagStore`], so the resolution
//! rules below are pure functions that never care where a value lives.
//!
//! ## Resolution
//!
//! A logical field (caption, rating, ...) is configured as an ordered list of
//! candidate keys. [`resolve`] returns the first candidate present in the
//! *union* of all namespaces. Priority is the candidate order, never the
//! namespace order:
//!
//! ```text
//! candidates: [Xmp.xmp.Rating, Exif.Image.Rating]
//! store:      Exif.Image.Rating = 4, Xmp.xmp.Rating = 2
//! resolved:   Xmp.xmp.Rating = 2
//! ```
//!
//! ## Cleaning
//!
//! [`clean`] strips every key not on an allow-list. It runs on the metadata
//! copied into distributable derivatives and drops bulky or sensitive
//! tool-specific data (maker notes, GPS, serial numbers) while keeping the
//! curation fields.
//!
//! ## Rating floor
//!
//! [`write_rating_floor`] lifts a zero or missing rating to 1. A photo that
//! already has an album image was selected at some point; the floor reflects
//! that back into the source file.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("Unsupported tag key: {0}")]
    UnknownKey(String),
    #[error("Cannot write metadata into non-JPEG file: {0}")]
    Unsupported(PathBuf),
    #[error("Metadata segment too large for a JPEG marker ({0} bytes)")]
    SegmentTooLarge(usize),
    #[error("Value too long for {0}")]
    ValueTooLong(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// One of the three independent metadata key spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Exif,
    Iptc,
    Xmp,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Exif, Namespace::Iptc, Namespace::Xmp];

    /// Namespace of a `Family.Group.Name` key, by its family prefix.
    pub fn of(key: &str) -> Option<Namespace> {
        match key.split('.').next()? {
            "Exif" => Some(Namespace::Exif),
            "Iptc" => Some(Namespace::Iptc),
            "Xmp" => Some(Namespace::Xmp),
            _ => None,
        }
    }
}

/// A tag value: a single text or an ordered list (keywords, XMP bags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Text(String),
    List(Vec<String>),
}

impl TagValue {
    pub fn text(value: impl Into<String>) -> Self {
        TagValue::Text(value.into())
    }

    /// Flatten to a single string. Lists are joined with `", "`.
    pub fn as_text(&self) -> String {
        match self {
            TagValue::Text(s) => s.clone(),
            TagValue::List(items) => items.join(", "),
        }
    }
}

/// Read/write access to a photo's tag namespaces.
///
/// Implementations mutate an in-memory handle; persisting it is the
/// implementation's own business (see
/// [`JpegTagStore::save`](crate::imaging::JpegTagStore::save)).
pub trait TagStore {
    fn get(&self, key: &str) -> Option<TagValue>;

    fn set(&mut self, key: &str, value: TagValue) -> Result<(), MetadataError>;

    /// Remove a key. Returns `true` if it was present.
    fn delete(&mut self, key: &str) -> bool;

    /// All keys present in one namespace.
    fn keys(&self, namespace: Namespace) -> Vec<String>;

    /// All keys across every namespace.
    fn all_keys(&self) -> Vec<String> {
        Namespace::ALL
            .iter()
            .flat_map(|ns| self.keys(*ns))
            .collect()
    }
}

/// Map-backed [`TagStore`], useful when no file is involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTagStore {
    tags: BTreeMap<String, TagValue>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: TagValue) -> Self {
        self.tags.insert(key.to_string(), value);
        self
    }
}

impl TagStore for MemoryTagStore {
    fn get(&self, key: &str) -> Option<TagValue> {
        self.tags.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: TagValue) -> Result<(), MetadataError> {
        if Namespace::of(key).is_none() {
            return Err(MetadataError::UnknownKey(key.to_string()));
        }
        self.tags.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> bool {
        self.tags.remove(key).is_some()
    }

    fn keys(&self, namespace: Namespace) -> Vec<String> {
        self.tags
            .keys()
            .filter(|k| Namespace::of(k) == Some(namespace))
            .cloned()
            .collect()
    }
}

/// A candidate key that matched, with its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    pub key: String,
    pub value: TagValue,
}

/// Return the first candidate key present in any namespace.
pub fn resolve<S: TagStore + ?Sized>(store: &S, candidates: &[String]) -> Option<ResolvedTag> {
    let present: HashSet<String> = store.all_keys().into_iter().collect();
    candidates
        .iter()
        .filter(|key| present.contains(key.as_str()))
        .find_map(|key| {
            store.get(key).map(|value| ResolvedTag {
                key: key.clone(),
                value,
            })
        })
}

/// Delete every key not in `keep`. Returns the number of removed keys.
pub fn clean<S: TagStore + ?Sized>(store: &mut S, keep: &HashSet<String>) -> usize {
    store
        .all_keys()
        .into_iter()
        .filter(|key| !keep.contains(key))
        .filter(|key| store.delete(key))
        .count()
}

/// Lift a zero or missing rating to 1.
///
/// - rating present and exactly 0 → the same key is rewritten to `1`
/// - zero found under an `Exif.*` key → the first non-EXIF candidate gets
///   `1` instead, shadowing the zero; EXIF blocks of sources are never
///   rewritten
/// - no rating key at all → the first non-EXIF candidate is created with `1`
/// - anything else, rejected (`-1`) ratings included, is left alone
///
/// Returns `true` when the store changed.
pub fn write_rating_floor<S: TagStore + ?Sized>(
    store: &mut S,
    rating_keys: &[String],
) -> Result<bool, MetadataError> {
    let target = match resolve(store, rating_keys) {
        Some(tag) if parse_signed_rating(&tag.value) == Some(0) => {
            if Namespace::of(&tag.key) == Some(Namespace::Exif) {
                first_non_exif(rating_keys)
            } else {
                Some(tag.key)
            }
        }
        Some(_) => return Ok(false),
        None => first_non_exif(rating_keys),
    };
    match target {
        Some(key) => {
            store.set(&key, TagValue::text("1"))?;
            Ok(true)
        }
        None => {
            tracing::warn!("no non-EXIF rating key to write a rating floor into");
            Ok(false)
        }
    }
}

fn first_non_exif(keys: &[String]) -> Option<String> {
    keys.iter()
        .find(|k| Namespace::of(k) != Some(Namespace::Exif))
        .cloned()
}

/// Orientation keys that must not survive into re-oriented pixels.
pub const ORIENTATION_KEYS: &[&str] = &["Exif.Image.Orientation", "Xmp.tiff.Orientation"];

// ============================================================================
// Field interpreters
// ============================================================================

/// Caption text, trimmed. Missing or blank collapses to an empty string.
pub fn caption(tag: Option<&ResolvedTag>) -> String {
    tag.map(|t| t.value.as_text().trim().to_string())
        .unwrap_or_default()
}

/// Favorite flag: set iff the value is exactly `"1"`.
pub fn is_favorite(tag: Option<&ResolvedTag>) -> bool {
    tag.is_some_and(|t| t.value.as_text().trim() == "1")
}

/// Free-form tags. Lists are taken item by item; text is split on commas.
pub fn tag_list(tag: Option<&ResolvedTag>) -> Vec<String> {
    let items: Vec<String> = match tag.map(|t| &t.value) {
        Some(TagValue::List(items)) => items.clone(),
        Some(TagValue::Text(text)) => text.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Signed numeric rating, as written. XMP marks rejected photos with `-1`.
/// Returns `None` when the value is not a number.
pub fn parse_signed_rating(value: &TagValue) -> Option<i64> {
    let number: f64 = value.as_text().trim().parse().ok()?;
    Some(number.round() as i64)
}

/// Numeric rating for records. Negative ratings clamp to 0.
pub fn parse_rating(value: &TagValue) -> Option<u32> {
    parse_signed_rating(value).map(|n| n.max(0) as u32)
}

/// Rating of a resolved tag, 0 when absent or unparseable.
pub fn rating(tag: Option<&ResolvedTag>) -> u32 {
    tag.and_then(|t| parse_rating(&t.value)).unwrap_or(0)
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y:%m:%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y:%m:%d", "%Y%m%d"];

/// Parse the date formats found across EXIF, IPTC and XMP.
///
/// Timestamps with an offset keep their local wall-clock time.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.naive_local());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Capture date of a resolved tag, if it parses.
pub fn capture_date(tag: Option<&ResolvedTag>) -> Option<NaiveDateTime> {
    let tag = tag?;
    let parsed = parse_date(&tag.value.as_text());
    if parsed.is_none() {
        tracing::warn!(key = %tag.key, value = %tag.value.as_text(), "unparseable capture date");
    }
    parsed
}
