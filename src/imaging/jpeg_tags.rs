//! File-backed [`TagStore`] for JPEG photos.
//!
//! [`JpegTagStore::open`] splits the file into marker segments and decodes the
//! EXIF, IPTC and XMP blocks into memory. Edits stay in memory until
//! [`save`](JpegTagStore::save), which splices only the changed blocks back
//! and leaves the compressed scan data untouched.
//!
//! Non-JPEG files open as an empty store so they can still be curated by
//! defaults; saving into them is an error.

use super::exif_block::{self, ExifBlock};
use super::iptc;
use super::segments::{JpegSegments, MetadataBlock};
use super::xmp::XmpPacket;
use crate::metadata::{MetadataError, Namespace, TagStore, TagValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default)]
struct Dirty {
    exif: bool,
    iptc: bool,
    xmp: bool,
}

impl Dirty {
    fn any(self) -> bool {
        self.exif || self.iptc || self.xmp
    }

    fn mark(&mut self, namespace: Namespace) {
        match namespace {
            Namespace::Exif => self.exif = true,
            Namespace::Iptc => self.iptc = true,
            Namespace::Xmp => self.xmp = true,
        }
    }
}

/// Tag handle for one JPEG file.
#[derive(Debug, Clone)]
pub struct JpegTagStore {
    path: PathBuf,
    jpeg: Option<JpegSegments>,
    exif: ExifBlock,
    iptc: BTreeMap<String, TagValue>,
    xmp: XmpPacket,
    dirty: Dirty,
}

impl JpegTagStore {
    /// Read the metadata blocks of `path`.
    ///
    /// A damaged EXIF block is logged and treated as empty; it is only
    /// replaced if EXIF keys are edited.
    pub fn open(path: &Path) -> Result<Self, MetadataError> {
        let bytes = fs::read(path)?;
        let jpeg = JpegSegments::parse(&bytes);

        let mut store = Self {
            path: path.to_path_buf(),
            jpeg: None,
            exif: ExifBlock::default(),
            iptc: BTreeMap::new(),
            xmp: XmpPacket::default(),
            dirty: Dirty::default(),
        };
        let Some(jpeg) = jpeg else {
            tracing::debug!(path = %path.display(), "not a JPEG, no embedded metadata");
            return Ok(store);
        };

        if let Some(payload) = jpeg.find(MetadataBlock::Exif) {
            match ExifBlock::parse(payload) {
                Ok(exif) => store.exif = exif,
                Err(e) => tracing::warn!(path = %path.display(), "ignoring unreadable EXIF: {e}"),
            }
        }
        if let Some(payload) = jpeg.find(MetadataBlock::Iptc) {
            store.iptc = iptc::read_block(payload);
        }
        if let Some(payload) = jpeg.find(MetadataBlock::Xmp) {
            store.xmp = XmpPacket::parse(payload);
        }
        store.jpeg = Some(jpeg);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether there are unsaved edits.
    pub fn is_dirty(&self) -> bool {
        self.dirty.any()
    }

    /// Replace every namespace with a copy of `other`'s tags.
    pub fn copy_from(&mut self, other: &JpegTagStore) {
        self.exif = other.exif.clone();
        self.iptc = other.iptc.clone();
        self.xmp = other.xmp.clone();
        for namespace in Namespace::ALL {
            self.dirty.mark(namespace);
        }
    }

    /// Write changed blocks back to the file.
    ///
    /// Writes through symlinks, so a linked album image updates its source.
    pub fn save(&mut self) -> Result<(), MetadataError> {
        if !self.dirty.any() {
            return Ok(());
        }
        let Some(jpeg) = self.jpeg.as_mut() else {
            return Err(MetadataError::Unsupported(self.path.clone()));
        };

        if self.dirty.exif {
            jpeg.replace(MetadataBlock::Exif, self.exif.to_payload()?)?;
        }
        if self.dirty.iptc {
            let payload = iptc::write_block(jpeg.find(MetadataBlock::Iptc), &self.iptc)?;
            jpeg.replace(MetadataBlock::Iptc, payload)?;
        }
        if self.dirty.xmp {
            jpeg.replace(MetadataBlock::Xmp, self.xmp.to_payload())?;
        }

        fs::write(&self.path, jpeg.to_bytes())?;
        self.dirty = Dirty::default();
        Ok(())
    }
}

impl TagStore for JpegTagStore {
    fn get(&self, key: &str) -> Option<TagValue> {
        match Namespace::of(key)? {
            Namespace::Exif => self.exif.get(key),
            Namespace::Iptc => self.iptc.get(key).cloned(),
            Namespace::Xmp => self.xmp.get(key),
        }
    }

    fn set(&mut self, key: &str, value: TagValue) -> Result<(), MetadataError> {
        let namespace =
            Namespace::of(key).ok_or_else(|| MetadataError::UnknownKey(key.to_string()))?;
        match namespace {
            Namespace::Exif => self.exif.set(key, &value)?,
            Namespace::Iptc => {
                if !iptc::is_known_key(key) {
                    return Err(MetadataError::UnknownKey(key.to_string()));
                }
                self.iptc.insert(key.to_string(), value);
            }
            Namespace::Xmp => self.xmp.set(key, value)?,
        }
        self.dirty.mark(namespace);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> bool {
        let Some(namespace) = Namespace::of(key) else {
            return false;
        };
        let removed = match namespace {
            Namespace::Exif => self.exif.remove(key),
            Namespace::Iptc => self.iptc.remove(key).is_some(),
            Namespace::Xmp => self.xmp.remove(key),
        };
        if removed {
            self.dirty.mark(namespace);
        }
        removed
    }

    fn keys(&self, namespace: Namespace) -> Vec<String> {
        match namespace {
            Namespace::Exif => self.exif.keys(),
            Namespace::Iptc => self.iptc.keys().cloned().collect(),
            Namespace::Xmp => self.xmp.keys(),
        }
    }
}

/// Whether `key` could be written into a JPEG by this store.
pub fn is_writable_key(key: &str) -> bool {
    match Namespace::of(key) {
        Some(Namespace::Exif) => exif_block::tag_for_key(key).is_some(),
        Some(Namespace::Iptc) => iptc::is_known_key(key),
        Some(Namespace::Xmp) => key.splitn(3, '.').count() == 3,
        None => false,
    }
}
