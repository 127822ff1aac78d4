//! EXIF access through `kamadak-exif`.
//!
//! Fields of the primary image are exposed as `Exif.<Group>.<Name>` keys:
//!
//! | IFD | Group |
//! |---|---|
//! | IFD0 | `Image` |
//! | Exif sub-IFD | `Photo` |
//! | GPS | `GPSInfo` |
//! | Interoperability | `Iop` |
//!
//! IFD pointers and strip offsets are structural and never exposed; the
//! writer regenerates them. The thumbnail IFD is dropped on rewrite, so only
//! freshly encoded album images and thumbnails get a rewritten block; the
//! rating floor on sources goes to XMP or IPTC.

use super::segments::EXIF_HEADER;
use crate::metadata::{MetadataError, TagValue};
use exif::{Context, Field, In, Tag, Value};
use std::io::Cursor;

/// Tags outside the EXIF standard that photo tools write into IFD0.
const EXTRA_TAGS: &[(u16, &str)] = &[(0x4746, "Rating"), (0x4749, "RatingPercent")];

/// Tags written as a single SHORT instead of ASCII.
const NUMERIC_TAGS: &[Tag] = &[
    Tag::Orientation,
    Tag(Context::Tiff, 0x4746),
    Tag(Context::Tiff, 0x4749),
];

/// Standard tags that can be set by name.
const SETTABLE_TAGS: &[Tag] = &[
    Tag::ImageDescription,
    Tag::Make,
    Tag::Model,
    Tag::Orientation,
    Tag::Software,
    Tag::DateTime,
    Tag::Artist,
    Tag::Copyright,
    Tag::DateTimeOriginal,
    Tag::DateTimeDigitized,
];

const STRUCTURAL_TAGS: &[Tag] = &[
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
    Tag::StripOffsets,
    Tag::StripByteCounts,
    Tag::TileOffsets,
    Tag::TileByteCounts,
];

fn group_name(context: Context) -> Option<&'static str> {
    #[allow(unreachable_patterns)]
    match context {
        Context::Tiff => Some("Image"),
        Context::Exif => Some("Photo"),
        Context::Gps => Some("GPSInfo"),
        Context::Interop => Some("Iop"),
        _ => None,
    }
}

fn group_context(group: &str) -> Option<Context> {
    match group {
        "Image" => Some(Context::Tiff),
        "Photo" => Some(Context::Exif),
        "GPSInfo" => Some(Context::Gps),
        "Iop" => Some(Context::Interop),
        _ => None,
    }
}

/// `Exif.<Group>.<Name>` key for a tag.
fn key_for_tag(tag: Tag) -> Option<String> {
    let group = group_name(tag.context())?;
    let extra = EXTRA_TAGS
        .iter()
        .find(|(number, _)| tag.context() == Context::Tiff && *number == tag.number())
        .map(|(_, name)| name.to_string());
    let name = match extra {
        Some(name) => name,
        None if tag.description().is_some() => tag.to_string(),
        None => format!("0x{:04x}", tag.number()),
    };
    Some(format!("Exif.{group}.{name}"))
}

/// Tag for an `Exif.<Group>.<Name>` key that this block can write.
pub(crate) fn tag_for_key(key: &str) -> Option<Tag> {
    let rest = key.strip_prefix("Exif.")?;
    let (group, name) = rest.split_once('.')?;
    let context = group_context(group)?;

    if let Some(hex) = name.strip_prefix("0x") {
        return u16::from_str_radix(hex, 16).ok().map(|n| Tag(context, n));
    }
    let extra = EXTRA_TAGS
        .iter()
        .find(|(_, n)| context == Context::Tiff && *n == name);
    if let Some((number, _)) = extra {
        return Some(Tag(context, *number));
    }
    SETTABLE_TAGS
        .iter()
        .find(|tag| tag.context() == context && tag.to_string() == name)
        .copied()
}

fn field_text(field: &Field) -> String {
    match &field.value {
        Value::Ascii(parts) => parts
            .iter()
            .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
        Value::Byte(v) if v.len() == 1 => v[0].to_string(),
        Value::Short(v) if v.len() == 1 => v[0].to_string(),
        Value::Long(v) if v.len() == 1 => v[0].to_string(),
        _ => field.display_value().to_string(),
    }
}

/// EXIF fields of the primary image.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExifBlock {
    fields: Vec<Field>,
}

impl ExifBlock {
    /// Decode an APP1 EXIF payload (header included).
    pub fn parse(payload: &[u8]) -> Result<Self, MetadataError> {
        let tiff = payload.strip_prefix(EXIF_HEADER).unwrap_or(payload);
        let exif = exif::Reader::new().read_raw(tiff.to_vec())?;
        let fields = exif
            .fields()
            .filter(|f| f.ifd_num == In::PRIMARY)
            .filter(|f| !STRUCTURAL_TAGS.contains(&f.tag))
            .filter(|f| !matches!(f.value, Value::Unknown(..)))
            .filter(|f| group_name(f.tag.context()).is_some())
            .cloned()
            .collect();
        Ok(Self { fields })
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| key_for_tag(f.tag).as_deref() == Some(key))
    }

    pub fn get(&self, key: &str) -> Option<TagValue> {
        self.position(key)
            .map(|i| TagValue::Text(field_text(&self.fields[i])))
    }

    pub fn set(&mut self, key: &str, value: &TagValue) -> Result<(), MetadataError> {
        let tag = tag_for_key(key).ok_or_else(|| MetadataError::UnknownKey(key.to_string()))?;
        let text = value.as_text();
        let value = if NUMERIC_TAGS.contains(&tag) {
            let number: u16 = text
                .trim()
                .parse()
                .map_err(|_| MetadataError::InvalidValue {
                    key: key.to_string(),
                    value: text.clone(),
                })?;
            Value::Short(vec![number])
        } else {
            Value::Ascii(vec![text.into_bytes()])
        };

        let field = Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        };
        match self.position(key) {
            Some(i) => self.fields[i] = field,
            None => self.fields.push(field),
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(i) => {
                self.fields.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.fields.iter().filter_map(|f| key_for_tag(f.tag)).collect()
    }

    /// Encode as an APP1 payload, or `None` when no fields remain.
    pub fn to_payload(&self) -> Result<Option<Vec<u8>>, MetadataError> {
        if self.fields.is_empty() {
            return Ok(None);
        }
        let mut writer = exif::experimental::Writer::new();
        for field in &self.fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false)?;

        let mut payload = EXIF_HEADER.to_vec();
        payload.extend_from_slice(&tiff.into_inner());
        Ok(Some(payload))
    }
}
