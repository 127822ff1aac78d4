//! IPTC-IIM codec for the JPEG APP13 segment.
//!
//! APP13 holds a Photoshop resource block: `"Photoshop 3.0\0"` followed by
//! `8BIM` resources. Resource `0x0404` carries the raw IIM datasets:
//!
//! ```text
//! 0x1C  record  dataset  length(u16 BE)  data...
//! ```
//!
//! Only the application record (2) is exposed, as `Iptc.Application2.<Name>`
//! keys. Repeatable datasets (keywords, bylines) read back as lists. Other
//! `8BIM` resources (thumbnails, resolution info) are preserved when the
//! block is rewritten.

use super::segments::PHOTOSHOP_HEADER;
use crate::metadata::{MetadataError, TagValue};
use std::collections::BTreeMap;

const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;
const TAG_MARKER: u8 = 0x1C;
const APPLICATION_RECORD: u8 = 2;
const KEY_PREFIX: &str = "Iptc.Application2.";

/// Longest value a standard (non-extended) dataset can carry.
const MAX_DATASET_LEN: usize = 0x7FFF;

/// Record 2 datasets: (number, name, repeatable).
const DATASETS: &[(u8, &str, bool)] = &[
    (5, "ObjectName", false),
    (7, "EditStatus", false),
    (10, "Urgency", false),
    (15, "Category", false),
    (20, "SuppCategory", true),
    (25, "Keywords", true),
    (40, "SpecialInstructions", false),
    (55, "DateCreated", false),
    (60, "TimeCreated", false),
    (80, "Byline", true),
    (85, "BylineTitle", true),
    (90, "City", false),
    (92, "SubLocation", false),
    (95, "ProvinceState", false),
    (100, "CountryCode", false),
    (101, "CountryName", false),
    (103, "TransmissionReference", false),
    (105, "Headline", false),
    (110, "Credit", false),
    (115, "Source", false),
    (116, "Copyright", false),
    (120, "Caption", false),
    (122, "Writer", true),
];

fn dataset_by_number(number: u8) -> Option<(&'static str, bool)> {
    DATASETS
        .iter()
        .find(|(n, _, _)| *n == number)
        .map(|(_, name, repeatable)| (*name, *repeatable))
}

fn dataset_by_key(key: &str) -> Option<(u8, bool)> {
    let name = key.strip_prefix(KEY_PREFIX)?;
    DATASETS
        .iter()
        .find(|(_, n, _)| *n == name)
        .map(|(number, _, repeatable)| (*number, *repeatable))
}

/// Whether `key` names an application-record dataset this codec can write.
pub(crate) fn is_known_key(key: &str) -> bool {
    dataset_by_key(key).is_some()
}

// ---------------------------------------------------------------------------
// 8BIM resources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Resource {
    id: u16,
    /// Pascal string, length byte included, without padding.
    name: Vec<u8>,
    data: Vec<u8>,
}

fn parse_resources(payload: &[u8]) -> Vec<Resource> {
    let data = payload.strip_prefix(PHOTOSHOP_HEADER).unwrap_or(payload);
    let mut resources = Vec::new();
    let mut pos = 0;

    while pos + 12 <= data.len() {
        if &data[pos..pos + 4] != BIM_MARKER {
            break;
        }
        pos += 4;
        let id = u16::from_be_bytes([data[pos], data[pos + 1]]);
        pos += 2;

        let name_len = data[pos] as usize;
        let name_total = 1 + name_len + ((1 + name_len) % 2);
        if pos + name_total + 4 > data.len() {
            break;
        }
        let name = data[pos..pos + 1 + name_len].to_vec();
        pos += name_total;

        let len =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if pos + len > data.len() {
            break;
        }
        resources.push(Resource {
            id,
            name,
            data: data[pos..pos + len].to_vec(),
        });
        pos += len + (len % 2);
    }

    resources
}

fn write_resources(resources: &[Resource]) -> Vec<u8> {
    let mut out = PHOTOSHOP_HEADER.to_vec();
    for resource in resources {
        out.extend_from_slice(BIM_MARKER);
        out.extend_from_slice(&resource.id.to_be_bytes());
        let name = if resource.name.is_empty() {
            &[0u8][..]
        } else {
            &resource.name[..]
        };
        out.extend_from_slice(name);
        if name.len() % 2 == 1 {
            out.push(0);
        }
        out.extend_from_slice(&(resource.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&resource.data);
        if resource.data.len() % 2 == 1 {
            out.push(0);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// IIM datasets
// ---------------------------------------------------------------------------

fn parse_iim(data: &[u8]) -> BTreeMap<String, TagValue> {
    let mut tags: BTreeMap<String, TagValue> = BTreeMap::new();
    let mut pos = 0;

    while pos + 5 <= data.len() {
        if data[pos] != TAG_MARKER {
            pos += 1;
            continue;
        }
        let record = data[pos + 1];
        let dataset = data[pos + 2];
        let raw_len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as usize;
        pos += 5;

        // Extended dataset: the low 15 bits count the length bytes that follow
        let length = if raw_len & 0x8000 != 0 {
            let count = raw_len & 0x7FFF;
            if count > 4 || pos + count > data.len() {
                break;
            }
            let len = data[pos..pos + count]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | *b as usize);
            pos += count;
            len
        } else {
            raw_len
        };

        if pos + length > data.len() {
            break;
        }
        let bytes = &data[pos..pos + length];
        pos += length;

        if record != APPLICATION_RECORD || dataset == 0 {
            continue;
        }
        let value = String::from_utf8_lossy(bytes).trim().to_string();
        if value.is_empty() {
            continue;
        }

        let (key, repeatable) = match dataset_by_number(dataset) {
            Some((name, repeatable)) => (format!("{KEY_PREFIX}{name}"), repeatable),
            None => (format!("{KEY_PREFIX}0x{dataset:04x}"), false),
        };
        if repeatable {
            match tags.entry(key).or_insert_with(|| TagValue::List(Vec::new())) {
                TagValue::List(items) => items.push(value),
                TagValue::Text(_) => {}
            }
        } else {
            tags.insert(key, TagValue::Text(value));
        }
    }

    tags
}

fn push_dataset(
    out: &mut Vec<u8>,
    key: &str,
    record: u8,
    dataset: u8,
    value: &[u8],
) -> Result<(), MetadataError> {
    if value.len() > MAX_DATASET_LEN {
        return Err(MetadataError::ValueTooLong(key.to_string()));
    }
    out.extend_from_slice(&[TAG_MARKER, record, dataset]);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value);
    Ok(())
}

fn write_iim(tags: &BTreeMap<String, TagValue>) -> Result<Vec<u8>, MetadataError> {
    let mut out = Vec::new();
    // 1:90 coded character set = UTF-8, then 2:00 record version 4
    push_dataset(&mut out, "Iptc.Envelope.CharacterSet", 1, 90, b"\x1B%G")?;
    push_dataset(&mut out, "Iptc.Application2.RecordVersion", 2, 0, &[0, 4])?;

    let mut ordered: Vec<(u8, bool, &String, &TagValue)> = tags
        .iter()
        .filter_map(|(key, value)| {
            dataset_by_key(key).map(|(number, repeatable)| (number, repeatable, key, value))
        })
        .collect();
    ordered.sort_by_key(|(number, ..)| *number);

    for (number, repeatable, key, value) in ordered {
        match value {
            TagValue::List(items) if repeatable => {
                for item in items {
                    push_dataset(&mut out, key, APPLICATION_RECORD, number, item.as_bytes())?;
                }
            }
            _ => push_dataset(
                &mut out,
                key,
                APPLICATION_RECORD,
                number,
                value.as_text().as_bytes(),
            )?,
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// APP13 payload
// ---------------------------------------------------------------------------

/// Read the IPTC application record from an APP13 payload.
pub(crate) fn read_block(payload: &[u8]) -> BTreeMap<String, TagValue> {
    parse_resources(payload)
        .iter()
        .find(|r| r.id == IPTC_RESOURCE_ID)
        .map(|r| parse_iim(&r.data))
        .unwrap_or_default()
}

/// Build a new APP13 payload holding `tags`.
///
/// Non-IPTC resources from `existing` are kept. Returns `None` when nothing
/// would be left in the block.
pub(crate) fn write_block(
    existing: Option<&[u8]>,
    tags: &BTreeMap<String, TagValue>,
) -> Result<Option<Vec<u8>>, MetadataError> {
    let mut resources: Vec<Resource> = existing
        .map(parse_resources)
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.id != IPTC_RESOURCE_ID)
        .collect();

    if tags.keys().any(|k| is_known_key(k)) {
        resources.push(Resource {
            id: IPTC_RESOURCE_ID,
            name: Vec::new(),
            data: write_iim(tags)?,
        });
    }

    if resources.is_empty() {
        Ok(None)
    } else {
        Ok(Some(write_resources(&resources)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app13(iim: &[u8]) -> Vec<u8> {
        write_resources(&[Resource {
            id: IPTC_RESOURCE_ID,
            name: Vec::new(),
            data: iim.to_vec(),
        }])
    }

    #[test]
    fn read_caption_and_object_name() {
        let mut iim = Vec::new();
        iim.extend_from_slice(&[0x1C, 0x02, 0x05, 0x00, 0x05]);
        iim.extend_from_slice(b"Title");
        iim.extend_from_slice(&[0x1C, 0x02, 0x78, 0x00, 0x09]);
        iim.extend_from_slice(b"A caption");

        let tags = read_block(&app13(&iim));
        assert_eq!(
            tags.get("Iptc.Application2.ObjectName"),
            Some(&TagValue::text("Title"))
        );
        assert_eq!(
            tags.get("Iptc.Application2.Caption"),
            Some(&TagValue::text("A caption"))
        );
    }

    #[test]
    fn repeatable_keywords_collect_into_list() {
        let mut iim = Vec::new();
        iim.extend_from_slice(&[0x1C, 0x02, 0x19, 0x00, 0x04]);
        iim.extend_from_slice(b"snow");
        iim.extend_from_slice(&[0x1C, 0x02, 0x19, 0x00, 0x06]);
        iim.extend_from_slice(b"winter");

        let tags = read_block(&app13(&iim));
        assert_eq!(
            tags.get("Iptc.Application2.Keywords"),
            Some(&TagValue::List(vec!["snow".into(), "winter".into()]))
        );
    }

    #[test]
    fn envelope_record_and_version_are_skipped() {
        let iim = [
            0x1C, 0x01, 0x5A, 0x00, 0x03, 0x1B, 0x25, 0x47, // 1:90
            0x1C, 0x02, 0x00, 0x00, 0x02, 0x00, 0x04, // 2:00
        ];
        assert!(read_block(&app13(&iim)).is_empty());
    }

    #[test]
    fn extended_length_dataset_is_read() {
        let mut iim = vec![0x1C, 0x02, 0x78, 0x80, 0x02, 0x00, 0x03];
        iim.extend_from_slice(b"abc");
        let tags = read_block(&app13(&iim));
        assert_eq!(
            tags.get("Iptc.Application2.Caption"),
            Some(&TagValue::text("abc"))
        );
    }

    #[test]
    fn write_then_read_preserves_values() {
        let mut tags = BTreeMap::new();
        tags.insert("Iptc.Application2.Caption".to_string(), TagValue::text("Dusk"));
        tags.insert(
            "Iptc.Application2.Keywords".to_string(),
            TagValue::List(vec!["a".into(), "b".into()]),
        );

        let payload = write_block(None, &tags).unwrap().unwrap();
        assert!(payload.starts_with(PHOTOSHOP_HEADER));
        assert_eq!(read_block(&payload), tags);
    }

    #[test]
    fn write_keeps_other_resources() {
        let existing = write_resources(&[Resource {
            id: 0x03ED,
            name: Vec::new(),
            data: vec![1, 2, 3],
        }]);
        let mut tags = BTreeMap::new();
        tags.insert("Iptc.Application2.City".to_string(), TagValue::text("Lisbon"));

        let payload = write_block(Some(&existing), &tags).unwrap().unwrap();
        let resources = parse_resources(&payload);
        let ids: Vec<u16> = resources.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0x03ED, IPTC_RESOURCE_ID]);
        assert_eq!(resources[0].data, vec![1, 2, 3]);
    }

    #[test]
    fn write_with_no_tags_and_no_resources_drops_block() {
        assert_eq!(write_block(None, &BTreeMap::new()).unwrap(), None);
    }

    #[test]
    fn write_rejects_oversized_value() {
        let mut tags = BTreeMap::new();
        tags.insert(
            "Iptc.Application2.Caption".to_string(),
            TagValue::text("x".repeat(40_000)),
        );
        assert!(matches!(
            write_block(None, &tags),
            Err(MetadataError::ValueTooLong(_))
        ));
    }

    #[test]
    fn known_keys() {
        assert!(is_known_key("Iptc.Application2.Keywords"));
        assert!(!is_known_key("Iptc.Application2.Nope"));
        assert!(!is_known_key("Xmp.dc.subject"));
    }
}
