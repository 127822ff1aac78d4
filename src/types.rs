//! Album tree types.
//!
//! These types are both the in-memory result of a build and the on-disk
//! snapshot format. A snapshot written by one run must import unchanged in a
//! later one, so field names are part of the format.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// One folder of the album tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumNode {
    /// Folder name, prefixed with `<parent>__` when nested.
    pub name: String,
    /// Configured base path the folder was found under.
    pub base_path: String,
    /// Folder path relative to `base_path`.
    pub path: String,
    pub photos: Vec<PhotoRecord>,
    pub folders: Vec<AlbumNode>,
    /// Curation tags carried over from the previous snapshot.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: BTreeSet<String>,
}

impl AlbumNode {
    /// Number of photos in this node and all descendants.
    pub fn photo_count(&self) -> usize {
        self.photos.len() + self.folders.iter().map(AlbumNode::photo_count).sum::<usize>()
    }

    /// Visit this node and all descendants, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a AlbumNode)) {
        visit(self);
        for folder in &self.folders {
            folder.walk(visit);
        }
    }
}

/// Tag collections written as `null` read back empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One photo of a folder, as seen after processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    #[serde(with = "snapshot_date")]
    pub date_time: NaiveDateTime,
    /// File name as on disk.
    pub file: String,
    pub caption: String,
    pub width: u32,
    pub height: u32,
    pub thumb_width: u32,
    pub thumb_height: u32,
    #[serde(rename = "thumbDir")]
    pub thumb_dir: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    pub rating: u32,
    pub favorite: bool,
}

impl PhotoRecord {
    /// Selected photos get derivatives and are shown in the gallery.
    pub fn is_selected(&self) -> bool {
        self.rating >= 1 || self.favorite
    }
}

/// Timestamps as `YYYY-MM-DD HH:MM:SS[.fff]`, the format snapshots have
/// always used. Reading also accepts ISO `T`-separated values.
pub(crate) mod snapshot_date {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::metadata::parse_date(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date_time: {text}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file: &str) -> PhotoRecord {
        PhotoRecord {
            date_time: NaiveDateTime::parse_from_str("2021-07-14 18:30:05", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
            file: file.to_string(),
            caption: String::new(),
            width: 10,
            height: 10,
            thumb_width: 0,
            thumb_height: 0,
            thumb_dir: "thumbs".to_string(),
            tags: Vec::new(),
            rating: 0,
            favorite: false,
        }
    }

    #[test]
    fn photo_record_field_names() {
        let json = serde_json::to_value(record("a.jpg")).unwrap();
        assert_eq!(json["date_time"], "2021-07-14 18:30:05");
        assert_eq!(json["thumbDir"], "thumbs");
        assert!(json.get("thumb_dir").is_none());
    }

    #[test]
    fn date_time_reads_iso_form() {
        let mut json = serde_json::to_value(record("a.jpg")).unwrap();
        json["date_time"] = "2021-07-14T18:30:05.250".into();
        let parsed: PhotoRecord = serde_json::from_value(json).unwrap();
        assert_eq!(
            parsed.date_time.format(snapshot_date::FORMAT).to_string(),
            "2021-07-14 18:30:05.250"
        );
    }

    #[test]
    fn selection_rule() {
        let mut r = record("a.jpg");
        assert!(!r.is_selected());
        r.favorite = true;
        assert!(r.is_selected());
        r.favorite = false;
        r.rating = 1;
        assert!(r.is_selected());
    }

    #[test]
    fn missing_tags_default_to_empty() {
        let json = serde_json::json!({
            "name": "root", "base_path": "/b", "path": "root",
            "photos": [], "folders": []
        });
        let node: AlbumNode = serde_json::from_value(json).unwrap();
        assert!(node.tags.is_empty());
    }

    #[test]
    fn null_tags_read_as_empty() {
        let json = serde_json::json!({
            "name": "root", "base_path": "/b", "path": "root",
            "photos": [], "folders": [], "tags": null
        });
        let node: AlbumNode = serde_json::from_value(json).unwrap();
        assert!(node.tags.is_empty());
    }

    #[test]
    fn photo_count_and_walk_cover_descendants() {
        let child = AlbumNode {
            name: "root__child".into(),
            base_path: "/b".into(),
            path: "root/child".into(),
            photos: vec![record("b.jpg"), record("c.jpg")],
            folders: vec![],
            tags: BTreeSet::new(),
        };
        let root = AlbumNode {
            name: "root".into(),
            base_path: "/b".into(),
            path: "root".into(),
            photos: vec![record("a.jpg")],
            folders: vec![child],
            tags: BTreeSet::new(),
        };
        assert_eq!(root.photo_count(), 3);

        let mut names = Vec::new();
        root.walk(&mut |node| names.push(node.name.as_str()));
        assert_eq!(names, vec!["root", "root__child"]);
    }
}
