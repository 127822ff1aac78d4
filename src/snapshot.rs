//! Per-folder tree snapshots.
//!
//! Every built folder gets a pretty-printed JSON copy of its [`AlbumNode`]
//! (children included) inside its album directory:
//!
//! ```text
//! 2021/summer/
//! ├── a.jpg
//! └── album/
//!     ├── a.jpg
//!     ├── thumbs/a.jpg
//!     └── album.json      ← snapshot
//! ```
//!
//! The snapshot does two jobs. On the next build its presence marks the
//! album directory as managed (ours to delete on `--force`) and carries the
//! folder's curation tags forward. On import it *is* the album: no scanning,
//! no image work.
//!
//! A snapshot that exists but does not parse is an error, never silently
//! replaced.

use crate::config::LayoutConfig;
use crate::types::AlbumNode;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Corrupt snapshot {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Snapshot location of `folder`: `<folder>/<album_dir>/<snapshot_file>`.
pub fn snapshot_path(folder: &Path, layout: &LayoutConfig) -> PathBuf {
    folder.join(&layout.album_dir).join(&layout.snapshot_file)
}

/// Read and parse a snapshot. A missing file is an `Io` error.
pub fn read(path: &Path) -> Result<AlbumNode, SnapshotError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| SnapshotError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a snapshot if one exists.
pub fn load(path: &Path) -> Result<Option<AlbumNode>, SnapshotError> {
    if !path.is_file() {
        return Ok(None);
    }
    read(path).map(Some)
}

/// Write `node` as pretty JSON, replacing any previous snapshot.
pub fn save(path: &Path, node: &AlbumNode) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(node).map_err(|source| SnapshotError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PhotoRecord;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn sample_node() -> AlbumNode {
        let photo = PhotoRecord {
            date_time: NaiveDate::from_ymd_opt(2021, 7, 14)
                .unwrap()
                .and_hms_opt(18, 30, 5)
                .unwrap(),
            file: "IMG_0001.JPG".into(),
            caption: "Harbour".into(),
            width: 2133,
            height: 1600,
            thumb_width: 267,
            thumb_height: 200,
            thumb_dir: "thumbs".into(),
            tags: vec!["boats".into()],
            rating: 2,
            favorite: false,
        };
        AlbumNode {
            name: "2021".into(),
            base_path: "/photos".into(),
            path: "2021".into(),
            photos: vec![photo],
            folders: vec![AlbumNode {
                name: "2021__summer".into(),
                base_path: "/photos".into(),
                path: "2021/summer".into(),
                photos: vec![],
                folders: vec![],
                tags: BTreeSet::new(),
            }],
            tags: ["family".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn snapshot_path_is_inside_album_dir() {
        let path = snapshot_path(Path::new("/photos/2021"), &LayoutConfig::default());
        assert_eq!(path, Path::new("/photos/2021/album/album.json"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("album.json");
        let node = sample_node();

        save(&path, &node).unwrap();
        assert_eq!(load(&path).unwrap(), Some(node));
    }

    #[test]
    fn saved_snapshot_is_pretty_json_with_expected_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("album.json");
        save(&path, &sample_node()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains('\n'));
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["tags"], serde_json::json!(["family"]));
        assert_eq!(json["photos"][0]["thumbDir"], "thumbs");
        assert_eq!(json["photos"][0]["date_time"], "2021-07-14 18:30:05");
        assert_eq!(json["folders"][0]["name"], "2021__summer");
    }

    #[test]
    fn load_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load(&tmp.path().join("album.json")).unwrap().is_none());
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            read(&tmp.path().join("album.json")),
            Err(SnapshotError::Io(_))
        ));
    }

    #[test]
    fn load_corrupt_json_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("album.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(SnapshotError::Corrupt { .. })));
    }

    #[test]
    fn load_accepts_null_tags() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("album.json");
        let json = r#"{
            "name": "2021", "base_path": "/photos", "path": "2021",
            "photos": [{
                "date_time": "2021-07-14 18:30:05", "file": "a.jpg", "caption": "",
                "width": 80, "height": 64, "thumb_width": 20, "thumb_height": 16,
                "thumbDir": "thumbs", "tags": null, "rating": 1, "favorite": false
            }],
            "folders": [],
            "tags": null
        }"#;
        std::fs::write(&path, json).unwrap();

        let node = load(&path).unwrap().unwrap();
        assert!(node.tags.is_empty());
        assert!(node.photos[0].tags.is_empty());
    }

    #[test]
    fn load_missing_field_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("album.json");
        std::fs::write(&path, r#"{"name":"a","photos":[],"folders":[]}"#).unwrap();
        assert!(matches!(load(&path), Err(SnapshotError::Corrupt { .. })));
    }
}
