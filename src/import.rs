//! Snapshot-only import of an already built album tree.
//!
//! Importing reads the snapshot a previous build left in the folder's album
//! directory. Nothing is scanned and no image is touched, so importing a
//! large library built elsewhere is cheap.

use crate::config::FotosConfig;
use crate::snapshot::{self, SnapshotError};
use crate::types::AlbumNode;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Folder not found in any configured path: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Missing {}", .0.display())]
    MissingSnapshot(PathBuf),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Load the album tree of `relative` from its snapshot.
///
/// The base path the folder was found under is stamped into every node, so
/// a tree built under one mount point imports cleanly from another.
pub fn import_album(config: &FotosConfig, relative: &Path) -> Result<AlbumNode, ImportError> {
    let base = config
        .find_base(relative)
        .ok_or_else(|| ImportError::NotFound(relative.to_path_buf()))?;
    let path = snapshot::snapshot_path(&base.join(relative), &config.layout);
    if !path.is_file() {
        return Err(ImportError::MissingSnapshot(path));
    }

    let mut node = snapshot::read(&path)?;
    stamp_base_path(&mut node, &base.to_string_lossy());
    tracing::info!(
        name = %node.name,
        photos = node.photo_count(),
        "imported album snapshot"
    );
    Ok(node)
}

fn stamp_base_path(node: &mut AlbumNode, base: &str) {
    node.base_path = base.to_string();
    for child in &mut node.folders {
        stamp_base_path(child, base);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::album;
    use crate::imaging::backend::tests::MockBackend;
    use crate::photo::PhotoContext;
    use crate::test_helpers::{create_test_jpeg, tag_photo, test_config};
    use tempfile::TempDir;

    #[test]
    fn import_unknown_folder_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let result = import_album(&test_config(tmp.path()), Path::new("nope"));
        assert!(matches!(result, Err(ImportError::NotFound(_))));
    }

    #[test]
    fn import_folder_without_snapshot_is_missing() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("trip/album")).unwrap();
        let result = import_album(&test_config(tmp.path()), Path::new("trip"));
        match result {
            Err(ImportError::MissingSnapshot(path)) => assert!(path.ends_with("album/album.json")),
            other => panic!("expected missing snapshot, got {other:?}"),
        }
    }

    #[test]
    fn import_corrupt_snapshot_is_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("trip/album")).unwrap();
        std::fs::write(tmp.path().join("trip/album/album.json"), "[]").unwrap();
        let result = import_album(&test_config(tmp.path()), Path::new("trip"));
        assert!(matches!(
            result,
            Err(ImportError::Snapshot(SnapshotError::Corrupt { .. }))
        ));
    }

    #[test]
    fn import_reproduces_built_tree() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let source = tmp.path().join("trip/a.jpg");
        create_test_jpeg(&source, 100, 80);
        tag_photo(&source, &[("Xmp.xmp.Rating", "2")]);
        create_test_jpeg(&tmp.path().join("trip/day1/b.jpg"), 100, 80);

        let backend = MockBackend::new();
        let built = album::build(
            &PhotoContext::new(&config, &backend),
            Path::new("trip"),
            false,
            None,
        )
        .unwrap();
        let operations = backend.get_operations().len();

        let imported = import_album(&config, Path::new("trip")).unwrap();
        assert_eq!(imported, built);
        // No image work on import
        assert_eq!(backend.get_operations().len(), operations);
    }

    #[test]
    fn import_stamps_resolved_base_path() {
        let old_root = TempDir::new().unwrap();
        let new_root = TempDir::new().unwrap();
        let config = test_config(old_root.path());
        create_test_jpeg(&old_root.path().join("trip/day1/b.jpg"), 20, 20);

        let backend = MockBackend::new();
        let built = album::build(
            &PhotoContext::new(&config, &backend),
            Path::new("trip"),
            false,
            None,
        )
        .unwrap();

        // Same tree mounted somewhere else
        let moved = new_root.path().join("trip");
        std::fs::rename(old_root.path().join("trip"), &moved).unwrap();
        let imported = import_album(&test_config(new_root.path()), Path::new("trip")).unwrap();

        let new_base = new_root.path().to_string_lossy().into_owned();
        assert_eq!(imported.base_path, new_base);
        assert_eq!(imported.folders[0].base_path, new_base);
        assert_eq!(imported.name, built.name);
        assert_eq!(imported.photos, built.photos);
        assert_eq!(imported.folders[0].photos, built.folders[0].photos);
        assert_eq!(imported.tags, built.tags);
    }
}
