//! Recursive album tree builder.
//!
//! [`build`] turns a photo folder and all its subfolders into an
//! [`AlbumNode`] tree, producing derivatives on the way and leaving a
//! snapshot in every folder's album directory.
//!
//! ## Folder states
//!
//! Whether a folder's album directory may be reused or deleted depends on
//! whether this pipeline made it, which is known from the snapshot inside:
//!
//! | Snapshot | Album dir | `--force` | State | Album dir afterwards |
//! |---|---|---|---|---|
//! | no | any | any | `Unmanaged` | never deleted |
//! | yes | yes | no | `ManagedPopulated` | reused |
//! | yes | yes | yes | `ManagedEmpty` | deleted and recreated |
//!
//! An album directory that carries no snapshot may belong to something else
//! and is never deleted, even with `--force`.
//!
//! ## Order and parallelism
//!
//! Entries are taken in directory listing order. Subfolders are built one
//! after another; the photos of one folder run on the rayon pool. Results
//! keep listing order and the first failing photo fails the folder.
//!
//! Two photos whose derivatives would share a file name (`a.JPG` and
//! `a.jpeg` both become `a.jpg`) fail the folder before any image work.

use crate::naming;
use crate::photo::{PhotoContext, PhotoError, PhotoReport, process_photo};
use crate::snapshot::{self, SnapshotError};
use crate::types::AlbumNode;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlbumError {
    #[error("Folder not found in any configured path: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error(
        "{first} and {second} in {} both produce album image {derivative}",
        folder.display()
    )]
    DerivativeCollision {
        folder: PathBuf,
        first: String,
        second: String,
        derivative: String,
    },
    #[error("Failed to process {}: {source}", path.display())]
    Photo {
        path: PathBuf,
        #[source]
        source: PhotoError,
    },
}

/// State of a folder's album directory at the start of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderState {
    /// No snapshot. `has_album` tells whether a same-named directory exists.
    Unmanaged { has_album: bool },
    /// Managed, starting from an empty album directory.
    ManagedEmpty,
    /// Managed, existing derivatives are reused.
    ManagedPopulated,
}

impl FolderState {
    pub fn resolve(album_dir_exists: bool, managed: bool, delete_existing: bool) -> Self {
        match (managed, album_dir_exists, delete_existing) {
            (false, has_album, _) => FolderState::Unmanaged { has_album },
            (true, true, false) => FolderState::ManagedPopulated,
            (true, true, true) | (true, false, _) => FolderState::ManagedEmpty,
        }
    }

    /// Whether derivatives from an earlier run may count as existing.
    pub fn has_album(self) -> bool {
        match self {
            FolderState::Unmanaged { has_album } => has_album,
            FolderState::ManagedPopulated => true,
            FolderState::ManagedEmpty => false,
        }
    }
}

/// Progress events emitted while building.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    FolderStarted {
        name: String,
        path: String,
        photo_count: usize,
        state: FolderState,
    },
    PhotoProcessed {
        folder: String,
        /// 1-based position in listing order.
        index: usize,
        report: PhotoReport,
    },
    FolderFinished {
        name: String,
        photos: usize,
        selected: usize,
        folders: usize,
    },
}

/// Build the tree for `relative`, found under the first configured base
/// path that contains it.
///
/// With `delete_existing`, managed album directories are wiped first so
/// every derivative is regenerated.
pub fn build(
    ctx: &PhotoContext<'_>,
    relative: &Path,
    delete_existing: bool,
    progress: Option<Sender<BuildEvent>>,
) -> Result<AlbumNode, AlbumError> {
    let base = ctx
        .config
        .find_base(relative)
        .ok_or_else(|| AlbumError::NotFound(relative.to_path_buf()))?;
    tracing::info!(base = %base.display(), path = %relative.display(), "building album tree");
    build_folder(ctx, base, relative, delete_existing, None, progress.as_ref())
}

/// Build one folder and, recursively, its subfolders.
pub fn build_folder(
    ctx: &PhotoContext<'_>,
    base: &Path,
    relative: &Path,
    delete_existing: bool,
    parent_name: Option<&str>,
    progress: Option<&Sender<BuildEvent>>,
) -> Result<AlbumNode, AlbumError> {
    let layout = &ctx.config.layout;
    let folder = base.join(relative);
    let album_dir = folder.join(&layout.album_dir);
    let snapshot_path = snapshot::snapshot_path(&folder, layout);

    let previous = snapshot::load(&snapshot_path)?;
    let managed = previous.is_some();
    let tags = previous.map(|node| node.tags).unwrap_or_default();

    let name = naming::album_name(&folder_name(&folder), parent_name);

    let state = FolderState::resolve(album_dir.is_dir(), managed, delete_existing);
    if state == FolderState::ManagedEmpty && album_dir.exists() {
        tracing::info!(dir = %album_dir.display(), "removing managed album directory");
        fs::remove_dir_all(&album_dir)?;
    }
    fs::create_dir_all(&album_dir)?;

    let (subfolders, files) = list_entries(&folder, ctx)?;

    if let Some(tx) = progress {
        tx.send(BuildEvent::FolderStarted {
            name: name.clone(),
            path: relative.to_string_lossy().into_owned(),
            photo_count: files.len(),
            state,
        })
        .ok();
    }

    let has_album = state.has_album();
    let processed = files
        .par_iter()
        .enumerate()
        .map(|(i, file)| {
            let photo = process_photo(ctx, &folder, file, has_album).map_err(|source| {
                AlbumError::Photo {
                    path: folder.join(file),
                    source,
                }
            })?;
            if let Some(tx) = progress {
                tx.send(BuildEvent::PhotoProcessed {
                    folder: name.clone(),
                    index: i + 1,
                    report: photo.report.clone(),
                })
                .ok();
            }
            Ok(photo)
        })
        .collect::<Result<Vec<_>, AlbumError>>()?;

    let selected = processed.iter().filter(|p| p.report.selected).count();
    let photos: Vec<_> = processed.into_iter().map(|p| p.record).collect();

    let mut folders = Vec::with_capacity(subfolders.len());
    for child in &subfolders {
        folders.push(build_folder(
            ctx,
            base,
            &relative.join(child),
            delete_existing,
            Some(&name),
            progress,
        )?);
    }

    let node = AlbumNode {
        name,
        base_path: base.to_string_lossy().into_owned(),
        path: relative.to_string_lossy().into_owned(),
        photos,
        folders,
        tags,
    };
    snapshot::save(&snapshot_path, &node)?;

    if let Some(tx) = progress {
        tx.send(BuildEvent::FolderFinished {
            name: node.name.clone(),
            photos: node.photos.len(),
            selected,
            folders: node.folders.len(),
        })
        .ok();
    }
    Ok(node)
}

fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.to_string_lossy().into_owned())
}

/// Subfolders to recurse into and photo files, both in listing order.
fn list_entries(
    folder: &Path,
    ctx: &PhotoContext<'_>,
) -> Result<(Vec<String>, Vec<String>), AlbumError> {
    let skip: HashSet<String> = ctx.config.skip_set();
    let mut subfolders = Vec::new();
    let mut files = Vec::new();

    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 name");
            continue;
        };
        if entry.path().is_dir() {
            if !skip.contains(&name) {
                subfolders.push(name);
            }
        } else if naming::has_extension(&name, &ctx.config.extensions) {
            files.push(name);
        }
    }
    check_derivative_names(folder, &files)?;
    Ok((subfolders, files))
}

/// Fail when two photos map onto the same derivative file.
fn check_derivative_names(folder: &Path, files: &[String]) -> Result<(), AlbumError> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(files.len());
    for file in files {
        let derivative = naming::derivative_file_name(file);
        if let Some(other) = seen.insert(derivative.clone(), file) {
            let (first, second) = if other < file.as_str() {
                (other, file.as_str())
            } else {
                (file.as_str(), other)
            };
            return Err(AlbumError::DerivativeCollision {
                folder: folder.to_path_buf(),
                first: first.to_string(),
                second: second.to_string(),
                derivative,
            });
        }
    }
    Ok(())
}
