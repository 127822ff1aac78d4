//! Relational persistence of finished album trees.
//!
//! A built or imported [`AlbumNode`] tree is handed to an [`AlbumSink`].
//! The SQLite implementation stores it flat: one `album` row per node,
//! linked to its parent by id, and one `photo` row per photo.
//!
//! Storing a tree replaces whatever was stored before for the same
//! `(name, path, base_path)`: old rows, descendants included, are deleted
//! and new ones inserted. The whole tree goes in within one transaction.

use crate::types::{AlbumNode, snapshot_date};
use rusqlite::{Connection, params};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer of finished album trees.
pub trait AlbumSink {
    /// Store `node` and its descendants under `parent_id`. Returns the id of
    /// the stored node.
    fn create_album(&mut self, node: &AlbumNode, parent_id: Option<i64>)
    -> Result<i64, StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS album (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    path        TEXT NOT NULL,
    base_path   TEXT NOT NULL,
    tags        TEXT NOT NULL DEFAULT '',
    parent_id   INTEGER REFERENCES album(id)
);
CREATE INDEX IF NOT EXISTS idx_album_key ON album(name, path, base_path);

CREATE TABLE IF NOT EXISTS photo (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    album_id      INTEGER NOT NULL REFERENCES album(id),
    file          TEXT NOT NULL,
    width         INTEGER NOT NULL,
    height        INTEGER NOT NULL,
    thumb_width   INTEGER NOT NULL,
    thumb_height  INTEGER NOT NULL,
    caption       TEXT NOT NULL DEFAULT '',
    tags          TEXT NOT NULL DEFAULT '',
    rating        INTEGER NOT NULL DEFAULT 0,
    favorite      INTEGER NOT NULL DEFAULT 0,
    date_time     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_photo_album ON photo(album_id);
"#;

/// SQLite-backed [`AlbumSink`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn album_count(&self) -> Result<usize, StoreError> {
        count(&self.conn, "SELECT COUNT(*) FROM album")
    }

    pub fn photo_count(&self) -> Result<usize, StoreError> {
        count(&self.conn, "SELECT COUNT(*) FROM photo")
    }
}

fn count(conn: &Connection, sql: &str) -> Result<usize, StoreError> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n as usize)
}

impl AlbumSink for SqliteStore {
    fn create_album(
        &mut self,
        node: &AlbumNode,
        parent_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let id = insert_node(&tx, node, parent_id)?;
        tx.commit()?;
        tracing::info!(name = %node.name, id, "stored album tree");
        Ok(id)
    }
}

/// Albums stored before under the node's key, with all their descendants,
/// so folders that disappeared from disk do not linger.
const STALE_ALBUMS: &str = "WITH RECURSIVE stale(id) AS ( \
     SELECT id FROM album WHERE name = ?1 AND path = ?2 AND base_path = ?3 \
     UNION ALL \
     SELECT album.id FROM album JOIN stale ON album.parent_id = stale.id)";

fn insert_node(conn: &Connection, node: &AlbumNode, parent_id: Option<i64>) -> Result<i64, StoreError> {
    conn.execute(
        &format!("{STALE_ALBUMS} DELETE FROM photo WHERE album_id IN (SELECT id FROM stale)"),
        params![node.name, node.path, node.base_path],
    )?;
    let replaced = conn.execute(
        &format!("{STALE_ALBUMS} DELETE FROM album WHERE id IN (SELECT id FROM stale)"),
        params![node.name, node.path, node.base_path],
    )?;
    if replaced > 0 {
        tracing::debug!(name = %node.name, replaced, "replaced stored album");
    }

    let tags = node.tags.iter().cloned().collect::<Vec<_>>().join(",");
    conn.execute(
        "INSERT INTO album (name, path, base_path, tags, parent_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![node.name, node.path, node.base_path, tags, parent_id],
    )?;
    let album_id = conn.last_insert_rowid();

    let mut insert_photo = conn.prepare(
        "INSERT INTO photo (album_id, file, width, height, thumb_width, thumb_height, \
         caption, tags, rating, favorite, date_time) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for photo in &node.photos {
        insert_photo.execute(params![
            album_id,
            photo.file,
            photo.width,
            photo.height,
            photo.thumb_width,
            photo.thumb_height,
            photo.caption,
            photo.tags.join(","),
            photo.rating,
            photo.favorite,
            photo.date_time.format(snapshot_date::FORMAT).to_string(),
        ])?;
    }

    for folder in &node.folders {
        insert_node(conn, folder, Some(album_id))?;
    }
    Ok(album_id)
}
