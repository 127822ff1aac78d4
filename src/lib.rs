//! # fotos
//!
//! Turns a tree of photo folders into web albums. Each folder gets an album
//! directory next to its photos holding scaled copies, thumbnails and a JSON
//! snapshot of the folder's subtree. Which photos make it in is decided by
//! the photos' own metadata: a rating of at least 1, or a favorite flag.
//!
//! # Pipeline
//!
//! ```text
//! folder/                    album/ (per folder)           sink
//!   *.jpg  ── metadata ──►   IMG.jpg  (scaled or symlink)
//!             selection      thumbs/IMG.jpg
//!             scaling        album.json ──── import ────►  SQLite
//! ```
//!
//! A build walks the tree depth first. Photos in one folder are processed in
//! parallel, subfolders sequentially. Every folder's snapshot is written once
//! its subtree is done, so an import can later reproduce the whole tree
//! without touching an image.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`album`] | Recursive tree builder: folder states, listing, snapshots, progress events |
//! | [`photo`] | Per-photo pipeline: metadata resolution, rating healing, derivatives |
//! | [`import`] | Snapshot-only import of an already built tree |
//! | [`metadata`] | Namespaced tag access (Exif, IPTC, XMP), key resolution, value interpretation |
//! | [`imaging`] | Pure-Rust image operations and the JPEG metadata container |
//! | [`snapshot`] | Reading and writing `album.json` |
//! | [`store`] | Relational persistence of finished trees |
//! | [`config`] | `fotos.toml` loading, merging over stock defaults, validation |
//! | [`types`] | `AlbumNode` and `PhotoRecord`, the serialized tree |
//! | [`naming`] | Album names and derivative file names |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Metadata Lives in the Photos
//!
//! Captions, dates, tags, ratings and favorites are read from the photo's
//! Exif, IPTC and XMP. Each field is configured as an ordered list of keys
//! and the first key present wins, so files tagged by different tools
//! resolve the same way. Derivatives carry a cleaned copy of the tags: only
//! keys the albums actually use survive.
//!
//! ## Sources Are Read-Only, Almost
//!
//! The one write back to a source file is the rating floor. A photo that has
//! an album image but a rating of 0 was selected as a favorite at some
//! point, so its rating is lifted to 1 to keep it selected. The lift goes to
//! XMP or IPTC, never into the Exif block. Rejected photos (`-1`) stay
//! rejected.
//!
//! ## Managed Album Directories
//!
//! An album directory containing a snapshot was written by fotos and may be
//! wiped on `--force`. One without a snapshot is left alone: existing images
//! in it are reused, nothing is deleted.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resizing and JPEG encoding use the `image` crate; Exif is read
//! with `kamadak-exif`; IPTC and XMP segments are parsed and written in
//! [`imaging`]. No system libraries are required.

pub mod album;
pub mod config;
pub mod imaging;
pub mod import;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod photo;
pub mod snapshot;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
