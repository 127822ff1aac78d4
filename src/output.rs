//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entity (folder, photo) leads with its identity: album name or
//! positional index plus file name. Paths and per-derivative status follow
//! as indented context lines, so the output reads as an inventory of what was
//! built.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! 2021__summer (3 photos) [reusing album]
//!     Source: 2021/summer
//!     001 IMG_0001.jpg
//!         album: encoded
//!         thumbnail: 40x32
//!     002 IMG_0002.jpg (rating set to 1)
//!         album: linked
//!         thumbnail: 32x32
//!     003 IMG_0003.jpg
//!         not selected
//! 2021__summer: 2 of 3 photos selected, 0 folders
//! ```
//!
//! ## Import
//!
//! ```text
//! 2021 (2 photos) [family, public]
//!     Source: /photos/2021
//!     001 IMG_0001.jpg 2133x1600 ★2 favorite
//!     002 IMG_0002.jpg 1600x1600 ★1
//!     2021__summer (1 photos)
//!         Source: /photos/2021/summer
//!         001 IMG_0100.jpg 1200x1600 ★3
//! ```
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::album::{BuildEvent, FolderState};
use crate::photo::{AlbumImage, PhotoReport};
use crate::types::{AlbumNode, PhotoRecord};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn folder_header(name: &str, photo_count: usize) -> String {
    format!("{} ({} photos)", name, photo_count)
}

fn state_label(state: FolderState) -> &'static str {
    match state {
        FolderState::Unmanaged { has_album: false } => "new album",
        FolderState::Unmanaged { has_album: true } => "unmanaged album",
        FolderState::ManagedEmpty => "rebuilding album",
        FolderState::ManagedPopulated => "reusing album",
    }
}

fn album_image_label(album: AlbumImage) -> &'static str {
    match album {
        AlbumImage::Existing => "existing",
        AlbumImage::Encoded => "encoded",
        AlbumImage::Linked => "linked",
        AlbumImage::Skipped => "skipped",
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::FolderStarted {
            name,
            path,
            photo_count,
            state,
        } => vec![
            format!(
                "{} [{}]",
                folder_header(name, *photo_count),
                state_label(*state)
            ),
            format!("    Source: {}", path),
        ],
        BuildEvent::PhotoProcessed { index, report, .. } => format_photo_report(*index, report),
        BuildEvent::FolderFinished {
            name,
            photos,
            selected,
            folders,
        } => vec![format!(
            "{}: {} of {} photos selected, {} folders",
            name, selected, photos, folders
        )],
    }
}

fn format_photo_report(index: usize, report: &PhotoReport) -> Vec<String> {
    let healed = if report.rating_healed {
        " (rating set to 1)"
    } else {
        ""
    };
    let mut lines = vec![format!(
        "    {} {}{}",
        format_index(index),
        report.file,
        healed
    )];
    if !report.selected {
        lines.push("        not selected".to_string());
        return lines;
    }
    lines.push(format!(
        "        album: {}",
        album_image_label(report.album)
    ));
    if let Some(thumb) = report.thumbnail {
        lines.push(format!(
            "        thumbnail: {}x{}",
            thumb.width, thumb.height
        ));
    }
    lines
}

// ============================================================================
// Album tree output
// ============================================================================

/// Format an album tree, one folder per header with its photos indented.
pub fn format_album_tree(node: &AlbumNode) -> Vec<String> {
    let mut lines = Vec::new();
    format_node(node, 0, &mut lines);
    lines
}

fn format_node(node: &AlbumNode, depth: usize, lines: &mut Vec<String>) {
    let pad = indent(depth);
    let mut header = folder_header(&node.name, node.photos.len());
    if !node.tags.is_empty() {
        let tags: Vec<&str> = node.tags.iter().map(String::as_str).collect();
        header.push_str(&format!(" [{}]", tags.join(", ")));
    }
    lines.push(format!("{}{}", pad, header));
    lines.push(format!(
        "{}    Source: {}",
        pad,
        Path::new(&node.base_path).join(&node.path).display()
    ));
    for (i, photo) in node.photos.iter().enumerate() {
        lines.push(format!("{}    {}", pad, photo_line(i + 1, photo)));
    }
    for folder in &node.folders {
        format_node(folder, depth + 1, lines);
    }
}

fn photo_line(index: usize, photo: &PhotoRecord) -> String {
    let mut line = format!(
        "{} {} {}x{} \u{2605}{}",
        format_index(index),
        photo.file,
        photo.width,
        photo.height,
        photo.rating
    );
    if photo.favorite {
        line.push_str(" favorite");
    }
    line
}

/// Print an album tree to stdout.
pub fn print_album_tree(node: &AlbumNode) {
    for line in format_album_tree(node) {
        println!("{}", line);
    }
}

/// Format the closing line of a command.
pub fn format_summary(node: &AlbumNode, stored: Option<&Path>) -> String {
    let mut albums = 0;
    node.walk(&mut |_| albums += 1);
    let base = format!("{}: {} albums, {} photos", node.name, albums, node.photo_count());
    match stored {
        Some(db) => format!("{}, stored in {}", base, db.display()),
        None => base,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Dimensions;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;

    fn report(file: &str, selected: bool, album: AlbumImage) -> PhotoReport {
        PhotoReport {
            file: file.to_string(),
            selected,
            album,
            thumbnail: selected.then_some(Dimensions {
                width: 40,
                height: 32,
            }),
            rating_healed: false,
        }
    }

    fn record(file: &str, rating: u32, favorite: bool) -> PhotoRecord {
        PhotoRecord {
            date_time: NaiveDate::from_ymd_opt(2021, 7, 14)
                .unwrap()
                .and_hms_opt(18, 30, 5)
                .unwrap(),
            file: file.into(),
            caption: String::new(),
            width: 2133,
            height: 1600,
            thumb_width: 267,
            thumb_height: 200,
            thumb_dir: "thumbs".into(),
            tags: vec![],
            rating,
            favorite,
        }
    }

    fn tree() -> AlbumNode {
        AlbumNode {
            name: "2021".into(),
            base_path: "/photos".into(),
            path: "2021".into(),
            photos: vec![record("a.jpg", 2, true), record("b.jpg", 0, false)],
            folders: vec![AlbumNode {
                name: "2021__summer".into(),
                base_path: "/photos".into(),
                path: "2021/summer".into(),
                photos: vec![record("c.jpg", 3, false)],
                folders: vec![],
                tags: BTreeSet::new(),
            }],
            tags: ["family", "public"].iter().map(|s| s.to_string()).collect(),
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(1000), "1000");
    }

    #[test]
    fn indent_is_four_spaces_per_level() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }

    // =========================================================================
    // Build event tests
    // =========================================================================

    #[test]
    fn folder_started_shows_state_and_source() {
        let event = BuildEvent::FolderStarted {
            name: "2021__summer".into(),
            path: "2021/summer".into(),
            photo_count: 3,
            state: FolderState::ManagedPopulated,
        };
        assert_eq!(
            format_build_event(&event),
            vec![
                "2021__summer (3 photos) [reusing album]",
                "    Source: 2021/summer"
            ]
        );
    }

    #[test]
    fn unmanaged_folder_with_album_dir_is_labelled() {
        let event = BuildEvent::FolderStarted {
            name: "x".into(),
            path: "x".into(),
            photo_count: 0,
            state: FolderState::Unmanaged { has_album: true },
        };
        assert!(format_build_event(&event)[0].ends_with("[unmanaged album]"));
    }

    #[test]
    fn selected_photo_shows_album_and_thumbnail() {
        let event = BuildEvent::PhotoProcessed {
            folder: "2021".into(),
            index: 1,
            report: report("a.jpg", true, AlbumImage::Encoded),
        };
        assert_eq!(
            format_build_event(&event),
            vec![
                "    001 a.jpg",
                "        album: encoded",
                "        thumbnail: 40x32"
            ]
        );
    }

    #[test]
    fn unselected_photo_is_one_context_line() {
        let event = BuildEvent::PhotoProcessed {
            folder: "2021".into(),
            index: 12,
            report: report("b.jpg", false, AlbumImage::Skipped),
        };
        assert_eq!(
            format_build_event(&event),
            vec!["    012 b.jpg", "        not selected"]
        );
    }

    #[test]
    fn healed_rating_is_flagged() {
        let mut healed = report("a.jpg", true, AlbumImage::Existing);
        healed.rating_healed = true;
        let event = BuildEvent::PhotoProcessed {
            folder: "2021".into(),
            index: 2,
            report: healed,
        };
        let lines = format_build_event(&event);
        assert_eq!(lines[0], "    002 a.jpg (rating set to 1)");
        assert_eq!(lines[1], "        album: existing");
    }

    #[test]
    fn folder_finished_summarizes() {
        let event = BuildEvent::FolderFinished {
            name: "2021".into(),
            photos: 3,
            selected: 2,
            folders: 1,
        };
        assert_eq!(
            format_build_event(&event),
            vec!["2021: 2 of 3 photos selected, 1 folders"]
        );
    }

    // =========================================================================
    // Album tree tests
    // =========================================================================

    #[test]
    fn album_tree_nests_folders() {
        let lines = format_album_tree(&tree());
        assert_eq!(
            lines,
            vec![
                "2021 (2 photos) [family, public]",
                "    Source: /photos/2021",
                "    001 a.jpg 2133x1600 \u{2605}2 favorite",
                "    002 b.jpg 2133x1600 \u{2605}0",
                "    2021__summer (1 photos)",
                "        Source: /photos/2021/summer",
                "        001 c.jpg 2133x1600 \u{2605}3",
            ]
        );
    }

    #[test]
    fn summary_counts_whole_tree() {
        assert_eq!(format_summary(&tree(), None), "2021: 2 albums, 3 photos");
        assert_eq!(
            format_summary(&tree(), Some(Path::new("fotos.db"))),
            "2021: 2 albums, 3 photos, stored in fotos.db"
        );
    }
}
