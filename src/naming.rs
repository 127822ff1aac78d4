//! Naming rules shared by the folder walk and the photo processor.
//!
//! ## Album names
//!
//! Nested folders are stored flat by the persistence layer, so a child's name
//! carries its parent's name as a prefix:
//! - `2021/` → "2021"
//! - `2021/summer/` → "2021__summer"
//! - `2021/summer/beach/` → "2021__summer__beach"
//!
//! ## Derivative file names
//!
//! Album images and thumbnails are always JPEG. The stem of the source is
//! kept and the extension normalized: `IMG_0001.JPG` → `IMG_0001.jpg`,
//! `dusk.jpeg` → `dusk.jpg`.

/// Separator between a parent's name and a child folder name.
pub const NAME_SEPARATOR: &str = "__";

/// Name of an album node, prefixed with its parent's name when nested.
pub fn album_name(folder: &str, parent: Option<&str>) -> String {
    match parent {
        Some(parent) => format!("{parent}{NAME_SEPARATOR}{folder}"),
        None => folder.to_string(),
    }
}

/// File name of the album image and thumbnail derived from `file`.
pub fn derivative_file_name(file: &str) -> String {
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    format!("{stem}.jpg")
}

/// Whether `name` ends with one of `extensions`, ignoring case.
///
/// Extensions may be given with or without the leading dot.
pub fn has_extension(name: &str, extensions: &[String]) -> bool {
    let name = name.to_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.').to_lowercase();
        !ext.is_empty() && name.len() > ext.len() + 1 && name.ends_with(&format!(".{ext}"))
    })
}
