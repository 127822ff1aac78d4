//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Output dimensions of a height-anchored scale.
///
/// The height is always `target_height`; the width keeps the aspect ratio,
/// rounded, and never drops below 1.
///
/// ```
/// # use fotos::imaging::{Dimensions, scaled_dimensions};
/// // 4000x3000 landscape to 1600 high → 2133x1600
/// assert_eq!(
///     scaled_dimensions(Dimensions::new(4000, 3000), 1600),
///     Dimensions::new(2133, 1600)
/// );
/// ```
pub fn scaled_dimensions(native: Dimensions, target_height: u32) -> Dimensions {
    let height = target_height.max(1);
    let width = if native.height == 0 {
        native.width.max(1)
    } else {
        ((native.width as f64 * height as f64 / native.height as f64).round() as u32).max(1)
    };
    Dimensions { width, height }
}

/// Whether an album-size image must be produced by scaling.
///
/// Images strictly smaller than the target on both axes are linked as-is.
/// An image exactly at the target on either axis is still re-encoded.
pub fn needs_resize(native: Dimensions, target: u32) -> bool {
    native.width >= target || native.height >= target
}

/// Displayed dimensions for stored dimensions and an EXIF orientation value.
///
/// Orientations 5–8 involve a quarter turn and swap the axes.
pub fn oriented_dimensions(stored: Dimensions, orientation: u32) -> Dimensions {
    match orientation {
        5..=8 => Dimensions {
            width: stored.height,
            height: stored.width,
        },
        _ => stored,
    }
}

/// Thumbnail height for a rating: large from `large_rating` upward.
pub fn thumbnail_height(rating: u32, large_rating: u32, small: u32, large: u32) -> u32 {
    if rating >= large_rating { large } else { small }
}
