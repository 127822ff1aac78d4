//! Image processing and embedded metadata, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` + EXIF orientation |
//! | **Scale → JPEG** | Lanczos3 resize + `JpegEncoder` |
//! | **EXIF** | `kamadak-exif` reader and experimental writer |
//! | **IPTC** | custom IIM codec (JPEG APP13) |
//! | **XMP** | custom RDF/XML reader and writer (JPEG APP1) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend
//! - **Metadata codecs**: segment splicing plus one codec per namespace,
//!   behind [`JpegTagStore`]

pub mod backend;
mod calculations;
mod exif_block;
mod iptc;
pub mod jpeg_tags;
pub mod operations;
mod params;
pub mod rust_backend;
mod segments;
mod xmp;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{needs_resize, oriented_dimensions, scaled_dimensions, thumbnail_height};
pub use jpeg_tags::{JpegTagStore, is_writable_key};
pub use operations::{link_original, scale_image};
pub use params::{Quality, ScaleParams};
pub use rust_backend::RustBackend;
