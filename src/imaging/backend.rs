//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two pixel operations the pipeline
//! needs: identify and scale. Metadata never passes through the backend; it
//! is re-embedded afterwards by [`operations`](super::operations).
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests swap in a recording mock.

use super::params::ScaleParams;
use crate::metadata::MetadataError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("Failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

/// Pixel dimensions, as displayed (after orientation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Trait for image processing backends.
pub trait ImageBackend: Sync {
    /// Displayed dimensions of an image, honoring its orientation tag.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode, orient, resize to the target height and encode as JPEG.
    /// Returns the dimensions written.
    fn scale(&self, params: &ScaleParams) -> Result<Dimensions, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::calculations::scaled_dimensions;
    use crate::imaging::params::Quality;
    use crate::test_helpers::create_test_jpeg;
    use std::sync::Mutex;

    /// Mock backend that records operations.
    ///
    /// `scale` writes a small synthetic JPEG of the computed size so later
    /// metadata steps have a real file to open. Uses Mutex (not RefCell) so
    /// it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Scale {
            source: String,
            output: String,
            target_height: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Output paths of every scale call, in call order.
        pub fn scaled_outputs(&self) -> Vec<String> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Scale { output, .. } => Some(output),
                    RecordedOp::Identify(_) => None,
                })
                .collect()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            let (width, height) =
                image::image_dimensions(path).map_err(|e| BackendError::Decode {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            Ok(Dimensions { width, height })
        }

        fn scale(&self, params: &ScaleParams) -> Result<Dimensions, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Scale {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                target_height: params.target_height,
                quality: params.quality.value(),
            });

            let native = self.identify(&params.source)?;
            let dims = scaled_dimensions(native, params.target_height);
            create_test_jpeg(&params.output, dims.width, dims.height);
            Ok(dims)
        }
    }

    #[test]
    fn mock_records_identify() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.jpg");
        create_test_jpeg(&path, 80, 60);

        let backend = MockBackend::new();
        let result = backend.identify(&path).unwrap();
        assert_eq!(result, Dimensions::new(80, 60));

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p.ends_with("a.jpg")));
    }

    #[test]
    fn mock_records_scale_and_writes_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("a.jpg");
        let output = tmp.path().join("out.jpg");
        create_test_jpeg(&source, 80, 40);

        let backend = MockBackend::new();
        let dims = backend
            .scale(&ScaleParams {
                source,
                output: output.clone(),
                target_height: 20,
                quality: Quality::new(75),
            })
            .unwrap();

        assert_eq!(dims, Dimensions::new(40, 20));
        assert!(output.exists());
        assert!(backend.get_operations().contains(&RecordedOp::Scale {
            source: tmp.path().join("a.jpg").to_string_lossy().to_string(),
            output: output.to_string_lossy().to_string(),
            target_height: 20,
            quality: 75,
        }));
    }
}
