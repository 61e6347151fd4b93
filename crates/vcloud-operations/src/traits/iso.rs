use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::Result;

/// A configuration image on local disk.
///
/// The image lives in a temporary directory that is removed once the last
/// clone is dropped.
#[derive(Debug, Clone)]
pub struct IsoImage {
    path: PathBuf,
    size: u64,
    _dir: Arc<TempDir>,
}

impl IsoImage {
    /// `path` must point into `dir`.
    #[must_use]
    pub fn new(dir: TempDir, path: PathBuf, size: u64) -> Self {
        Self {
            path,
            size,
            _dir: Arc::new(dir),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Packs an agent environment document into an ISO image.
pub trait IsoImageBuilder: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the image tool is missing or fails.
    fn build(&self, env_json: &str) -> Result<IsoImage>;
}
