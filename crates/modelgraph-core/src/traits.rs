use crate::Result;
use std::path::{Path, PathBuf};

/// Finds the candidate module files below a scan root.
pub trait ModuleDiscovery {
    /// Absolute paths, in a stable order.
    fn discover(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Whether a file created at `path` would be part of the next `discover(root)`.
    fn accepts(&self, root: &Path, path: &Path) -> Result<bool>;
}

/// Text access scoped to single source files.
pub trait SourceIo {
    /// `Ok(None)` when the file does not exist.
    fn read_text(&self, path: &Path) -> Result<Option<String>>;

    /// Replace the whole file; a failed write must leave the previous text in place.
    fn write_text(&self, path: &Path, text: &str) -> Result<()>;
}
