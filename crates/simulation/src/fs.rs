//! Private in-memory filesystem of a mock network.

use im::OrdSet;
use std::path::{Path, PathBuf};

/// Directory tree held in memory.
///
/// Backed by a persistent set, so clones are cheap snapshots that do not
/// observe later changes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFs {
    directories: OrdSet<PathBuf>,
}

impl InMemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory and all of its missing ancestors.
    pub fn create_dir_all(&mut self, path: impl AsRef<Path>) {
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.directories.insert(ancestor.to_path_buf());
        }
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.directories.contains(path.as_ref())
    }

    /// All directories in path order.
    pub fn directories(&self) -> impl Iterator<Item = &PathBuf> {
        self.directories.iter()
    }
}
