//! Where classpath roots and their metadata come from.

mod fs;
mod memory;

pub use fs::{discover_roots, is_archive, FsClasspath, ModuleClasspath};
pub use memory::InMemoryClasspath;

use crate::error::Result;
use crate::source::SourceDescriptor;
use std::path::PathBuf;

/// Enumerates modules and their classpath roots, and reads metadata out of a
/// root. Implementations are called from the indexing task, never while the
/// index lock is held.
pub trait ClasspathEnvironment: Send + Sync {
    /// Modules currently part of the project.
    fn modules(&self) -> Result<Vec<String>>;

    /// Roots on `module`'s classpath, in classpath order.
    fn classpath_roots(&self, module: &str) -> Result<Vec<SourceDescriptor>>;

    /// Raw metadata documents of `source`, main document first.
    fn read_metadata(&self, source: &SourceDescriptor) -> Result<Vec<Vec<u8>>>;

    /// Filesystem locations whose changes should trigger a reindex.
    fn watch_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}
