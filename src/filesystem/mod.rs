mod real;

pub use real::RealFileSystem;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::item::FsItem;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Capability set the shell depends on. Implemented by [`RealFileSystem`]
/// and by the in-memory mock used in tests.
///
/// The working directory is per-instance state, not the process-wide one:
/// it is read through [`FileSystem::current_directory`] by every
/// relative-path resolution and changed only by
/// [`FileSystem::set_current_directory`].
pub trait FileSystem: Send + Sync {
    /// Look up a single path. Fails with [`FsError::NotFound`] if neither a
    /// file nor a directory exists there.
    fn item(&self, path: &Path) -> Result<FsItem>;

    /// Immediate children of `path`: all regular files first, then all
    /// subdirectories, each group in enumeration order.
    fn list_items(&self, path: &Path) -> Result<Vec<FsItem>>;

    /// Byte length of a regular file, re-queried on every call.
    fn file_len(&self, path: &Path) -> Result<u64>;

    /// Sum of the byte lengths of every file nested under `path`, at any
    /// depth. Returns -1 if any part of the subtree cannot be enumerated;
    /// a partial sum is never returned.
    fn tree_size(&self, path: &Path) -> i64;

    /// Remove a file, or a directory together with all of its contents.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Copy a file or a directory tree. A directory copy merges into an
    /// existing destination; a file copy fails with
    /// [`FsError::AlreadyExists`] when the destination exists and
    /// `overwrite` is false.
    fn copy(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<()>;

    /// Move a file or directory. An existing destination file is always
    /// replaced, with no overwrite flag.
    fn rename(&self, source: &Path, destination: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> Result<bool>;

    fn current_directory(&self) -> Result<PathBuf>;

    /// Fails with [`FsError::NotFound`] unless `path` is an existing
    /// directory; the working directory is left unchanged on failure.
    fn set_current_directory(&self, path: &Path) -> Result<()>;

    /// Create `path` and any missing parents. Idempotent.
    fn create_directory(&self, path: &Path) -> Result<()>;

    /// Create an empty file at `path`, truncating any existing content.
    /// No handle is held after this returns.
    fn create_file(&self, path: &Path) -> Result<()>;
}
