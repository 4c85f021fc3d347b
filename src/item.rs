use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::filesystem::{FileSystem, Result};

/// Reserved directory size meaning "could not be determined".
pub const SIZE_UNAVAILABLE: i64 = -1;

/// A single named entry in the filesystem, either a file or a directory.
///
/// Items are short-lived value objects produced by
/// [`FileSystem::item`] and [`FileSystem::list_items`]. The name and
/// creation time are snapshots taken at construction; the size is computed
/// on every call and never cached.
#[derive(Debug, Clone)]
pub enum FsItem {
    File {
        name: String,
        path: PathBuf,
        created: SystemTime,
    },
    Directory {
        name: String,
        path: PathBuf,
        created: SystemTime,
    },
}

fn base_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        // Roots like "/" have no final component
        None => path.to_string_lossy().into_owned(),
    }
}

impl FsItem {
    pub fn file(path: PathBuf, created: SystemTime) -> Self {
        FsItem::File {
            name: base_name(&path),
            path,
            created,
        }
    }

    pub fn directory(path: PathBuf, created: SystemTime) -> Self {
        FsItem::Directory {
            name: base_name(&path),
            path,
            created,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FsItem::File { name, .. } | FsItem::Directory { name, .. } => name,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FsItem::File { path, .. } | FsItem::Directory { path, .. } => path,
        }
    }

    pub fn created(&self) -> SystemTime {
        match self {
            FsItem::File { created, .. } | FsItem::Directory { created, .. } => *created,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FsItem::Directory { .. })
    }

    /// Current size of the item, queried through `fs`.
    ///
    /// For a file this is its exact byte length and the query can fail (the
    /// file may have vanished since the item was constructed). For a
    /// directory it is the recursive sum of all nested file lengths, or
    /// [`SIZE_UNAVAILABLE`] when the subtree cannot be fully enumerated;
    /// the directory arm never returns an error.
    pub fn size(&self, fs: &dyn FileSystem) -> Result<i64> {
        match self {
            FsItem::File { path, .. } => Ok(fs.file_len(path)? as i64),
            FsItem::Directory { path, .. } => Ok(fs.tree_size(path)),
        }
    }
}

impl fmt::Display for FsItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
