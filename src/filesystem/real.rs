use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use filetime::{set_file_mtime, FileTime};
use walkdir::WalkDir;

use super::{FileSystem, FsError, Result};
use crate::item::FsItem;

/// OS-backed [`FileSystem`] implementation.
///
/// Holds the working directory itself instead of touching the process-wide
/// one, so independent instances stay isolated.
#[derive(Debug)]
pub struct RealFileSystem {
    cwd: Mutex<PathBuf>,
}

fn classify(err: std::io::Error, path: &Path) -> FsError {
    match err.kind() {
        ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => FsError::PermissionDenied(path.to_path_buf()),
        ErrorKind::AlreadyExists => FsError::AlreadyExists(path.to_path_buf()),
        _ => FsError::Io(err),
    }
}

fn created_at(metadata: &fs::Metadata) -> SystemTime {
    metadata
        .created()
        .or_else(|_| metadata.modified()) // Not every platform records birth time
        .unwrap_or_else(|_| SystemTime::now())
}

impl RealFileSystem {
    /// Starts in the process working directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Ok(Self {
            cwd: Mutex::new(cwd),
        })
    }

    /// Starts in `path` instead of the process working directory.
    pub fn rooted_at(path: &Path) -> Result<Self> {
        let resolved = path.canonicalize().map_err(|e| classify(e, path))?;
        if !resolved.is_dir() {
            return Err(FsError::NotFound(path.to_path_buf()));
        }
        Ok(Self {
            cwd: Mutex::new(resolved),
        })
    }

    fn copy_one_file(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
        if !overwrite && destination.exists() {
            return Err(FsError::AlreadyExists(destination.to_path_buf()));
        }
        fs::copy(source, destination).map_err(|e| classify(e, destination))?;
        Ok(())
    }

    // Pre-order depth-first copy, merging into existing directories. No
    // cycle detection: a symlink loop will not terminate.
    fn copy_tree(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
        fs::create_dir_all(destination).map_err(|e| classify(e, destination))?;

        let entries = fs::read_dir(source).map_err(|e| classify(e, source))?;
        for entry in entries {
            let entry = entry.map_err(|e| classify(e, source))?;
            let target = destination.join(entry.file_name());
            let file_type = entry.file_type().map_err(|e| classify(e, &entry.path()))?;

            if file_type.is_dir() {
                self.copy_tree(&entry.path(), &target, overwrite)?;
            } else {
                self.copy_one_file(&entry.path(), &target, overwrite)?;
            }
        }
        Ok(())
    }
}

impl FileSystem for RealFileSystem {
    fn item(&self, path: &Path) -> Result<FsItem> {
        let metadata = fs::metadata(path).map_err(|e| classify(e, path))?;
        let created = created_at(&metadata);

        if metadata.is_dir() {
            Ok(FsItem::directory(path.to_path_buf(), created))
        } else {
            Ok(FsItem::file(path.to_path_buf(), created))
        }
    }

    fn list_items(&self, path: &Path) -> Result<Vec<FsItem>> {
        if !path.is_dir() {
            return Err(FsError::NotFound(path.to_path_buf()));
        }

        let mut files = Vec::new();
        let mut dirs = Vec::new();

        let entries = fs::read_dir(path).map_err(|e| classify(e, path))?;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue, // Skip entries we can't read
            };
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue, // Skip entries we can't get metadata for
            };

            let created = created_at(&metadata);
            if metadata.is_dir() {
                dirs.push(FsItem::directory(entry.path(), created));
            } else {
                files.push(FsItem::file(entry.path(), created));
            }
        }

        // Regular files first, then subdirectories
        files.append(&mut dirs);
        Ok(files)
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).map_err(|e| classify(e, path))?;
        if metadata.is_dir() {
            return Err(FsError::NotFound(path.to_path_buf()));
        }
        Ok(metadata.len())
    }

    fn tree_size(&self, path: &Path) -> i64 {
        let mut total: u64 = 0;

        for entry in WalkDir::new(path) {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    // An unreadable subtree poisons the whole sum
                    log::debug!("size scan of {} aborted: {}", path.display(), err);
                    return -1;
                }
            };
            if entry.file_type().is_file() {
                match entry.metadata() {
                    Ok(metadata) => total += metadata.len(),
                    Err(_) => return -1,
                }
            }
        }

        total as i64
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(|e| classify(e, path))
        } else if path.exists() {
            fs::remove_file(path).map_err(|e| classify(e, path))
        } else {
            Err(FsError::NotFound(path.to_path_buf()))
        }
    }

    fn copy(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
        let metadata = fs::metadata(source).map_err(|e| classify(e, source))?;
        if metadata.is_dir() {
            self.copy_tree(source, destination, overwrite)
        } else {
            self.copy_one_file(source, destination, overwrite)
        }
    }

    fn rename(&self, source: &Path, destination: &Path) -> Result<()> {
        if !source.exists() {
            return Err(FsError::NotFound(source.to_path_buf()));
        }

        // Replace semantics regardless of platform: rename over an existing
        // file fails on Windows
        if destination.is_file() {
            fs::remove_file(destination).map_err(|e| classify(e, destination))?;
        }

        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(err) => {
                // rename cannot cross volumes; fall back to copy + delete
                log::debug!(
                    "rename {} -> {} failed ({}), copying instead",
                    source.display(),
                    destination.display(),
                    err
                );
                let modified = fs::metadata(source)
                    .map_err(|e| classify(e, source))?
                    .modified()
                    .ok();

                self.copy(source, destination, true)?;
                if let Some(time) = modified {
                    if destination.is_file() {
                        let _ = set_file_mtime(destination, FileTime::from(time));
                    }
                }
                self.delete(source)
            }
        }
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.exists())
    }

    fn current_directory(&self) -> Result<PathBuf> {
        Ok(self.cwd.lock().unwrap().clone())
    }

    fn set_current_directory(&self, path: &Path) -> Result<()> {
        // canonicalize also resolves ".." typed by the user
        let resolved = path.canonicalize().map_err(|e| classify(e, path))?;
        if !resolved.is_dir() {
            return Err(FsError::NotFound(path.to_path_buf()));
        }
        *self.cwd.lock().unwrap() = resolved;
        Ok(())
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| classify(e, path))
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        // File::create truncates; the handle is dropped right away
        fs::File::create(path).map_err(|e| classify(e, path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, RealFileSystem) {
        let temp = TempDir::new().unwrap();
        let fs = RealFileSystem::rooted_at(temp.path()).unwrap();
        (temp, fs)
    }

    #[test]
    fn test_list_items_files_before_directories() {
        let (temp, fs) = fixture();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("a.txt"), "aaa").unwrap();
        fs::write(temp.path().join("b.txt"), "bb").unwrap();

        let items = fs.list_items(temp.path()).unwrap();
        assert_eq!(items.len(), 3);
        assert!(!items[0].is_directory());
        assert!(!items[1].is_directory());
        assert!(items[2].is_directory());
        assert_eq!(items[2].name(), "sub");
    }

    #[test]
    fn test_list_items_not_found_for_file_path() {
        let (temp, fs) = fixture();
        let file = temp.path().join("f.txt");
        fs::write(&file, "x").unwrap();

        assert!(matches!(fs.list_items(&file), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_tree_size_sums_nested_files() {
        let (temp, fs) = fixture();
        fs::create_dir_all(temp.path().join("d/sub")).unwrap();
        fs::write(temp.path().join("d/a.bin"), vec![0u8; 10]).unwrap();
        fs::write(temp.path().join("d/sub/b.bin"), vec![0u8; 20]).unwrap();

        assert_eq!(fs.tree_size(&temp.path().join("d")), 30);
    }

    #[cfg(unix)]
    #[test]
    fn test_tree_size_sentinel_on_unreadable_subtree() {
        use std::os::unix::fs::PermissionsExt;

        let (temp, fs) = fixture();
        let locked = temp.path().join("d/locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(temp.path().join("d/a.bin"), vec![0u8; 10]).unwrap();
        fs::write(locked.join("hidden.bin"), vec![0u8; 20]).unwrap();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        let size = fs.tree_size(&temp.path().join("d"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(size, -1);
    }

    #[test]
    fn test_create_directory_is_idempotent() {
        let (temp, fs) = fixture();
        let dir = temp.path().join("x/y");

        fs.create_directory(&dir).unwrap();
        fs.create_directory(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_create_file_truncates_existing_content() {
        let (temp, fs) = fixture();
        let file = temp.path().join("f.txt");
        fs::write(&file, "previous content").unwrap();

        fs.create_file(&file).unwrap();
        assert_eq!(fs.file_len(&file).unwrap(), 0);
    }

    #[test]
    fn test_copy_reproduces_tree_and_merges() {
        let (temp, fs) = fixture();
        fs::create_dir_all(temp.path().join("src/sub")).unwrap();
        fs::write(temp.path().join("src/a.txt"), "aaa").unwrap();
        fs::write(temp.path().join("src/sub/b.txt"), "bbbb").unwrap();

        let dst = temp.path().join("dst");
        fs.copy(&temp.path().join("src"), &dst, false).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "aaa");
        assert_eq!(fs::read_to_string(dst.join("sub/b.txt")).unwrap(), "bbbb");

        // Copying another tree onto the existing destination merges
        fs::create_dir(temp.path().join("more")).unwrap();
        fs::write(temp.path().join("more/c.txt"), "cc").unwrap();
        fs.copy(&temp.path().join("more"), &dst, false).unwrap();
        assert!(dst.join("c.txt").exists());
        assert!(dst.join("a.txt").exists());

        // An existing file child still collides without overwrite
        fs::write(temp.path().join("src/a.txt"), "changed").unwrap();
        let err = fs.copy(&temp.path().join("src"), &dst, false).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "aaa");

        fs.copy(&temp.path().join("src"), &dst, true).unwrap();
        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "changed");
    }

    #[test]
    fn test_copy_file_collision_without_overwrite() {
        let (temp, fs) = fixture();
        let src = temp.path().join("src.txt");
        let dst = temp.path().join("dst.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();

        let err = fs.copy(&src, &dst, false).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "old");

        fs.copy(&src, &dst, true).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_rename_replaces_existing_destination() {
        let (temp, fs) = fixture();
        let src = temp.path().join("src.txt");
        let dst = temp.path().join("dst.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();

        // No overwrite flag needed, unlike copy
        fs.rename(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_rename_missing_source_leaves_destination_intact() {
        let (temp, fs) = fixture();
        let dst = temp.path().join("dst.txt");
        fs::write(&dst, "old").unwrap();

        let err = fs.rename(&temp.path().join("ghost"), &dst).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "old");
    }

    #[test]
    fn test_delete_removes_non_empty_directory() {
        let (temp, fs) = fixture();
        let dir = temp.path().join("d");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/f.txt"), "x").unwrap();

        fs.delete(&dir).unwrap();
        assert!(!fs.exists(&dir).unwrap());
    }

    #[test]
    fn test_delete_missing_path_is_not_found() {
        let (temp, fs) = fixture();
        let err = fs.delete(&temp.path().join("nope")).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[test]
    fn test_set_current_directory_rejects_missing_path() {
        let (temp, fs) = fixture();
        let before = fs.current_directory().unwrap();

        let err = fs
            .set_current_directory(&temp.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
        assert_eq!(fs.current_directory().unwrap(), before);
    }

    #[test]
    fn test_set_current_directory_resolves_dot_dot() {
        let (temp, fs) = fixture();
        let sub = temp.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs.set_current_directory(&sub).unwrap();
        fs.set_current_directory(&sub.join("..")).unwrap();
        assert_eq!(
            fs.current_directory().unwrap(),
            temp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_item_not_found() {
        let (temp, fs) = fixture();
        let err = fs.item(&temp.path().join("ghost")).unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }
}
