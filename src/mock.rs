use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::filesystem::{FileSystem, FsError, Result};
use crate::item::FsItem;

#[derive(Debug, Clone)]
struct MockFile {
    content: Vec<u8>,
    created: SystemTime,
}

/// In-memory [`FileSystem`] for tests. Paths are virtual and absolute;
/// directories must be added explicitly before files are placed in them.
#[derive(Debug, Clone)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockFile>>>,
    directories: Arc<Mutex<Vec<PathBuf>>>,
    denied: Arc<Mutex<Vec<PathBuf>>>,
    cwd: Arc<Mutex<PathBuf>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self {
            files: Arc::new(Mutex::new(HashMap::new())),
            directories: Arc::new(Mutex::new(vec![PathBuf::from("/")])),
            denied: Arc::new(Mutex::new(Vec::new())),
            cwd: Arc::new(Mutex::new(PathBuf::from("/"))),
        }
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: Vec<u8>, created: SystemTime) {
        let path = path.into();
        let mut files = self.files.lock().unwrap();
        files.insert(path, MockFile { content, created });
    }

    pub fn add_directory(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut directories = self.directories.lock().unwrap();
        if !directories.contains(&path) {
            directories.push(path);
        }
    }

    /// Marks a directory as unreadable: listing it fails with a permission
    /// error from then on.
    pub fn deny(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut denied = self.denied.lock().unwrap();
        if !denied.contains(&path) {
            denied.push(path);
        }
    }

    pub fn get_file_content(&self, path: &Path) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap();
        files.get(path).map(|f| f.content.clone())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn is_directory(&self, path: &Path) -> bool {
        self.directories.lock().unwrap().contains(&path.to_path_buf())
    }

    fn is_denied(&self, path: &Path) -> bool {
        self.denied.lock().unwrap().contains(&path.to_path_buf())
    }

    fn copy_one_file(&self, from: &Path, to: &Path, overwrite: bool) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let source = files
            .get(from)
            .ok_or_else(|| FsError::NotFound(from.to_path_buf()))?
            .clone();

        if !overwrite && files.contains_key(to) {
            return Err(FsError::AlreadyExists(to.to_path_buf()));
        }
        files.insert(to.to_path_buf(), source);
        Ok(())
    }

    fn copy_tree(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
        self.add_directory(destination);

        for entry in self.list_items(source)? {
            let target = destination.join(entry.name());
            if entry.is_directory() {
                self.copy_tree(entry.path(), &target, overwrite)?;
            } else {
                self.copy_one_file(entry.path(), &target, overwrite)?;
            }
        }
        Ok(())
    }
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MockFileSystem {
    fn item(&self, path: &Path) -> Result<FsItem> {
        let files = self.files.lock().unwrap();
        if let Some(file) = files.get(path) {
            return Ok(FsItem::file(path.to_path_buf(), file.created));
        }
        drop(files);

        if self.is_directory(path) {
            Ok(FsItem::directory(path.to_path_buf(), SystemTime::now()))
        } else {
            Err(FsError::NotFound(path.to_path_buf()))
        }
    }

    fn list_items(&self, path: &Path) -> Result<Vec<FsItem>> {
        if self.is_denied(path) {
            return Err(FsError::PermissionDenied(path.to_path_buf()));
        }
        if !self.is_directory(path) {
            return Err(FsError::NotFound(path.to_path_buf()));
        }

        let mut results = Vec::new();

        let files = self.files.lock().unwrap();
        for (file_path, file) in files.iter() {
            if file_path.parent() == Some(path) {
                results.push(FsItem::file(file_path.clone(), file.created));
            }
        }
        drop(files);

        let directories = self.directories.lock().unwrap();
        for dir_path in directories.iter() {
            if dir_path.parent() == Some(path) && dir_path != path {
                results.push(FsItem::directory(dir_path.clone(), SystemTime::now()));
            }
        }

        Ok(results)
    }

    fn file_len(&self, path: &Path) -> Result<u64> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .map(|f| f.content.len() as u64)
            .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
    }

    fn tree_size(&self, path: &Path) -> i64 {
        let entries = match self.list_items(path) {
            Ok(entries) => entries,
            Err(_) => return -1,
        };

        let mut total: i64 = 0;
        for entry in entries {
            if entry.is_directory() {
                let subtotal = self.tree_size(entry.path());
                if subtotal < 0 {
                    return -1;
                }
                total += subtotal;
            } else {
                match self.file_len(entry.path()) {
                    Ok(len) => total += len as i64,
                    Err(_) => return -1,
                }
            }
        }
        total
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if self.is_file(path) {
            self.files.lock().unwrap().remove(path);
            return Ok(());
        }
        if !self.is_directory(path) {
            return Err(FsError::NotFound(path.to_path_buf()));
        }

        let mut files = self.files.lock().unwrap();
        files.retain(|p, _| !p.starts_with(path));
        drop(files);

        let mut directories = self.directories.lock().unwrap();
        directories.retain(|p| !p.starts_with(path));
        Ok(())
    }

    fn copy(&self, source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
        if self.is_file(source) {
            self.copy_one_file(source, destination, overwrite)
        } else if self.is_directory(source) {
            self.copy_tree(source, destination, overwrite)
        } else {
            Err(FsError::NotFound(source.to_path_buf()))
        }
    }

    fn rename(&self, source: &Path, destination: &Path) -> Result<()> {
        self.copy(source, destination, true)?;
        self.delete(source)
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.is_file(path) || self.is_directory(path))
    }

    fn current_directory(&self) -> Result<PathBuf> {
        Ok(self.cwd.lock().unwrap().clone())
    }

    fn set_current_directory(&self, path: &Path) -> Result<()> {
        if !self.is_directory(path) {
            return Err(FsError::NotFound(path.to_path_buf()));
        }
        *self.cwd.lock().unwrap() = path.to_path_buf();
        Ok(())
    }

    fn create_directory(&self, path: &Path) -> Result<()> {
        // Mirrors recursive create: every missing ancestor appears too
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.add_directory(ancestor);
        }
        Ok(())
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        self.add_file(path, Vec::new(), SystemTime::now());
        Ok(())
    }
}
