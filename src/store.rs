//! File storage used by the upload service.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Save/open/delete by path.
pub trait FileStore: Send + Sync {
    /// Where `name` would be stored. The name is sanitised first.
    fn path_for(&self, name: &str) -> PathBuf;
    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf>;
    fn open(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn delete(&self, path: &Path) -> io::Result<()>;
}

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Creates `root` if it does not exist.
    pub fn new<P: AsRef<Path>>(root: P) -> io::Result<Self> {
        let root = root.as_ref().to_owned();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStore for LocalFileStore {
    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_filename(name))
    }

    fn save(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path_for(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    fn open(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Reduce an uploaded name to a safe single path component.
///
/// Directory parts are dropped, anything outside `[A-Za-z0-9._-]` becomes
/// `_`, and leading dots are stripped. An empty result becomes `"upload"`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() { "upload".into() } else { trimmed.into() }
}
