//! Local filesystem external storage.

use super::ExternalStorage;
use crate::error::{Error, Result};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

/// Files stored under a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    /// Creates storage rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Resolves `path` under the root, refusing paths that would escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(Error::invalid_argument(format!(
                "path {:?} must be relative to {}",
                path,
                self.dir.display()
            )));
        }
        Ok(self.dir.join(relative))
    }
}

impl ExternalStorage for LocalStorage {
    fn describe(&self) -> String {
        format!("nodelocal://{}", self.dir.display())
    }

    fn read_file(&self, path: &str) -> Result<Bytes> {
        let full = self.resolve(path)?;
        Ok(Bytes::from(std::fs::read(full)?))
    }

    fn write_file(&self, path: &str, data: Bytes) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write to a temporary name first so readers never see a partial file
        let tmp = full.with_extension("tmp");
        std::fs::write(&tmp, &data)?;
        std::fs::rename(&tmp, &full)?;
        Ok(())
    }
}
