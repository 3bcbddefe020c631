//! On-disk cache with explicit completeness markers.
//!
//! Every collection fetched from the API is cached as a data file plus an
//! empty marker file. The marker is written last, after the data file has
//! been fully persisted, and its presence is the only thing that permits
//! skipping a re-fetch: a truncated file from a crashed run is detected by
//! the missing marker, never by inspecting content.

use crate::FitbitError;
use std::fs;
use std::path::{Path, PathBuf};

pub trait CacheStore: Send + Sync {
    fn has(&self, key: &str) -> bool;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FitbitError>;
    /// Write `bytes` under `key` atomically (temp file, then rename).
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), FitbitError>;
    /// Like [`put`](Self::put), but a no-op when the key already exists.
    fn put_if_absent(&self, key: &str, bytes: &[u8]) -> Result<(), FitbitError>;
    /// Certify that the data file paired with `key` is complete.
    fn mark_complete(&self, key: &str) -> Result<(), FitbitError>;
    fn is_complete(&self, key: &str) -> bool;
}

/// Filesystem-backed store rooted at one directory. Keys are relative
/// paths; intermediate directories are created lazily.
#[derive(Clone, Debug)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, FitbitError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl CacheStore for FsCacheStore {
    fn has(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FitbitError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), FitbitError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&path, bytes)
    }

    fn put_if_absent(&self, key: &str, bytes: &[u8]) -> Result<(), FitbitError> {
        if self.has(key) {
            return Ok(());
        }
        self.put(key, bytes)
    }

    fn mark_complete(&self, key: &str) -> Result<(), FitbitError> {
        self.put(key, b"")
    }

    fn is_complete(&self, key: &str) -> bool {
        self.has(key)
    }
}

/// Write to a sibling temp file, fsync, then rename over the final path.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), FitbitError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| FitbitError::Config(format!("invalid cache path: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    {
        use std::io::Write;
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
