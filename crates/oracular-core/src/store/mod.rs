//! Pluggable artifact storage.
//!
//! Persistence code only sees the [`ArtifactStore`] trait; backends are
//! interchangeable. The local backend lays artifacts out under a root
//! directory and writes through a same-directory temp file so readers never
//! observe a half-written artifact.

pub mod serialize;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::Rng;

use crate::error::{OracleError, Result};

pub use serialize::{mint_version, BaseModelType, Metainfo, ModelRegistry, ModelStore};

/// Byte-oriented key/value storage for model artifacts. Keys are
/// slash-separated paths relative to the store root.
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any existing artifact.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the artifact under `key`, failing with `ArtifactMissing` when
    /// absent.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    fn exists(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Filesystem-backed store rooted at a directory.
#[derive(Debug)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(LocalArtifactStore { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for part in key.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Temp file in the target directory, then rename into place.
        let suffix: u32 = rand::thread_rng().gen();
        let tmp = path.with_extension(format!("tmp{:08x}", suffix));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Err(OracleError::ArtifactMissing(key.to_string()));
        }
        Ok(fs::read(path)?)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.path_for(key).is_file())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if self.root.is_dir() {
            self.walk(&self.root.clone(), &mut keys)?;
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store, mostly for tests and ephemeral pipelines.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        MemoryArtifactStore::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| OracleError::UpstreamService("artifact store lock poisoned".to_string()))
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| OracleError::ArtifactMissing(key.to_string()))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Resolve a store location to a backend.
///
/// `mem://` gives an in-memory store; anything else is treated as a local
/// directory. Cloud URLs are recognized but unsupported in this build.
pub fn store_for(location: &str) -> Result<Box<dyn ArtifactStore>> {
    if location.starts_with("s3://") {
        return Err(OracleError::Config(format!(
            "s3 artifact stores are not supported: '{}'",
            location
        )));
    }
    if location == "mem://" || location.starts_with("mem://") {
        return Ok(Box::new(MemoryArtifactStore::new()));
    }
    Ok(Box::new(LocalArtifactStore::new(location)?))
}
