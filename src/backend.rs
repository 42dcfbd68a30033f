//! Settings backends
//!
//! The host stores the settings document as a JSON blob under a single key.
//! [`SettingsBackend`] is that key-value API; it is asynchronous because the
//! host storage call is, and object-safe so the store can hold any adapter
//! behind a reference.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::rc::Rc;

/// Object-safe boxed future returned by [`SettingsBackend`] methods
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Host key-value storage for JSON blobs
pub trait SettingsBackend {
    /// Load the raw JSON stored under `key`, `None` when nothing is stored
    fn load<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Result<Option<String>>>;

    /// Store `raw_json` under `key` in a single write
    fn save<'a>(&'a self, key: &'a str, raw_json: &'a str) -> BackendFuture<'a, Result<()>>;

    /// Delete `key`. Deleting a missing key succeeds.
    fn delete<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Result<()>>;
}

/// In-memory backend, shared between clones
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw blob currently stored under `key`
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.borrow().get(key).cloned()
    }

    /// Store a raw blob directly, bypassing the settings store
    pub fn insert_raw(&self, key: &str, raw_json: &str) {
        self.inner
            .borrow_mut()
            .insert(key.to_string(), raw_json.to_string());
    }
}

impl SettingsBackend for MemoryBackend {
    fn load<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Result<Option<String>>> {
        Box::pin(async move { Ok(self.inner.borrow().get(key).cloned()) })
    }

    fn save<'a>(&'a self, key: &'a str, raw_json: &'a str) -> BackendFuture<'a, Result<()>> {
        Box::pin(async move {
            self.inner
                .borrow_mut()
                .insert(key.to_string(), raw_json.to_string());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Result<()>> {
        Box::pin(async move {
            self.inner.borrow_mut().remove(key);
            Ok(())
        })
    }
}

/// Backend that keeps one `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Create a backend rooted at `root`, creating the directory if needed
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.json", key)))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::Backend("storage key must not be empty".to_string()));
    }
    if key.contains(['/', '\\']) || key == "." || key == ".." {
        return Err(Error::Backend(format!("invalid storage key '{}'", key)));
    }
    Ok(())
}

impl SettingsBackend for FileBackend {
    fn load<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            if !path.exists() {
                return Ok(None);
            }
            Ok(Some(fs::read_to_string(&path)?))
        })
    }

    fn save<'a>(&'a self, key: &'a str, raw_json: &'a str) -> BackendFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            // Readers must never observe a half-written document.
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, raw_json)?;
            fs::rename(&tmp, &path)?;
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BackendFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = self.path_for(key)?;
            match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }
}
