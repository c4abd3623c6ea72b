// src/storage/mock.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use super::Storage;

/// In-memory storage keyed by locator.
///
/// Clones share the same contents, so a test can keep a handle while the
/// workflow owns another. Calls to `exists` are counted to check memoisation.
#[derive(Debug, Clone, Default)]
pub struct MockStorage {
    objects: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    exists_calls: Arc<AtomicUsize>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with empty objects at `locators`.
    pub fn with_objects<I, P>(locators: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let storage = Self::new();
        for locator in locators {
            storage.add(locator, Vec::new());
        }
        storage
    }

    pub fn add(&self, locator: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        self.lock()
            .insert(normalize(locator.as_ref()), contents.into());
    }

    pub fn remove(&self, locator: impl AsRef<Path>) -> bool {
        self.lock().remove(&normalize(locator.as_ref())).is_some()
    }

    /// Number of objects stored.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored locators, sorted.
    pub fn locators(&self) -> Vec<PathBuf> {
        let mut all: Vec<PathBuf> = self.lock().keys().cloned().collect();
        all.sort();
        all
    }

    /// How many times `exists` was called.
    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        // A panic while holding the lock leaves the map intact.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Strip a trailing separator so `foo.mt/` and `foo.mt` are the same object.
fn normalize(locator: &Path) -> PathBuf {
    locator.components().collect()
}

impl Storage for MockStorage {
    fn exists(&self, locator: &Path) -> bool {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.lock().contains_key(&normalize(locator))
    }

    fn read_to_string(&self, locator: &Path) -> Result<String> {
        match self.lock().get(&normalize(locator)) {
            Some(content) => {
                String::from_utf8(content.clone()).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
            }
            None => Err(anyhow!("Object not found: {:?}", locator)),
        }
    }

    fn write(&self, locator: &Path, contents: &[u8]) -> Result<()> {
        self.add(locator, contents);
        Ok(())
    }
}
