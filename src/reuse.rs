// src/reuse.rs

//! Decides whether the outputs of a (stage, target) pair already exist.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::stage::Stage;
use crate::storage::Storage;
use crate::target::Target;

/// Extensions of directory-style tables that are only complete once their
/// `_SUCCESS` marker has been written.
const TABLE_EXTENSIONS: &[&str] = &["mt", "ht", "vds"];
const SUCCESS_MARKER: &str = "_SUCCESS";

/// Reuse oracle over a storage collaborator.
///
/// Existence answers are memoised for the lifetime of the oracle: outputs are
/// not expected to appear while a plan is being walked, and the memo keeps
/// results independent of the order in which stages ask.
#[derive(Debug)]
pub struct ReuseOracle {
    storage: Arc<dyn Storage>,
    check_intermediates: bool,
    cache: Mutex<HashMap<PathBuf, bool>>,
}

impl ReuseOracle {
    pub fn new(storage: Arc<dyn Storage>, check_intermediates: bool) -> Self {
        Self {
            storage,
            check_intermediates,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// `true` when every expected output of `stage` for `target` exists.
    ///
    /// Always `false` when intermediate checking is disabled.
    pub fn can_reuse(&self, target: &Target, stage: &dyn Stage) -> bool {
        if !self.check_intermediates {
            return false;
        }
        let reusable = self.outputs_exist(target, stage);
        debug!(
            stage = %stage.name(),
            target = %target.id,
            reusable,
            "checked expected outputs"
        );
        reusable
    }

    /// `true` when the stage declares outputs for `target` and all of them
    /// exist, regardless of `check_intermediates`.
    pub fn outputs_exist(&self, target: &Target, stage: &dyn Stage) -> bool {
        let expected = stage.expected_outputs(target);
        let paths = expected.paths();
        !paths.is_empty() && paths.iter().all(|p| self.exists(p))
    }

    /// First expected output of `stage` for `target` that does not exist.
    pub fn first_missing(&self, target: &Target, stage: &dyn Stage) -> Option<PathBuf> {
        stage
            .expected_outputs(target)
            .paths()
            .into_iter()
            .find(|p| !self.exists(p))
            .map(Path::to_path_buf)
    }

    /// Memoised existence check.
    pub fn exists(&self, locator: &Path) -> bool {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&known) = cache.get(locator) {
            return known;
        }
        let found = self.storage.exists(&completion_marker(locator));
        cache.insert(locator.to_path_buf(), found);
        found
    }
}

/// Locator whose presence proves `locator` is complete.
fn completion_marker(locator: &Path) -> PathBuf {
    let is_table = locator
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TABLE_EXTENSIONS.contains(&e));
    if is_table {
        locator.join(SUCCESS_MARKER)
    } else {
        locator.to_path_buf()
    }
}
