// src/storage/mod.rs

//! Storage collaborator.
//!
//! The planner only needs to know whether a locator exists; the script
//! submitter also writes job scripts through the same interface. Locators are
//! plain paths here; remote backends map them onto their own namespace.

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;

pub use mock::MockStorage;

/// Abstract storage interface.
pub trait Storage: Send + Sync + Debug {
    fn exists(&self, locator: &Path) -> bool;
    fn read_to_string(&self, locator: &Path) -> Result<String>;
    fn write(&self, locator: &Path, contents: &[u8]) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn exists(&self, locator: &Path) -> bool {
        locator.exists()
    }

    fn read_to_string(&self, locator: &Path) -> Result<String> {
        fs::read_to_string(locator).with_context(|| format!("reading {:?}", locator))
    }

    fn write(&self, locator: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = locator.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
            }
        }
        let mut file =
            fs::File::create(locator).with_context(|| format!("creating file {:?}", locator))?;
        file.write_all(contents)
            .with_context(|| format!("writing to file {:?}", locator))?;
        Ok(())
    }
}
