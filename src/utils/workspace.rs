//! # Run Working Directories
//!
//! Each run gets a fresh directory under a common root, named by its start
//! timestamp (`%Y%m%dT%H%M%S`). A second run in the same second gets a
//! numbered suffix. The directory is never shared between runs and is kept
//! after the run so results can be saved from it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::error::Result;

/// Default root for run directories: `<system temp>/rephase`
pub fn default_root() -> PathBuf {
    std::env::temp_dir().join("rephase")
}

/// A run-exclusive working directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDirectory {
    path: PathBuf,
}

impl RunDirectory {
    /// Create a new directory under `root`, creating `root` if needed
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)?;
        let stamp = Local::now().format("%Y%m%dT%H%M%S").to_string();

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                stamp.clone()
            } else {
                format!("{}-{}", stamp, attempt)
            };
            let path = root.join(name);
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!(path = ?path, "created run directory");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}
