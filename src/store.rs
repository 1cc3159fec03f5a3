//! Calibration blob persistence
//!
//! Exported calibrations are opaque to this application; they are written and
//! read back byte-for-byte. Writes go through a temporary file and an atomic
//! rename so an interrupted save never leaves a truncated calibration behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StoreError;

/// `path` with `suffix` appended to its full file name
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// File-backed store for one exported calibration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationStore {
    path: PathBuf,
    /// Keep the previous calibration as `<file>.bak` when overwriting
    keep_backup: bool,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: true,
        }
    }

    pub fn without_backup(mut self) -> Self {
        self.keep_backup = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, ".bak")
    }

    fn temp_path(&self) -> PathBuf {
        sibling(&self.path, ".tmp")
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Persist `blob`, replacing any previous calibration
    pub fn save(&self, blob: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(parent, e))?;
            }
        }

        if self.keep_backup && self.path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.path, &backup).map_err(|e| self.io_error(&backup, e))?;
            debug!("Previous calibration backed up to {:?}", backup);
        }

        let temp_path = self.temp_path();
        {
            let mut temp_file =
                fs::File::create(&temp_path).map_err(|e| self.io_error(&temp_path, e))?;
            temp_file
                .write_all(blob.as_bytes())
                .map_err(|e| self.io_error(&temp_path, e))?;
            temp_file
                .sync_all()
                .map_err(|e| self.io_error(&temp_path, e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            self.io_error(&self.path, e)
        })?;

        info!("✅ Calibration saved to {:?} ({} bytes)", self.path, blob.len());
        Ok(())
    }

    /// Read the stored calibration back verbatim
    pub fn load(&self) -> Result<String, StoreError> {
        let bytes = fs::read(&self.path).map_err(|e| self.io_error(&self.path, e))?;
        if bytes.is_empty() {
            return Err(StoreError::Empty(self.path.clone()));
        }
        String::from_utf8(bytes).map_err(|_| StoreError::Encoding {
            path: self.path.clone(),
        })
    }
}
