//! Path management for the ledger
//!
//! ## Path Resolution Order
//!
//! 1. `BUDGET_LEDGER_DATA_DIR` environment variable (if set)
//! 2. The platform config directory for `budget-ledger`
//!    (`~/.config/budget-ledger` on Linux)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::LedgerError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "BUDGET_LEDGER_DATA_DIR";

/// Every file the ledger reads or writes, relative to one base directory
#[derive(Debug, Clone)]
pub struct LedgerPaths {
    base_dir: PathBuf,
}

impl LedgerPaths {
    /// Resolve the base directory from the environment or the platform default
    pub fn new() -> Result<Self, LedgerError> {
        if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            return Ok(Self::with_base_dir(PathBuf::from(custom)));
        }

        let dirs = ProjectDirs::from("", "", "budget-ledger").ok_or_else(|| {
            LedgerError::Config("Could not determine a home directory".into())
        })?;
        Ok(Self::with_base_dir(dirs.config_dir().to_path_buf()))
    }

    /// Use an explicit base directory (tests, embedding)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.base_dir.join("audit.log")
    }

    /// The single ledger snapshot
    pub fn ledger_file(&self) -> PathBuf {
        self.data_dir().join("ledger.json")
    }

    pub fn ensure_directories(&self) -> Result<(), LedgerError> {
        std::fs::create_dir_all(self.data_dir()).map_err(|e| {
            LedgerError::StorageUnavailable(format!("Failed to create data directory: {}", e))
        })
    }

    /// Initialized once a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}
