//! User settings for the ledger
//!
//! Stored as `config.json` in the base directory. Every field has a serde
//! default so older files keep loading as fields are added.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::paths::LedgerPaths;
use crate::error::LedgerError;
use crate::models::{OwnerId, RolloverPolicy};
use crate::storage::file_io::write_json_atomic;

/// Lock acquisition tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSettings {
    /// How long a single acquisition attempt may wait
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts after the first before giving up with a conflict
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pause between attempts; doubles on every retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_timeout_ms() -> u64 {
    250
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    10
}

impl LockSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(1 << attempt.min(10)))
    }
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// User settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Owner used by the CLI when `--owner` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,

    #[serde(default = "default_currency")]
    pub currency_symbol: String,

    /// Policy given to categories created without an explicit one
    #[serde(default)]
    pub default_rollover_policy: RolloverPolicy,

    #[serde(default)]
    pub locking: LockSettings,

    /// Check cached balances against history inside every commit
    #[serde(default = "default_true")]
    pub verify_balances_on_commit: bool,

    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_true")]
    pub audit_enabled: bool,
}

fn default_schema_version() -> u32 {
    1
}

fn default_currency() -> String {
    "$".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            owner_id: None,
            currency_symbol: default_currency(),
            default_rollover_policy: RolloverPolicy::default(),
            locking: LockSettings::default(),
            verify_balances_on_commit: true,
            log_level: default_log_level(),
            audit_enabled: true,
        }
    }
}

impl Settings {
    /// Load settings from disk, or defaults if no file exists yet
    ///
    /// Defaults are not written; the caller decides when to persist.
    pub fn load_or_create(paths: &LedgerPaths) -> Result<Self, LedgerError> {
        let settings_path = paths.settings_file();
        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
            LedgerError::StorageUnavailable(format!("Failed to read settings file: {}", e))
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse settings file: {}", e)))
    }

    pub fn save(&self, paths: &LedgerPaths) -> Result<(), LedgerError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }
}
