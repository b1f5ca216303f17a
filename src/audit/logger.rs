//! JSONL audit log writer

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use crate::error::{LedgerError, LedgerResult};
use crate::models::OwnerId;

use super::entry::AuditEntry;

/// Appends audit entries to a line-delimited JSON file
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self { log_path }
    }

    /// Append all entries of one commit, flushing once at the end
    pub fn log_batch(&self, entries: &[AuditEntry]) -> LedgerResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                LedgerError::StorageUnavailable(format!("Failed to open audit log: {}", e))
            })?;

        for entry in entries {
            let json = serde_json::to_string(entry)?;
            writeln!(file, "{}", json).map_err(|e| {
                LedgerError::StorageUnavailable(format!("Failed to write audit entry: {}", e))
            })?;
        }

        file.flush().map_err(|e| {
            LedgerError::StorageUnavailable(format!("Failed to flush audit log: {}", e))
        })?;

        Ok(())
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> LedgerResult<Vec<AuditEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path).map_err(|e| {
            LedgerError::StorageUnavailable(format!("Failed to open audit log: {}", e))
        })?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                LedgerError::StorageUnavailable(format!(
                    "Failed to read audit log line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
                LedgerError::StorageUnavailable(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// The most recent `count` entries touching `owner_id`'s data, oldest first
    pub fn read_recent(&self, owner_id: OwnerId, count: usize) -> LedgerResult<Vec<AuditEntry>> {
        let mut owned: Vec<AuditEntry> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.owner_id == Some(owner_id))
            .collect();
        let start = owned.len().saturating_sub(count);
        Ok(owned.split_off(start))
    }
}
