//! Cycle result persistence
//!
//! Append-only durable log of completed cycles, one JSON record per line.
//! The orchestrator treats append failures as log-and-continue; nothing in
//! the cycle depends on persistence succeeding.

use crate::error::MonitorError;
use crate::models::CycleResult;
use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Append one completed cycle record to the durable log.
    async fn append(&self, result: &CycleResult) -> Result<(), MonitorError>;
}

/// Line-delimited JSON file store
pub struct JsonlResultStore {
    path: PathBuf,
}

impl JsonlResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultStore for JsonlResultStore {
    async fn append(&self, result: &CycleResult) -> Result<(), MonitorError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    MonitorError::Unexpected(format!("failed to create results directory: {e}"))
                })?;
            }
        }

        let line = serde_json::to_string(result)
            .map_err(|e| MonitorError::Unexpected(format!("failed to encode cycle result: {e}")))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                MonitorError::Unexpected(format!("failed to open results log: {e}"))
            })?;
        writeln!(file, "{line}")
            .map_err(|e| MonitorError::Unexpected(format!("failed to append result: {e}")))?;

        Ok(())
    }
}
