//! Structured selection trace.
//!
//! A JSONL record of what the pipeline decided and why, for debugging
//! mis-selections after the fact. Strictly observational: trace failures are
//! logged and swallowed, and nothing downstream reads the trace for
//! correctness. Message text is truncated before it is written; credentials
//! never appear in events.

use crate::config::{ObservabilityConfig, TraceMode};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_TRACE_REL_PATH: &str = "state/selection-trace.jsonl";

/// One pipeline decision event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionTraceEvent {
    pub id: String,
    pub timestamp: String,
    /// Pipeline stage that produced the event (`resolved`, `fast_match`,
    /// `classifier`, `reconciled`, `unfiltered`).
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

pub struct SelectionTrace {
    mode: TraceMode,
    max_entries: usize,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SelectionTrace {
    pub fn from_config(config: &ObservabilityConfig, base_dir: &Path) -> Self {
        let path = config
            .path
            .clone()
            .unwrap_or_else(|| base_dir.join(DEFAULT_TRACE_REL_PATH));
        Self {
            mode: config.trace,
            max_entries: config.max_entries.max(1),
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// A trace that drops every event.
    pub fn disabled() -> Self {
        Self {
            mode: TraceMode::None,
            max_entries: 1,
            path: PathBuf::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Append one event. Never fails the caller; I/O errors are logged.
    pub fn record(&self, stage: &str, success: Option<bool>, message: Option<String>, payload: Value) {
        if self.mode == TraceMode::None {
            return;
        }

        let event = SelectionTraceEvent {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            stage: stage.to_string(),
            success,
            message,
            payload,
        };

        if let Err(error) = self.append(&event) {
            tracing::warn!(error = %error, "failed to write selection trace event");
        }
    }

    fn append(&self, event: &SelectionTraceEvent) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        drop(file);

        if self.mode == TraceMode::Rolling {
            self.trim_to_max()?;
        }
        Ok(())
    }

    /// Rewrite the file keeping only the newest `max_entries` lines.
    fn trim_to_max(&self) -> anyhow::Result<()> {
        let raw = fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = raw.lines().collect();
        if lines.len() <= self.max_entries {
            return Ok(());
        }
        let keep = &lines[lines.len() - self.max_entries..];
        fs::write(&self.path, format!("{}\n", keep.join("\n")))?;
        Ok(())
    }
}
