//! Configuration schema for `toolpick`.
//!
//! Loaded from `~/.toolpick/config.toml` (or an explicit `--config` path).
//! Every field carries a serde default so a missing or empty file yields a
//! working configuration. The whole tree derives [`JsonSchema`] so the CLI
//! can export a machine-readable schema for editor completion.

use crate::catalog::ToolId;
use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Selection pipeline switches and extra trigger rules (`[selection]`).
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Fallback classifier endpoint (`[classifier]`).
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Tool policy snapshot cache (`[policy]`).
    #[serde(default)]
    pub policy: PolicyCacheConfig,
    /// Selection trace output (`[observability]`).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Default config file location: `~/.toolpick/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = UserDirs::new().context("cannot determine home directory")?;
        Ok(dirs.home_dir().join(".toolpick").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    /// A missing file is not an error; it yields `Config::default()`.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

/// Selection pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SelectionConfig {
    /// Master switch for per-turn automatic tool selection. Default: `true`.
    /// When off, every turn proceeds unfiltered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Extra deterministic trigger rules, merged with the built-in table.
    #[serde(default)]
    pub rules: Vec<MatchRule>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: Vec::new(),
        }
    }
}

/// One deterministic trigger rule mapping message patterns to a tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatchRule {
    /// The tool this rule fires for.
    pub tool: ToolId,
    /// Case- and diacritic-insensitive substring matches.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Regex patterns, evaluated against the folded (lowercased) message.
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Fallback intent classifier endpoint (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassifierConfig {
    /// Base URL of the endpoint. Default: `https://api.openai.com`.
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,
    /// Bearer credential. When absent the classifier degrades to "no
    /// selection" on every fast-path miss rather than blocking the turn.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model to use. Default: `gpt-4o-mini`.
    #[serde(default = "default_classifier_model")]
    pub model: String,
    /// Sampling temperature. Default: `0.0` for deterministic selection.
    #[serde(default)]
    pub temperature: f64,
    /// Hard timeout for the single classification call, in milliseconds.
    /// Default: `5000`. Timeouts degrade to the empty selection; no retries.
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: default_classifier_base_url(),
            api_key: None,
            model: default_classifier_model(),
            temperature: 0.0,
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

/// Tool policy snapshot cache.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyCacheConfig {
    /// How long a policy snapshot stays fresh, in seconds. Default: `300`.
    #[serde(default = "default_policy_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for PolicyCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_policy_ttl_secs(),
        }
    }
}

/// Selection trace storage policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    /// No trace output.
    #[default]
    None,
    /// Keep only the most recent `max_entries` events.
    Rolling,
    /// Append without bound.
    Full,
}

/// Selection trace output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ObservabilityConfig {
    /// Storage mode for the JSONL selection trace. Default: `none`.
    #[serde(default)]
    pub trace: TraceMode,
    /// Maximum entries kept in `rolling` mode. Default: `500`.
    #[serde(default = "default_trace_max_entries")]
    pub max_entries: usize,
    /// Trace file path. Default: `state/selection-trace.jsonl` next to the
    /// config file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            trace: TraceMode::None,
            max_entries: default_trace_max_entries(),
            path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_classifier_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_classifier_timeout_ms() -> u64 {
    5000
}

fn default_policy_ttl_secs() -> u64 {
    300
}

fn default_trace_max_entries() -> usize {
    500
}
