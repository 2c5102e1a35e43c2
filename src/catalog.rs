//! The platform tool catalog: the closed set of capabilities agents can
//! invoke, the requester roles the policy layer scopes them by, and the typed
//! per-request tool-flag map used for transient (ephemeral) turns.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// One invocable capability an agent may use during a turn.
///
/// The catalog is a closed enumeration: wire names outside it are dropped at
/// every boundary (agent records, classifier replies, caller flags), which is
/// what keeps every downstream tool set a subset of the catalog by
/// construction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    WebSearch,
    /// `dalle` is accepted as a legacy input alias; it is never emitted.
    #[serde(alias = "dalle")]
    ImageGeneration,
    CodeInterpreter,
    FileSearch,
    MemoryRecall,
}

impl ToolId {
    /// Canonical wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::ImageGeneration => "image_generation",
            Self::CodeInterpreter => "code_interpreter",
            Self::FileSearch => "file_search",
            Self::MemoryRecall => "memory_recall",
        }
    }

    /// Short human description, used in classifier prompts and CLI output.
    pub const fn purpose(self) -> &'static str {
        match self {
            Self::WebSearch => "search the public web for current information",
            Self::ImageGeneration => "generate or edit images from a description",
            Self::CodeInterpreter => "run code and return its output",
            Self::FileSearch => "search the user's uploaded files and documents",
            Self::MemoryRecall => "recall facts from earlier conversations",
        }
    }

    /// The full platform catalog in canonical order.
    ///
    /// Single source of truth: the virtual descriptor's pool and the
    /// reset-then-set flag rebuild both iterate exactly this slice.
    pub const fn catalog() -> &'static [ToolId] {
        &[
            Self::WebSearch,
            Self::ImageGeneration,
            Self::CodeInterpreter,
            Self::FileSearch,
            Self::MemoryRecall,
        ]
    }

    /// The catalog as a set, for use as a candidate pool.
    pub fn catalog_set() -> BTreeSet<ToolId> {
        Self::catalog().iter().copied().collect()
    }

    /// Parse a wire name. Unknown names (including hallucinated ones from the
    /// classifier) yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "web_search" => Some(Self::WebSearch),
            "image_generation" | "dalle" => Some(Self::ImageGeneration),
            "code_interpreter" => Some(Self::CodeInterpreter),
            "file_search" => Some(Self::FileSearch),
            "memory_recall" => Some(Self::MemoryRecall),
            _ => None,
        }
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown tool name: {s}"))
    }
}

/// Requester role as the platform's user service reports it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
    /// Organization-scoped administrator. See [`Role::policy_view`].
    OrgAdmin,
}

impl Role {
    /// The view used for tool-availability checks.
    ///
    /// Organization admins are folded into the ordinary user view, so the
    /// role name alone never grants tool access the administrator did not
    /// extend to users.
    pub fn policy_view(self) -> Role {
        match self {
            Self::OrgAdmin => Self::User,
            other => other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::OrgAdmin => "ORG_ADMIN",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            "ORG_ADMIN" | "ORGADMIN" => Ok(Self::OrgAdmin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

/// Per-request transient tool flags, supplied by callers that want a turn
/// with ad-hoc tools instead of a persisted agent.
///
/// Tool toggles are typed by [`ToolId`]; everything that is not a tool
/// toggle (`artifacts`, `mcp_servers`, and any other caller-supplied key in
/// `extra`) is carried through reconciliation untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EphemeralToolFlags {
    /// Requested tool toggles keyed by catalog name.
    #[serde(default)]
    pub tools: BTreeMap<ToolId, bool>,
    /// Display toggle unrelated to tool selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<String>,
    /// Attached external integrations, unrelated to tool selection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<String>,
    /// Any other caller-supplied flags, passed through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EphemeralToolFlags {
    /// The tools the caller toggled on. A weak hint only: ephemeral turns
    /// select over the full catalog, not this subset.
    pub fn enabled_tools(&self) -> BTreeSet<ToolId> {
        self.tools
            .iter()
            .filter_map(|(tool, on)| on.then_some(*tool))
            .collect()
    }
}
