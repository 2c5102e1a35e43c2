//! Collaborator interfaces.
//!
//! The selection pipeline never owns agents, conversations, or tool policy;
//! it reads them through the narrow traits below, injected at construction so
//! tests and the CLI can substitute doubles. All traits are read-only from
//! this crate's perspective.

pub mod cache;
pub mod memory;

pub use cache::CachedPolicyStore;
pub use memory::{InMemoryAgentStore, InMemoryConversationStore, InMemoryPolicyStore, StoreFixture};

use crate::catalog::{Role, ToolId};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A persisted agent as the agent service stores it.
///
/// Tool lists are raw wire names here; unknown names are dropped when the
/// pipeline builds its descriptor, not at deserialization time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    /// Static tool list configured when the agent was created.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Explicit selection pool; takes priority over `tools` when present.
    #[serde(default)]
    pub available_tools: Option<Vec<String>>,
    /// Whether this agent opted into automatic per-turn tool selection.
    #[serde(default)]
    pub auto_select_tools: bool,
}

/// The slice of a conversation the pipeline needs: which agent it is bound to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConversationRecord {
    pub id: String,
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// One administrator-owned availability record for a tool.
///
/// A tool with no record is available to every role: a missing row must never
/// silently disable functionality.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolPolicy {
    pub tool: ToolId,
    pub enabled: bool,
    #[serde(default)]
    pub allowed_roles: Vec<Role>,
    /// Display ordering in the administrator UI; carried for consumers.
    #[serde(default)]
    pub order: i32,
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn agent_by_id(&self, id: &str) -> anyhow::Result<Option<AgentRecord>>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn conversation_by_id(&self, id: &str) -> anyhow::Result<Option<ConversationRecord>>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn list_policies(&self) -> anyhow::Result<Vec<ToolPolicy>>;
}
