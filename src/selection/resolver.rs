//! Agent resolution.
//!
//! Normalizes the three ways a turn can reference an agent (an inline
//! record, an agent id, or a conversation bound to an agent) plus the
//! no-agent ephemeral case, into one descriptor the rest of the pipeline
//! operates on. Resolution is best-effort: lookup errors are logged and
//! treated as "not resolvable", never raised.

use crate::catalog::{EphemeralToolFlags, ToolId};
use crate::selection::TurnRequest;
use crate::stores::{AgentRecord, AgentStore, ConversationStore};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Where a descriptor came from; the reconciler dispatches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSource {
    /// Loaded from a persisted agent record.
    Persisted,
    /// Synthesized for a transient, caller-configured turn.
    Ephemeral,
}

/// The normalized view of the active agent for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub id: String,
    pub display_name: String,
    /// Whether automatic per-turn selection applies. Forced true for
    /// ephemeral descriptors.
    pub auto_select_enabled: bool,
    /// The candidate pool selection chooses from.
    pub tool_pool: BTreeSet<ToolId>,
    /// The agent's materialized tool list before selection runs.
    pub current_tools: BTreeSet<ToolId>,
    pub source: DescriptorSource,
}

impl AgentDescriptor {
    /// Descriptor for a persisted agent. The pool prefers the explicit
    /// `available_tools` list over the static `tools` list; unknown tool
    /// names are dropped, mirroring the classifier's name defense.
    pub fn from_record(record: &AgentRecord) -> Self {
        let pool_names = record
            .available_tools
            .as_deref()
            .unwrap_or(&record.tools);

        Self {
            id: record.id.clone(),
            display_name: record.name.clone(),
            auto_select_enabled: record.auto_select_tools,
            tool_pool: parse_tool_names(&record.id, pool_names),
            current_tools: parse_tool_names(&record.id, &record.tools),
            source: DescriptorSource::Persisted,
        }
    }

    /// Virtual descriptor for an ephemeral turn.
    ///
    /// The pool is the full platform catalog regardless of which flags the
    /// caller toggled: ephemeral mode means "let the system choose", so the
    /// requested flags are a hint, not a ceiling. Selection is always on.
    pub fn virtual_from_flags(flags: &EphemeralToolFlags) -> Self {
        Self {
            id: "ephemeral".to_string(),
            display_name: "Ephemeral agent".to_string(),
            auto_select_enabled: true,
            tool_pool: ToolId::catalog_set(),
            current_tools: flags.enabled_tools(),
            source: DescriptorSource::Ephemeral,
        }
    }
}

fn parse_tool_names(agent_id: &str, names: &[String]) -> BTreeSet<ToolId> {
    let mut parsed = BTreeSet::new();
    for name in names {
        match ToolId::parse(name) {
            Some(tool) => {
                parsed.insert(tool);
            }
            None => {
                tracing::debug!(agent = %agent_id, name = %name, "dropping unknown tool name from agent record");
            }
        }
    }
    parsed
}

pub struct AgentResolver {
    agents: Arc<dyn AgentStore>,
    conversations: Arc<dyn ConversationStore>,
}

impl AgentResolver {
    pub fn new(agents: Arc<dyn AgentStore>, conversations: Arc<dyn ConversationStore>) -> Self {
        Self {
            agents,
            conversations,
        }
    }

    /// Resolve the turn's agent descriptor. Resolution order, first match
    /// wins:
    ///
    /// 1. an inline agent record on the request (already materialized),
    /// 2. an explicit agent id, looked up,
    /// 3. no id: the conversation's bound agent, unless the caller asked
    ///    for ephemeral mode,
    /// 4. caller-declared ephemeral flags, as a virtual descriptor,
    /// 5. none of the above: `None` and the turn proceeds unfiltered.
    pub async fn resolve(&self, request: &TurnRequest) -> Option<AgentDescriptor> {
        if let Some(record) = &request.agent {
            return Some(AgentDescriptor::from_record(record));
        }

        if let Some(agent_id) = request.agent_id.as_deref() {
            if let Some(descriptor) = self.descriptor_by_id(agent_id).await {
                return Some(descriptor);
            }
        } else if request.ephemeral.is_none() {
            if let Some(conversation_id) = request.conversation_id.as_deref() {
                if let Some(agent_id) = self.bound_agent_id(conversation_id).await {
                    if let Some(descriptor) = self.descriptor_by_id(&agent_id).await {
                        return Some(descriptor);
                    }
                }
            }
        }

        if let Some(flags) = &request.ephemeral {
            return Some(AgentDescriptor::virtual_from_flags(flags));
        }

        None
    }

    async fn descriptor_by_id(&self, agent_id: &str) -> Option<AgentDescriptor> {
        match self.agents.agent_by_id(agent_id).await {
            Ok(Some(record)) => Some(AgentDescriptor::from_record(&record)),
            Ok(None) => {
                tracing::debug!(agent = %agent_id, "agent not found");
                None
            }
            Err(error) => {
                tracing::debug!(agent = %agent_id, error = %error, "agent lookup failed; treating as not resolvable");
                None
            }
        }
    }

    async fn bound_agent_id(&self, conversation_id: &str) -> Option<String> {
        match self.conversations.conversation_by_id(conversation_id).await {
            Ok(Some(conversation)) => conversation.agent_id,
            Ok(None) => {
                tracing::debug!(conversation = %conversation_id, "conversation not found");
                None
            }
            Err(error) => {
                tracing::debug!(conversation = %conversation_id, error = %error, "conversation lookup failed; treating as not resolvable");
                None
            }
        }
    }
}
