//! In-memory store doubles.
//!
//! Back the CLI's `select` and `policy` commands and the test suite. Fixtures
//! load from a TOML file with `[[agents]]`, `[[conversations]]`, and
//! `[[policies]]` tables.

use super::{AgentRecord, AgentStore, ConversationRecord, ConversationStore, PolicyStore, ToolPolicy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct InMemoryAgentStore {
    agents: HashMap<String, AgentRecord>,
}

impl InMemoryAgentStore {
    pub fn new(agents: impl IntoIterator<Item = AgentRecord>) -> Self {
        Self {
            agents: agents
                .into_iter()
                .map(|a| (a.id.clone(), a))
                .collect(),
        }
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn agent_by_id(&self, id: &str) -> Result<Option<AgentRecord>> {
        Ok(self.agents.get(id).cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationStore {
    conversations: HashMap<String, ConversationRecord>,
}

impl InMemoryConversationStore {
    pub fn new(conversations: impl IntoIterator<Item = ConversationRecord>) -> Self {
        Self {
            conversations: conversations
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn conversation_by_id(&self, id: &str) -> Result<Option<ConversationRecord>> {
        Ok(self.conversations.get(id).cloned())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyStore {
    policies: Vec<ToolPolicy>,
}

impl InMemoryPolicyStore {
    pub fn new(policies: Vec<ToolPolicy>) -> Self {
        Self { policies }
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn list_policies(&self) -> Result<Vec<ToolPolicy>> {
        Ok(self.policies.clone())
    }
}

/// TOML fixture bundling all three stores, for CLI dry-runs and tests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreFixture {
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
    #[serde(default)]
    pub conversations: Vec<ConversationRecord>,
    #[serde(default)]
    pub policies: Vec<ToolPolicy>,
}

impl StoreFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing fixture {}", path.display()))
    }

    pub fn into_stores(
        self,
    ) -> (
        InMemoryAgentStore,
        InMemoryConversationStore,
        InMemoryPolicyStore,
    ) {
        (
            InMemoryAgentStore::new(self.agents),
            InMemoryConversationStore::new(self.conversations),
            InMemoryPolicyStore::new(self.policies),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Role, ToolId};

    #[tokio::test]
    async fn agent_store_round_trip() {
        let store = InMemoryAgentStore::new([AgentRecord {
            id: "agent-1".into(),
            name: "Helper".into(),
            tools: vec!["web_search".into()],
            ..Default::default()
        }]);

        let found = store.agent_by_id("agent-1").await.unwrap();
        assert_eq!(found.unwrap().name, "Helper");
        assert!(store.agent_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conversation_store_exposes_bound_agent() {
        let store = InMemoryConversationStore::new([ConversationRecord {
            id: "conv-1".into(),
            agent_id: Some("agent-1".into()),
        }]);

        let conv = store.conversation_by_id("conv-1").await.unwrap().unwrap();
        assert_eq!(conv.agent_id.as_deref(), Some("agent-1"));
    }

    #[test]
    fn fixture_parses_all_tables() {
        let fixture: StoreFixture = toml::from_str(
            r#"
            [[agents]]
            id = "a1"
            name = "Research"
            tools = ["web_search", "file_search"]
            auto_select_tools = true

            [[conversations]]
            id = "c1"
            agent_id = "a1"

            [[policies]]
            tool = "image_generation"
            enabled = true
            allowed_roles = ["USER", "ADMIN"]
            order = 2
            "#,
        )
        .unwrap();

        assert_eq!(fixture.agents.len(), 1);
        assert_eq!(fixture.conversations.len(), 1);
        assert_eq!(fixture.policies[0].tool, ToolId::ImageGeneration);
        assert_eq!(fixture.policies[0].allowed_roles, vec![Role::User, Role::Admin]);
    }
}
