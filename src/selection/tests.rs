//! Cross-stage invariant tests for the selection pipeline.

use crate::catalog::{EphemeralToolFlags, Role, ToolId};
use crate::config::Config;
use crate::providers::{CompletionClient, CompletionRequest};
use crate::selection::pipeline::{SelectionOutcome, SelectionPipeline, UnfilteredReason};
use crate::selection::reconcile::ToolView;
use crate::selection::TurnRequest;
use crate::stores::{
    AgentRecord, AgentStore, InMemoryAgentStore, InMemoryConversationStore, InMemoryPolicyStore,
    ToolPolicy,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scripted completion client that counts invocations.
struct CountingClient {
    calls: AtomicUsize,
    reply: String,
}

impl CountingClient {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: reply.to_string(),
        })
    }
}

#[async_trait]
impl CompletionClient for CountingClient {
    async fn complete(&self, _request: CompletionRequest<'_>) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

fn research_agent() -> AgentRecord {
    AgentRecord {
        id: "agent-1".into(),
        name: "Research".into(),
        tools: vec!["web_search".into(), "image_generation".into()],
        available_tools: None,
        auto_select_tools: true,
    }
}

fn pipeline_with(
    agents: Vec<AgentRecord>,
    policies: Vec<ToolPolicy>,
    client: Arc<dyn CompletionClient>,
) -> SelectionPipeline {
    SelectionPipeline::new(
        Arc::new(InMemoryAgentStore::new(agents)),
        Arc::new(InMemoryConversationStore::default()),
        Arc::new(InMemoryPolicyStore::new(policies)),
        client,
        &Config::default(),
    )
}

fn agent_request(message: &str) -> TurnRequest {
    let mut request = TurnRequest::text(message, Role::User);
    request.agent_id = Some("agent-1".into());
    request
}

fn final_tools(outcome: &SelectionOutcome) -> Vec<ToolId> {
    match outcome {
        SelectionOutcome::Filtered { state, .. } => state.final_tools.iter().copied().collect(),
        SelectionOutcome::Unfiltered { reason } => panic!("expected a filtered outcome, got {reason}"),
    }
}

#[tokio::test]
async fn final_tools_stay_inside_the_agent_pool() {
    // The classifier votes for a tool the agent does not have; it must be
    // dropped because the candidate pool it chooses from is the agent's.
    let client = CountingClient::new(r#"["code_interpreter", "web_search"]"#);
    let pipeline = pipeline_with(vec![research_agent()], vec![], client);

    let outcome = pipeline.run(&agent_request("something ambiguous")).await;
    assert_eq!(final_tools(&outcome), vec![ToolId::WebSearch]);
}

#[tokio::test]
async fn policy_gate_is_never_bypassed() {
    // web_search is restricted to admins; a user turn must not get it even
    // though both the fast path and the classifier would pick it.
    let client = CountingClient::new(r#"["web_search"]"#);
    let policies = vec![ToolPolicy {
        tool: ToolId::WebSearch,
        enabled: true,
        allowed_roles: vec![Role::Admin],
        order: 0,
    }];
    let pipeline = pipeline_with(vec![research_agent()], policies, client);

    let outcome = pipeline.run(&agent_request("search the web for rust news")).await;
    assert!(!final_tools(&outcome).contains(&ToolId::WebSearch));
}

#[tokio::test]
async fn fast_path_hit_suppresses_the_classifier() {
    let client = CountingClient::new(r#"["web_search"]"#);
    let pipeline = pipeline_with(vec![research_agent()], vec![], client.clone());

    let outcome = pipeline.run(&agent_request("draw a lighthouse at dusk")).await;

    assert_eq!(final_tools(&outcome), vec![ToolId::ImageGeneration]);
    assert_eq!(client.calls.load(Ordering::SeqCst), 0, "classifier must not run");
}

#[tokio::test]
async fn fast_path_miss_invokes_the_classifier_once() {
    let client = CountingClient::new(r#"["web_search"]"#);
    let pipeline = pipeline_with(vec![research_agent()], vec![], client.clone());

    let outcome = pipeline.run(&agent_request("hmm, curious about this")).await;

    assert_eq!(final_tools(&outcome), vec![ToolId::WebSearch]);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ephemeral_flags_are_rebuilt_exactly() {
    let client = CountingClient::new("[]");
    let pipeline = pipeline_with(vec![], vec![], client);

    let mut request = TurnRequest::text("draw a cat on a windowsill", Role::User);
    request.ephemeral = Some(
        serde_json::from_value(serde_json::json!({
            "tools": { "web_search": true, "dalle": true },
            "artifacts": "default"
        }))
        .unwrap(),
    );

    let outcome = pipeline.run(&request).await;
    let flags = match outcome {
        SelectionOutcome::Filtered {
            view: ToolView::Ephemeral(flags),
            ..
        } => flags,
        other => panic!("expected an ephemeral view, got {other:?}"),
    };

    // Flag is true iff the tool was selected; everything else is false.
    for tool in ToolId::catalog() {
        assert_eq!(
            flags.tools.get(tool),
            Some(&(*tool == ToolId::ImageGeneration)),
            "flag for {tool}"
        );
    }
    // Non-tool input flags survive untouched.
    assert_eq!(flags.artifacts.as_deref(), Some("default"));
}

#[tokio::test]
async fn identical_input_yields_identical_selection() {
    let client = CountingClient::new(r#"["web_search"]"#);
    let pipeline = pipeline_with(vec![research_agent()], vec![], client);

    let request = agent_request("tell me something that needs looking into");
    let first = pipeline.run(&request).await;
    let second = pipeline.run(&request).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_gated_pool_passes_the_turn_through() {
    // Every tool in the agent's pool is disabled by policy.
    let client = CountingClient::new("[]");
    let policies = ToolId::catalog()
        .iter()
        .map(|tool| ToolPolicy {
            tool: *tool,
            enabled: false,
            allowed_roles: vec![Role::User, Role::Admin],
            order: 0,
        })
        .collect();
    let pipeline = pipeline_with(vec![research_agent()], policies, client);

    let outcome = pipeline.run(&agent_request("draw a cat")).await;
    assert_eq!(
        outcome,
        SelectionOutcome::Unfiltered {
            reason: UnfilteredReason::EmptyAllowedPool
        }
    );
}

#[tokio::test]
async fn agent_without_auto_select_passes_through() {
    let mut record = research_agent();
    record.auto_select_tools = false;
    let client = CountingClient::new("[]");
    let pipeline = pipeline_with(vec![record], vec![], client);

    let outcome = pipeline.run(&agent_request("draw a cat")).await;
    assert_eq!(
        outcome,
        SelectionOutcome::Unfiltered {
            reason: UnfilteredReason::SelectionDisabled
        }
    );
}

/// Store that errors on every lookup, for the fail-open path.
struct UnreachableAgentStore;

#[async_trait]
impl AgentStore for UnreachableAgentStore {
    async fn agent_by_id(&self, _id: &str) -> anyhow::Result<Option<AgentRecord>> {
        anyhow::bail!("agent store unreachable")
    }
}

#[tokio::test]
async fn agent_store_failure_fails_open() {
    let client = CountingClient::new("[]");
    let pipeline = SelectionPipeline::new(
        Arc::new(UnreachableAgentStore),
        Arc::new(InMemoryConversationStore::default()),
        Arc::new(InMemoryPolicyStore::default()),
        client,
        &Config::default(),
    );

    let outcome = pipeline.run(&agent_request("draw a cat")).await;
    assert_eq!(
        outcome,
        SelectionOutcome::Unfiltered {
            reason: UnfilteredReason::NoAgentContext
        }
    );
}
