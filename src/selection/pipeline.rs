//! The per-turn selection pipeline.
//!
//! Composes resolution, policy gating, fast matching, fallback
//! classification, and reconciliation for one request:
//!
//! ```text
//! Start -> Resolved -> PolicyChecked -> FastMatched -> (ClassifierInvoked?)
//!       -> Reconciled -> Done
//! ```
//!
//! Selection is a best-effort optimization layered in front of the chat
//! completion call. Every failure mode fails open: the worst outcome of any
//! error is a broader, unfiltered tool set for the turn, never a blocked
//! turn. The full failure-to-fallback table lives in [`UnfilteredReason`]
//! and the stage-local degradations (classifier -> empty set, policy cache
//! miss -> pool passes ungated).

use crate::config::Config;
use crate::observability::SelectionTrace;
use crate::providers::CompletionClient;
use crate::selection::classifier::IntentClassifier;
use crate::selection::gate;
use crate::selection::matcher::{DetectionResult, FastMatcher};
use crate::selection::reconcile::{reconcile, RequestToolState, ToolView};
use crate::selection::resolver::AgentResolver;
use crate::selection::TurnRequest;
use crate::stores::{AgentStore, CachedPolicyStore, ConversationStore, PolicyStore};
use crate::util::truncate_with_ellipsis;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Why a turn proceeded without tool filtering.
///
/// This is the consolidated fail-open table: every way the pipeline can
/// decline or fail maps to exactly one variant here, so fallback behavior is
/// declared once instead of re-decided at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum UnfilteredReason {
    /// No agent, conversation binding, or ephemeral context was found.
    #[error("no agent context resolvable")]
    NoAgentContext,
    /// Selection is switched off, globally or for the resolved agent.
    #[error("automatic selection disabled")]
    SelectionDisabled,
    /// The turn carries no text to match against.
    #[error("empty or non-text message")]
    EmptyMessage,
    /// Policy filtering left no candidate tools.
    #[error("no tools allowed for this role")]
    EmptyAllowedPool,
    /// Something inside the pipeline panicked or failed unexpectedly.
    #[error("internal selection failure")]
    StageFailure,
}

/// Result of running the pipeline for one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// The turn proceeds with its tool configuration untouched.
    Unfiltered { reason: UnfilteredReason },
    /// Selection ran; this is the single merge point for every rewrite the
    /// downstream completion step applies to the outgoing request.
    Filtered {
        view: ToolView,
        state: RequestToolState,
    },
}

impl fmt::Display for SelectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfiltered { reason } => write!(f, "unfiltered ({reason})"),
            Self::Filtered { state, .. } => {
                let tools: Vec<&str> = state.final_tools.iter().map(|t| t.as_str()).collect();
                write!(f, "filtered to [{}]", tools.join(", "))
            }
        }
    }
}

pub struct SelectionPipeline {
    enabled: bool,
    resolver: AgentResolver,
    policies: CachedPolicyStore,
    matcher: FastMatcher,
    classifier: IntentClassifier,
    trace: Arc<SelectionTrace>,
}

impl SelectionPipeline {
    /// All collaborators are injected here; nothing is resolved at call
    /// time, so tests and the CLI substitute doubles freely.
    pub fn new(
        agents: Arc<dyn AgentStore>,
        conversations: Arc<dyn ConversationStore>,
        policies: Arc<dyn PolicyStore>,
        classifier_client: Arc<dyn CompletionClient>,
        config: &Config,
    ) -> Self {
        Self {
            enabled: config.selection.enabled,
            resolver: AgentResolver::new(agents, conversations),
            policies: CachedPolicyStore::new(policies, Duration::from_secs(config.policy.ttl_secs)),
            matcher: FastMatcher::with_rules(&config.selection.rules),
            classifier: IntentClassifier::new(classifier_client, &config.classifier),
            trace: Arc::new(SelectionTrace::disabled()),
        }
    }

    pub fn with_trace(mut self, trace: Arc<SelectionTrace>) -> Self {
        self.trace = trace;
        self
    }

    /// Run selection for one turn. Never errors and never panics outward;
    /// a panic anywhere inside degrades to an unfiltered turn.
    pub async fn run(&self, request: &TurnRequest) -> SelectionOutcome {
        match std::panic::AssertUnwindSafe(self.run_stages(request))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("selection pipeline panicked; passing the turn through unfiltered");
                self.unfiltered(UnfilteredReason::StageFailure)
            }
        }
    }

    async fn run_stages(&self, request: &TurnRequest) -> SelectionOutcome {
        // Start -> Resolved
        if !self.enabled {
            return self.unfiltered(UnfilteredReason::SelectionDisabled);
        }
        let Some(descriptor) = self.resolver.resolve(request).await else {
            return self.unfiltered(UnfilteredReason::NoAgentContext);
        };
        if !descriptor.auto_select_enabled {
            return self.unfiltered(UnfilteredReason::SelectionDisabled);
        }
        if request.message.trim().is_empty() {
            return self.unfiltered(UnfilteredReason::EmptyMessage);
        }
        self.trace.record(
            "resolved",
            Some(true),
            Some(descriptor.id.clone()),
            json!({ "pool": descriptor.tool_pool.len() }),
        );

        // Resolved -> PolicyChecked. An unreachable policy store fails open:
        // the whole pool passes ungated rather than blocking the turn.
        let allowed = match self.policies.snapshot().await {
            Some(snapshot) => gate::filter_pool(&snapshot, &descriptor.tool_pool, request.role),
            None => descriptor.tool_pool.clone(),
        };
        if allowed.is_empty() {
            return self.unfiltered(UnfilteredReason::EmptyAllowedPool);
        }

        // PolicyChecked -> FastMatched
        let detection = self.matcher.quick_match(&request.message, &allowed);
        self.trace.record(
            "fast_match",
            Some(detection.matched_by_fast_path),
            Some(truncate_with_ellipsis(&request.message, 120)),
            json!({ "tools": &detection.selected }),
        );

        // FastMatched -> ClassifierInvoked, only on a miss. The classifier
        // degrades to the empty set on its own; an empty selection is a
        // valid (if toolless) turn, not a failure.
        let detection = if detection.matched_by_fast_path {
            detection
        } else {
            let selected = self
                .classifier
                .classify(&request.message, &request.history, &allowed)
                .await;
            self.trace
                .record("classifier", Some(true), None, json!({ "tools": &selected }));
            DetectionResult {
                matched_by_fast_path: false,
                selected,
            }
        };

        // -> Reconciled -> Done
        let (view, state) = reconcile(&descriptor, &detection, request);
        tracing::debug!(
            agent = %descriptor.id,
            fast_path = detection.matched_by_fast_path,
            final_tools = ?state.final_tools,
            "tool selection reconciled"
        );
        self.trace.record(
            "reconciled",
            Some(true),
            None,
            json!({ "final_tools": &state.final_tools, "fast_path": detection.matched_by_fast_path }),
        );

        SelectionOutcome::Filtered { view, state }
    }

    fn unfiltered(&self, reason: UnfilteredReason) -> SelectionOutcome {
        tracing::debug!(%reason, "turn passes through unfiltered");
        self.trace
            .record("unfiltered", Some(false), Some(reason.to_string()), json!({}));
        SelectionOutcome::Unfiltered { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Role;
    use crate::providers::CompletionRequest;
    use crate::stores::{InMemoryAgentStore, InMemoryConversationStore, InMemoryPolicyStore};
    use async_trait::async_trait;

    struct NeverClient;

    #[async_trait]
    impl CompletionClient for NeverClient {
        async fn complete(&self, _request: CompletionRequest<'_>) -> anyhow::Result<String> {
            panic!("classifier must not be reached in these tests");
        }
    }

    fn pipeline(config: &Config) -> SelectionPipeline {
        SelectionPipeline::new(
            Arc::new(InMemoryAgentStore::default()),
            Arc::new(InMemoryConversationStore::default()),
            Arc::new(InMemoryPolicyStore::default()),
            Arc::new(NeverClient),
            config,
        )
    }

    #[tokio::test]
    async fn disabled_selection_passes_through() {
        let mut config = Config::default();
        config.selection.enabled = false;
        let pipeline = pipeline(&config);

        let request = TurnRequest::text("draw a cat", Role::User);
        let outcome = pipeline.run(&request).await;

        assert_eq!(
            outcome,
            SelectionOutcome::Unfiltered {
                reason: UnfilteredReason::SelectionDisabled
            }
        );
    }

    #[tokio::test]
    async fn no_agent_context_passes_through() {
        let pipeline = pipeline(&Config::default());
        let request = TurnRequest::text("draw a cat", Role::User);

        let outcome = pipeline.run(&request).await;
        assert_eq!(
            outcome,
            SelectionOutcome::Unfiltered {
                reason: UnfilteredReason::NoAgentContext
            }
        );
    }

    #[tokio::test]
    async fn empty_message_passes_through() {
        let pipeline = pipeline(&Config::default());
        let mut request = TurnRequest::text("   ", Role::User);
        request.ephemeral = Some(Default::default());

        let outcome = pipeline.run(&request).await;
        assert_eq!(
            outcome,
            SelectionOutcome::Unfiltered {
                reason: UnfilteredReason::EmptyMessage
            }
        );
    }

    #[test]
    fn outcome_display_is_compact() {
        let outcome = SelectionOutcome::Unfiltered {
            reason: UnfilteredReason::EmptyMessage,
        };
        assert_eq!(outcome.to_string(), "unfiltered (empty or non-text message)");
    }
}
