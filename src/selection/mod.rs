//! Per-turn automatic tool selection.
//!
//! The five stages live in their own submodules; [`pipeline`] composes them.
//! This module holds the request-scoped input types shared across stages.

pub mod classifier;
pub mod gate;
pub mod matcher;
pub mod pipeline;
pub mod reconcile;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use classifier::IntentClassifier;
pub use gate::PolicySnapshot;
pub use matcher::{DetectionResult, FastMatcher};
pub use pipeline::{SelectionOutcome, SelectionPipeline, UnfilteredReason};
pub use reconcile::{AgentView, RequestToolState, ToolView};
pub use resolver::{AgentDescriptor, AgentResolver, DescriptorSource};

use crate::catalog::{EphemeralToolFlags, Role};
use crate::stores::AgentRecord;
use serde::{Deserialize, Serialize};

/// One prior message, included in the classifier prompt for context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// One inbound chat turn as the pipeline sees it.
///
/// This is a request-scoped value: built per request, moved through the
/// stages by reference, never shared across requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Raw message text; empty for non-text turns.
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub role: Role,
    /// Inline, already-materialized agent record (skips lookup).
    #[serde(default)]
    pub agent: Option<AgentRecord>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Present when the caller wants a transient, ad-hoc tool turn.
    #[serde(default)]
    pub ephemeral: Option<EphemeralToolFlags>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

impl TurnRequest {
    /// A plain text turn with no agent reference.
    pub fn text(message: impl Into<String>, role: Role) -> Self {
        Self {
            message: message.into(),
            role,
            ..Default::default()
        }
    }
}
