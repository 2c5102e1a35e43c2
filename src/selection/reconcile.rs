//! Reconciliation: writing the selected tool set back into the turn's tool
//! representation.
//!
//! Persisted agents and ephemeral turns keep two divergent representations
//! of "enabled tools": a named agent's tool list vs. a flag-per-tool map.
//! This module produces the rewritten view for whichever one applies, plus
//! the selection metadata downstream consumers read for telemetry. Nothing
//! here mutates stored records; every output is a fresh value.

use crate::catalog::{EphemeralToolFlags, ToolId};
use crate::selection::matcher::DetectionResult;
use crate::selection::resolver::{AgentDescriptor, DescriptorSource};
use crate::selection::TurnRequest;
use serde::Serialize;
use std::collections::BTreeSet;

/// Selection metadata attached to the in-flight request for downstream
/// consumers (logging and telemetry only). Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestToolState {
    pub auto_filter_applied: bool,
    pub original_pool: BTreeSet<ToolId>,
    pub final_tools: BTreeSet<ToolId>,
}

/// The rewritten agent view for a persisted-agent turn. Everything except
/// the tool list is carried over from the descriptor untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentView {
    pub id: String,
    pub display_name: String,
    pub tools: BTreeSet<ToolId>,
}

/// What the downstream chat-completion step should use for this turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolView {
    /// Persisted-agent turn: the agent with its tool list rewritten.
    Agent(AgentView),
    /// Ephemeral turn: the rebuilt per-tool flag map.
    Ephemeral(EphemeralToolFlags),
}

/// Fold the detection outcome into the turn's tool representation.
///
/// An empty selection is a valid, degraded outcome (the agent simply
/// proceeds with no tools), not an error.
pub fn reconcile(
    descriptor: &AgentDescriptor,
    detection: &DetectionResult,
    request: &TurnRequest,
) -> (ToolView, RequestToolState) {
    let final_tools = detection.selected.clone();

    let view = match descriptor.source {
        DescriptorSource::Persisted => ToolView::Agent(AgentView {
            id: descriptor.id.clone(),
            display_name: descriptor.display_name.clone(),
            tools: final_tools.clone(),
        }),
        DescriptorSource::Ephemeral => {
            ToolView::Ephemeral(rebuild_flags(request.ephemeral.as_ref(), &final_tools))
        }
    };

    let state = RequestToolState {
        auto_filter_applied: true,
        original_pool: descriptor.tool_pool.clone(),
        final_tools,
    };

    (view, state)
}

/// Reset-then-set: every catalog flag starts `false`, then exactly the
/// selected tools are set `true`. A stale `true` from a prior request shape
/// can never leak through. Non-tool flags are carried over unchanged.
fn rebuild_flags(
    original: Option<&EphemeralToolFlags>,
    final_tools: &BTreeSet<ToolId>,
) -> EphemeralToolFlags {
    let mut flags = EphemeralToolFlags::default();
    for tool in ToolId::catalog() {
        flags.tools.insert(*tool, final_tools.contains(tool));
    }
    if let Some(original) = original {
        flags.artifacts = original.artifacts.clone();
        flags.mcp_servers = original.mcp_servers.clone();
        flags.extra = original.extra.clone();
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Role;
    use crate::selection::resolver::AgentDescriptor;
    use crate::stores::AgentRecord;

    fn persisted_descriptor() -> AgentDescriptor {
        AgentDescriptor::from_record(&AgentRecord {
            id: "agent-1".into(),
            name: "Research".into(),
            tools: vec!["web_search".into(), "file_search".into()],
            available_tools: None,
            auto_select_tools: true,
        })
    }

    fn detection(selected: &[ToolId]) -> DetectionResult {
        DetectionResult {
            matched_by_fast_path: true,
            selected: selected.iter().copied().collect(),
        }
    }

    #[test]
    fn persisted_agent_gets_a_rewritten_tool_list() {
        let descriptor = persisted_descriptor();
        let request = TurnRequest::text("search for this", Role::User);

        let (view, state) = reconcile(&descriptor, &detection(&[ToolId::WebSearch]), &request);

        match view {
            ToolView::Agent(agent) => {
                assert_eq!(agent.id, "agent-1");
                assert_eq!(agent.display_name, "Research");
                assert_eq!(
                    agent.tools.into_iter().collect::<Vec<_>>(),
                    vec![ToolId::WebSearch]
                );
            }
            ToolView::Ephemeral(_) => panic!("expected an agent view"),
        }
        assert!(state.auto_filter_applied);
        assert_eq!(
            state.final_tools.into_iter().collect::<Vec<_>>(),
            vec![ToolId::WebSearch]
        );
    }

    #[test]
    fn ephemeral_rebuild_resets_every_flag_then_sets_selected() {
        let original: EphemeralToolFlags = serde_json::from_value(serde_json::json!({
            "tools": { "web_search": true, "dalle": true },
            "artifacts": "default",
            "mcp_servers": ["jira"],
            "beta_ui": true
        }))
        .unwrap();
        let descriptor = AgentDescriptor::virtual_from_flags(&original);
        let mut request = TurnRequest::text("draw a cat", Role::User);
        request.ephemeral = Some(original);

        let (view, state) = reconcile(&descriptor, &detection(&[ToolId::ImageGeneration]), &request);

        let flags = match view {
            ToolView::Ephemeral(flags) => flags,
            ToolView::Agent(_) => panic!("expected an ephemeral view"),
        };

        // Every catalog tool has an explicit flag; only the selected one is on.
        for tool in ToolId::catalog() {
            assert_eq!(
                flags.tools.get(tool),
                Some(&(*tool == ToolId::ImageGeneration)),
                "flag for {tool}"
            );
        }
        // Non-tool flags pass through unchanged.
        assert_eq!(flags.artifacts.as_deref(), Some("default"));
        assert_eq!(flags.mcp_servers, vec!["jira".to_string()]);
        assert_eq!(
            flags.extra.get("beta_ui").and_then(|v| v.as_bool()),
            Some(true)
        );
        assert_eq!(state.original_pool, ToolId::catalog_set());
    }

    #[test]
    fn empty_selection_is_a_valid_degraded_outcome() {
        let descriptor = persisted_descriptor();
        let request = TurnRequest::text("hello", Role::User);
        let empty = DetectionResult::none();

        let (view, state) = reconcile(&descriptor, &empty, &request);

        match view {
            ToolView::Agent(agent) => assert!(agent.tools.is_empty()),
            ToolView::Ephemeral(_) => panic!("expected an agent view"),
        }
        assert!(state.final_tools.is_empty());
        assert!(state.auto_filter_applied);
    }

    #[test]
    fn final_tools_stay_within_the_descriptor_pool() {
        let descriptor = persisted_descriptor();
        let request = TurnRequest::text("hello", Role::User);

        let (_, state) = reconcile(&descriptor, &detection(&[ToolId::WebSearch]), &request);
        assert!(state.final_tools.is_subset(&state.original_pool));
    }
}
