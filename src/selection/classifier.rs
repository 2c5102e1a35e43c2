//! Fallback intent classification.
//!
//! Invoked only when the deterministic fast path finds nothing. One bounded
//! completion call against a prompt constrained to the candidate pool; the
//! reply is parsed as a JSON array of tool names. Every failure mode
//! (timeout, transport error, unparsable output) degrades to the empty
//! selection so the chat turn itself is never blocked. No retries.

use crate::catalog::ToolId;
use crate::config::ClassifierConfig;
use crate::providers::{CompletionClient, CompletionRequest};
use crate::selection::ChatTurn;
use crate::util::truncate_with_ellipsis;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

/// Most recent turns included in the prompt, newest last.
const HISTORY_WINDOW: usize = 6;
/// Per-turn character budget inside the prompt.
const HISTORY_TURN_CHARS: usize = 300;

pub struct IntentClassifier {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(client: Arc<dyn CompletionClient>, config: &ClassifierConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Select tools for `message` out of `pool`. Never errors; an empty set
    /// is the degraded (and valid) outcome for every failure mode.
    ///
    /// Dropping the returned future cancels the in-flight call, so an
    /// aborted request does not leave a classification running.
    pub async fn classify(
        &self,
        message: &str,
        history: &[ChatTurn],
        pool: &BTreeSet<ToolId>,
    ) -> BTreeSet<ToolId> {
        if pool.is_empty() {
            return BTreeSet::new();
        }

        let system = build_system_prompt(pool);
        let user = build_user_prompt(message, history);
        let request = CompletionRequest {
            system: &system,
            user: &user,
            model: &self.model,
            temperature: self.temperature,
        };

        let reply = match tokio::time::timeout(self.timeout, self.client.complete(request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(error)) => {
                tracing::warn!(error = %error, "tool classification call failed; selecting nothing");
                return BTreeSet::new();
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "tool classification timed out; selecting nothing"
                );
                return BTreeSet::new();
            }
        };

        parse_tool_names(&reply, pool)
    }
}

fn build_system_prompt(pool: &BTreeSet<ToolId>) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You decide which tools an assistant needs for its next reply.\n\
         Available tools:\n",
    );
    for tool in pool {
        let _ = writeln!(prompt, "- {}: {}", tool, tool.purpose());
    }
    prompt.push_str(
        "\nReply with ONLY a JSON array of tool names from the list above, \
         for example [\"web_search\"]. Reply [] when no tool is needed.",
    );
    prompt
}

fn build_user_prompt(message: &str, history: &[ChatTurn]) -> String {
    let mut prompt = String::new();
    let recent = history.len().saturating_sub(HISTORY_WINDOW);
    for turn in &history[recent..] {
        let _ = writeln!(
            prompt,
            "{}: {}",
            turn.role,
            truncate_with_ellipsis(&turn.content, HISTORY_TURN_CHARS)
        );
    }
    if !prompt.is_empty() {
        prompt.push('\n');
    }
    let _ = write!(prompt, "Current message: {message}");
    prompt
}

/// Pull a JSON array of names out of `reply` (bare or fenced) and keep the
/// ones that are real catalog tools inside the candidate pool. Hallucinated
/// or out-of-pool names are discarded, not errors.
fn parse_tool_names(reply: &str, pool: &BTreeSet<ToolId>) -> BTreeSet<ToolId> {
    let Some(names) = extract_name_array(reply) else {
        tracing::warn!(
            reply = %truncate_with_ellipsis(reply, 120),
            "unparsable classification reply; selecting nothing"
        );
        return BTreeSet::new();
    };

    let mut selected = BTreeSet::new();
    for name in names {
        match ToolId::parse(&name) {
            Some(tool) if pool.contains(&tool) => {
                selected.insert(tool);
            }
            Some(tool) => {
                tracing::debug!(tool = %tool, "classifier chose a tool outside the candidate pool; dropped");
            }
            None => {
                tracing::debug!(name = %name, "classifier invented an unknown tool name; dropped");
            }
        }
    }
    selected
}

fn extract_name_array(reply: &str) -> Option<Vec<String>> {
    let trimmed = reply.trim();
    if let Ok(names) = serde_json::from_str::<Vec<String>>(trimmed) {
        return Some(names);
    }
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Vec<String>>(&trimmed[start..=end]).ok()
}
