//! The assistant: a backend that answers a chat turn, and a client that runs the
//! turn on the tokio runtime and reports progress to the UI over the event channel.

pub mod plan;
pub mod scripted;
pub mod types;

use crate::event::AppEvent;
use crate::runtime::ingest::strip_code_fence;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use tokio::runtime::Handle;
use types::{AgentAction, AgentResponse, ChatMessage};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent reply is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("agent reply was malformed: {0}")]
    Malformed(&'static str),
    #[error("failed to read agent replay file {path}: {source}")]
    ReplayFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no recorded agent replies left")]
    ReplayExhausted,
    #[error("tokio runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

/// Produces the reply for the latest user message in `history`.
pub trait AgentBackend: Send + Sync {
    fn respond(
        &self,
        history: &[ChatMessage],
        existing_plugins: &[String],
    ) -> Result<AgentResponse, AgentError>;
}

/// Parses a raw model reply. A surrounding Markdown fence is ignored.
pub fn parse_agent_response(text: &str) -> Result<AgentResponse, AgentError> {
    Ok(serde_json::from_str(strip_code_fence(text).trim())?)
}

/// Applies the acceptance rules to a parsed reply.
///
/// A `BUILD` reply must carry `plan.newPlugin`, which gets a fresh
/// `plugin-<issued_at_millis>` id. A `CHAT` reply must carry a non-empty `chatReply`.
pub fn accept_response(
    mut response: AgentResponse,
    issued_at_millis: u128,
) -> Result<AgentResponse, AgentError> {
    match response.action {
        AgentAction::Build => {
            let plugin = response
                .plan
                .as_mut()
                .and_then(|plan| plan.new_plugin.as_mut())
                .ok_or(AgentError::Malformed("BUILD reply without plan.newPlugin"))?;
            plugin.id = format!("plugin-{issued_at_millis}");
            Ok(response)
        }
        AgentAction::Chat => {
            let has_reply = response
                .chat_reply
                .as_deref()
                .is_some_and(|reply| !reply.trim().is_empty());
            if !has_reply {
                return Err(AgentError::Malformed("CHAT reply without chatReply"));
            }
            Ok(response)
        }
    }
}

#[derive(Clone)]
pub struct AgentClient {
    tx: mpsc::Sender<AppEvent>,
    backend: Arc<dyn AgentBackend>,
    runtime_handle: Handle,
    pacing: plan::Pacing,
}

impl AgentClient {
    /// Must be called from inside the tokio runtime that will run the turns.
    pub fn new(
        tx: mpsc::Sender<AppEvent>,
        backend: Arc<dyn AgentBackend>,
        delay_scale: f64,
    ) -> Result<Self, AgentError> {
        let runtime_handle =
            Handle::try_current().map_err(|err| AgentError::RuntimeUnavailable(err.to_string()))?;
        Ok(Self {
            tx,
            backend,
            runtime_handle,
            pacing: plan::Pacing::scaled(delay_scale),
        })
    }

    /// Runs one chat turn in the background. `history` ends with the user's message.
    pub fn send(&self, history: Vec<ChatMessage>, existing_plugins: Vec<String>) {
        let tx = self.tx.clone();
        let backend = Arc::clone(&self.backend);
        let pacing = self.pacing;

        self.runtime_handle.spawn(async move {
            plan::run_turn(backend.as_ref(), &history, &existing_plugins, &tx, pacing).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_reply() -> serde_json::Value {
        json!({
            "action": "BUILD",
            "plan": {
                "initialChatReply": "On it.",
                "tasks": [{ "description": "Write code" }],
                "logsForTasks": [[{ "text": "Generating...", "status": "info" }]],
                "finalChatReply": "Done.",
                "newPlugin": {
                    "id": "plugin-placeholder",
                    "name": "Counter",
                    "icon": "ChartIcon",
                    "description": "Counts things.",
                    "color": "bg-indigo-500",
                    "generatedCode": "(container) => {}",
                    "apiEndpoints": []
                }
            }
        })
    }

    #[test]
    fn fenced_reply_is_parsed() {
        let raw = format!("```json\n{}\n```", build_reply());
        let response = parse_agent_response(&raw).expect("fenced json");
        assert_eq!(response.action, AgentAction::Build);
        let plan = response.plan.expect("plan");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.logs_for_tasks[0][0].text, "Generating...");
    }

    #[test]
    fn build_reply_gets_a_fresh_plugin_id() {
        let response = parse_agent_response(&build_reply().to_string()).expect("json");
        let accepted = accept_response(response, 1_700_000_000_123).expect("accepted");
        let plugin = accepted.plan.and_then(|plan| plan.new_plugin).expect("plugin");
        assert_eq!(plugin.id, "plugin-1700000000123");
    }

    #[test]
    fn build_without_plugin_is_malformed() {
        let mut reply = build_reply();
        reply["plan"]
            .as_object_mut()
            .expect("plan object")
            .remove("newPlugin");
        let response = parse_agent_response(&reply.to_string()).expect("json");
        assert!(matches!(
            accept_response(response, 1),
            Err(AgentError::Malformed(_))
        ));
    }

    #[test]
    fn chat_reply_needs_text() {
        let empty = parse_agent_response(r#"{"action":"CHAT","chatReply":"  "}"#).expect("json");
        assert!(matches!(accept_response(empty, 1), Err(AgentError::Malformed(_))));

        let chat = parse_agent_response(r#"{"action":"CHAT","chatReply":"Hi!"}"#).expect("json");
        let accepted = accept_response(chat, 1).expect("accepted");
        assert_eq!(accepted.chat_reply.as_deref(), Some("Hi!"));
    }

    #[test]
    fn unknown_action_or_prose_is_invalid_json() {
        assert!(matches!(
            parse_agent_response(r#"{"action":"DANCE"}"#),
            Err(AgentError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_agent_response("Sure, here is your plugin!"),
            Err(AgentError::InvalidJson(_))
        ));
    }
}
