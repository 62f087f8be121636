//! Walks an accepted agent reply and turns it into UI events.

use super::types::{AgentAction, AgentPlan, AgentTask, ChatMessage, TaskStatus};
use super::{accept_response, AgentBackend, AgentError};
use crate::event::AppEvent;
use crate::log::{LogEntry, LogStatus};
use rand::Rng;
use std::sync::mpsc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const TASK_SETTLE_MS: u64 = 300;
const LOG_GAP_MS: std::ops::RangeInclusive<u64> = 200..=400;
const IDLE_AFTER_BUILD_MS: u64 = 2500;

pub const FAILURE_REPLY: &str = "I'm sorry, I encountered an error and couldn't process your request. Please try rephrasing, or check the system logs for more details.";
pub const CONFUSED_REPLY: &str =
    "I seem to have gotten confused. Could you try rephrasing your request?";
const EMPTY_CHAT_REPLY: &str = "I'm not sure how to respond to that.";

/// Delay multiplier for the plan walk. `0` disables every wait.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    scale: f64,
}

impl Pacing {
    pub fn scaled(scale: f64) -> Self {
        Self {
            scale: if scale.is_finite() { scale.max(0.0) } else { 1.0 },
        }
    }

    #[cfg(test)]
    pub fn instant() -> Self {
        Self { scale: 0.0 }
    }

    fn delay(self, millis: u64) -> Duration {
        Duration::from_secs_f64(millis as f64 * self.scale / 1000.0)
    }

    async fn pause(self, millis: u64) {
        let delay = self.delay(millis);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}

fn log(tx: &mpsc::Sender<AppEvent>, text: impl Into<String>, status: LogStatus) {
    let _ = tx.send(AppEvent::Log(LogEntry::now(text, status)));
}

fn say(tx: &mpsc::Sender<AppEvent>, message: ChatMessage) {
    let _ = tx.send(AppEvent::Chat(message));
}

/// Asks the backend for a reply and plays it out.
///
/// Always finishes with [`AppEvent::AgentIdle`], which the UI uses to stop the
/// working indicator.
pub async fn run_turn(
    backend: &dyn AgentBackend,
    history: &[ChatMessage],
    existing_plugins: &[String],
    tx: &mpsc::Sender<AppEvent>,
    pacing: Pacing,
) {
    let issued_at = now_millis();
    let reply = backend
        .respond(history, existing_plugins)
        .and_then(|response| accept_response(response, issued_at));

    match reply {
        Err(AgentError::Malformed(reason)) => {
            warn!(reason, "agent reply rejected");
            log(tx, "Agent response was invalid.", LogStatus::Error);
            say(tx, ChatMessage::agent(CONFUSED_REPLY));
        }
        Err(err) => {
            warn!(error = %err, "agent turn failed");
            log(tx, "Agent failed to generate a valid response.", LogStatus::Error);
            say(tx, ChatMessage::agent(FAILURE_REPLY));
        }
        Ok(response) => match (response.action, response.plan) {
            (AgentAction::Build, Some(plan)) => {
                log(
                    tx,
                    "Agent responded in BUILD mode. Plan received successfully.",
                    LogStatus::Success,
                );
                walk_plan(plan, issued_at, tx, pacing).await;
                pacing.pause(IDLE_AFTER_BUILD_MS).await;
            }
            (AgentAction::Build, None) => {
                log(tx, "Agent response was invalid.", LogStatus::Error);
                say(tx, ChatMessage::agent(CONFUSED_REPLY));
            }
            (AgentAction::Chat, _) => {
                log(tx, "Agent responded in CHAT mode.", LogStatus::Info);
                let text = response
                    .chat_reply
                    .unwrap_or_else(|| EMPTY_CHAT_REPLY.to_string());
                say(tx, ChatMessage::agent(text));
            }
        },
    }

    let _ = tx.send(AppEvent::AgentIdle);
}

async fn walk_plan(plan: AgentPlan, issued_at: u128, tx: &mpsc::Sender<AppEvent>, pacing: Pacing) {
    say(tx, ChatMessage::agent(plan.initial_chat_reply));

    let tasks: Vec<AgentTask> = plan
        .tasks
        .iter()
        .enumerate()
        .map(|(index, task)| AgentTask {
            id: format!("task-{issued_at}-{index}"),
            description: task.description.clone(),
            status: TaskStatus::Pending,
        })
        .collect();
    let _ = tx.send(AppEvent::TasksPlanned(tasks.clone()));

    for (index, task) in tasks.iter().enumerate() {
        let _ = tx.send(AppEvent::TaskStatus {
            task_id: task.id.clone(),
            status: TaskStatus::InProgress,
        });
        pacing.pause(TASK_SETTLE_MS).await;

        let mut failed = false;
        for entry in plan.logs_for_tasks.get(index).into_iter().flatten() {
            log(tx, entry.text.clone(), entry.status);
            failed |= entry.status == LogStatus::Error;
            let gap = rand::rng().random_range(LOG_GAP_MS);
            pacing.pause(gap).await;
        }

        // a task that logged an error ends in the error state; the walk continues
        let _ = tx.send(AppEvent::TaskStatus {
            task_id: task.id.clone(),
            status: if failed { TaskStatus::Error } else { TaskStatus::Completed },
        });
        pacing.pause(TASK_SETTLE_MS).await;
    }

    if let Some(plugin) = plan.new_plugin {
        info!(plugin_id = %plugin.id, name = %plugin.name, "agent built a plugin");
        let code_message = plugin.source().map(|source| {
            ChatMessage::agent(format!(
                "Here is the source code for the new '{}' plugin. I've opened its detail page for you.",
                plugin.name
            ))
            .with_code("javascript", source)
        });
        let _ = tx.send(AppEvent::PluginBuilt(plugin));
        if let Some(message) = code_message {
            say(tx, message);
        }
    }

    say(tx, ChatMessage::agent(plan.final_chat_reply));
}
