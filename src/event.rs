use crate::agent::types::{AgentTask, ChatMessage, TaskStatus};
use crate::log::LogEntry;
use crate::plugin::Plugin;

/// Messages from the agent pipeline to the UI thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    Chat(ChatMessage),
    Log(LogEntry),
    TasksPlanned(Vec<AgentTask>),
    TaskStatus { task_id: String, status: TaskStatus },
    PluginBuilt(Plugin),
    /// Ends a turn: clears the task list and stops the working indicator.
    AgentIdle,
}
