use crate::log::LogStatus;
use crate::plugin::Plugin;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentAction {
    Build,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub action: AgentAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<AgentPlan>,
}

impl AgentResponse {
    pub fn chat(reply: impl Into<String>) -> Self {
        Self {
            action: AgentAction::Chat,
            chat_reply: Some(reply.into()),
            plan: None,
        }
    }

    pub fn build(plan: AgentPlan) -> Self {
        Self {
            action: AgentAction::Build,
            chat_reply: None,
            plan: Some(plan),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPlan {
    pub initial_chat_reply: String,
    #[serde(default)]
    pub tasks: Vec<PlannedTask>,
    /// One list of log lines per task, matched by index.
    #[serde(default)]
    pub logs_for_tasks: Vec<Vec<PlannedLog>>,
    pub final_chat_reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_plugin: Option<Plugin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedLog {
    pub text: String,
    pub status: LogStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: ChatSender,
    pub text: String,
    pub code: Option<CodeBlock>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::User,
            text: text.into(),
            code: None,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::Agent,
            text: text.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, language: impl Into<String>, content: impl Into<String>) -> Self {
        self.code = Some(CodeBlock {
            language: language.into(),
            content: content.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTask {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
}
