//! Offline backends: a keyword-driven agent that builds from bundled
//! blueprints, and a replay agent that serves recorded model output.

use super::types::{AgentPlan, AgentResponse, ChatMessage, ChatSender, PlannedLog, PlannedTask};
use super::{parse_agent_response, AgentBackend, AgentError};
use crate::log::LogStatus;
use crate::plugin::{ApiEndpoint, CustomView, Plugin};
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

const BUILD_VERBS: &[&str] = &[
    "build", "create", "make", "add", "generate", "develop", "write", "need", "want",
];
const GREETINGS: &[&str] = &["hi", "hello", "hey", "thanks", "thank", "morning", "evening"];
/// Words that name the kind of thing, not the thing itself.
const GENERIC_WORDS: &[&str] = &[
    "a", "an", "the", "my", "list", "app", "plugin", "widget", "tool", "utility", "simple", "quick",
];

struct Blueprint {
    keywords: &'static [&'static str],
    name: &'static str,
    icon: &'static str,
    description: &'static str,
    color: &'static str,
    source: &'static str,
    endpoints: &'static [(&'static str, &'static str)],
    view: Option<(&'static str, &'static str)>,
}

const BLUEPRINTS: &[Blueprint] = &[
    Blueprint {
        keywords: &["counter", "tally", "clicker", "count"],
        name: "Counter",
        icon: "ChartIcon",
        description: "A tally counter with increment, decrement and reset.",
        color: "bg-indigo-500",
        source: include_str!("blueprints/counter.js"),
        endpoints: &[
            ("GET /api/counter", "Read the current count."),
            ("POST /api/counter/increment", "Increase the count by one."),
        ],
        view: None,
    },
    Blueprint {
        keywords: &["note", "notes", "notepad", "memo", "memos"],
        name: "Quick Notes",
        icon: "NoteIcon",
        description: "Jot down short notes in a persistent side panel.",
        color: "bg-amber-500",
        source: include_str!("blueprints/notes.js"),
        endpoints: &[
            ("GET /api/notes", "List saved notes."),
            ("POST /api/notes", "Save a new note."),
            ("DELETE /api/notes/:id", "Remove a note."),
        ],
        view: Some(("view-quick-notes", "NoteIcon")),
    },
    Blueprint {
        keywords: &["stopwatch", "timer", "clock", "chronometer"],
        name: "Stopwatch",
        icon: "BeakerIcon",
        description: "A stopwatch with tenth-of-a-second precision.",
        color: "bg-green-500",
        source: include_str!("blueprints/stopwatch.js"),
        endpoints: &[("GET /api/stopwatch", "Read the elapsed time.")],
        view: None,
    },
    Blueprint {
        keywords: &["random", "dice", "roll", "rng"],
        name: "Random Number",
        icon: "CodeBracketSquareIcon",
        description: "Rolls a random whole number between two bounds.",
        color: "bg-purple-500",
        source: include_str!("blueprints/random_number.js"),
        endpoints: &[("GET /api/random?min=&max=", "Draw a number in the given range.")],
        view: None,
    },
];

fn token_set(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .replace('-', "")
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinctive words of a plugin name: "To-Do List" gives `{"todo"}`.
fn name_words(name: &str) -> BTreeSet<String> {
    token_set(name)
        .into_iter()
        .filter(|word| !GENERIC_WORDS.contains(&word.as_str()))
        .collect()
}

fn existing_match<'a>(tokens: &BTreeSet<String>, existing_plugins: &'a [String]) -> Option<&'a str> {
    existing_plugins.iter().map(String::as_str).find(|name| {
        let words = name_words(name);
        !words.is_empty() && words.is_subset(tokens)
    })
}

/// Offline stand-in for a language model.
#[derive(Debug, Default)]
pub struct ScriptedAgent;

impl ScriptedAgent {
    fn reply_to(&self, prompt: &str, existing_plugins: &[String]) -> AgentResponse {
        let tokens = token_set(prompt);
        let has = |term: &str| tokens.contains(term);
        let wants_build = BUILD_VERBS.iter().any(|verb| has(*verb));
        let blueprint = BLUEPRINTS
            .iter()
            .find(|blueprint| blueprint.keywords.iter().any(|keyword| has(*keyword)));

        if wants_build {
            let existing = blueprint
                .and_then(|blueprint| {
                    existing_plugins
                        .iter()
                        .find(|name| name.eq_ignore_ascii_case(blueprint.name))
                        .map(String::as_str)
                })
                .or_else(|| existing_match(&tokens, existing_plugins));
            if let Some(name) = existing {
                return AgentResponse::chat(format!(
                    "The '{name}' plugin already exists. You can open it from the plugin list on the left. \
                     Would you like me to build something new instead, such as {}?",
                    suggestion(existing_plugins)
                ));
            }
            if let Some(blueprint) = blueprint {
                debug!(blueprint = blueprint.name, "scripted agent matched a blueprint");
                return AgentResponse::build(plan_for(blueprint, prompt));
            }
            return AgentResponse::chat(format!(
                "I'd love to help, but I need a more specific idea. How about {}? Just ask me to build it.",
                suggestion(existing_plugins)
            ));
        }

        if GREETINGS.iter().any(|greeting| has(*greeting)) {
            return AgentResponse::chat(format!(
                "Hello! I can build small plugins for this workspace. Try asking me to build {}.",
                suggestion(existing_plugins)
            ));
        }

        AgentResponse::chat(format!(
            "I build plugins on request. Describe a widget and I'll plan it, generate its code and add it \
             to the workspace. For example, ask me to build {}.",
            suggestion(existing_plugins)
        ))
    }
}

/// Picks the first blueprint the session doesn't have yet.
fn suggestion(existing_plugins: &[String]) -> String {
    BLUEPRINTS
        .iter()
        .find(|blueprint| {
            !existing_plugins
                .iter()
                .any(|name| name.eq_ignore_ascii_case(blueprint.name))
        })
        .map(|blueprint| format!("a '{}' plugin", blueprint.name))
        .unwrap_or_else(|| "a calculator".to_string())
}

fn plan_for(blueprint: &Blueprint, prompt: &str) -> AgentPlan {
    let plugin = Plugin {
        id: "plugin-placeholder".to_string(),
        name: blueprint.name.to_string(),
        icon: blueprint.icon.to_string(),
        description: blueprint.description.to_string(),
        color: blueprint.color.to_string(),
        generated_code: Some(blueprint.source.to_string()),
        api_endpoints: blueprint
            .endpoints
            .iter()
            .map(|(path, description)| ApiEndpoint {
                path: path.to_string(),
                description: description.to_string(),
            })
            .collect(),
        custom_view: blueprint.view.map(|(id, icon)| CustomView {
            id: id.to_string(),
            name: blueprint.name.to_string(),
            icon: icon.to_string(),
        }),
    };

    let line = |text: String, status: LogStatus| PlannedLog { text, status };
    let source_lines = blueprint.source.lines().count();
    let mut register_logs = vec![line(
        format!(
            "Registering endpoints: {}",
            blueprint
                .endpoints
                .iter()
                .map(|(path, _)| *path)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        LogStatus::Info,
    )];
    if blueprint.view.is_some() {
        register_logs.push(line(
            "Adding a custom view to the activity bar.".to_string(),
            LogStatus::Info,
        ));
    }
    register_logs.push(line(
        format!("Plugin '{}' registered.", blueprint.name),
        LogStatus::Success,
    ));

    AgentPlan {
        initial_chat_reply: format!(
            "Great idea! I'll build a '{}' plugin for you. Here's my plan.",
            blueprint.name
        ),
        tasks: vec![
            PlannedTask {
                description: format!("Analyze requirements for '{}'", blueprint.name),
            },
            PlannedTask {
                description: "Generate the plugin UI code".to_string(),
            },
            PlannedTask {
                description: "Register the plugin and its API endpoints".to_string(),
            },
        ],
        logs_for_tasks: vec![
            vec![
                line(format!("Parsing request: \"{}\"", prompt.trim()), LogStatus::Info),
                line("Requirements captured.".to_string(), LogStatus::Success),
            ],
            vec![
                line("Generating DOM mount function...".to_string(), LogStatus::Info),
                line("Applying dark theme inline styles...".to_string(), LogStatus::Info),
                line(format!("Code generated ({source_lines} lines)."), LogStatus::Success),
            ],
            register_logs,
        ],
        final_chat_reply: match blueprint.view {
            Some(_) => format!(
                "The '{}' plugin is ready! It also has its own icon in the activity bar.",
                blueprint.name
            ),
            None => format!("The '{}' plugin is ready! Open the Live tab to try it.", blueprint.name),
        },
        new_plugin: Some(plugin),
    }
}

fn latest_user_prompt(history: &[ChatMessage]) -> &str {
    history
        .iter()
        .rev()
        .find(|message| message.sender == ChatSender::User)
        .map_or("", |message| message.text.as_str())
}

impl AgentBackend for ScriptedAgent {
    fn respond(
        &self,
        history: &[ChatMessage],
        existing_plugins: &[String],
    ) -> Result<AgentResponse, AgentError> {
        Ok(self.reply_to(latest_user_prompt(history), existing_plugins))
    }
}

/// Serves recorded replies in order, one per turn.
///
/// Entries are either reply objects or raw reply strings exactly as a model
/// returned them (fences included).
#[derive(Debug)]
pub struct ReplayAgent {
    replies: Mutex<VecDeque<Value>>,
}

impl ReplayAgent {
    pub fn from_path(path: &Path) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AgentError::ReplayFile {
            path: path.to_path_buf(),
            source,
        })?;
        let replies: Vec<Value> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), count = replies.len(), "loaded agent replay");
        Ok(Self::new(replies))
    }

    pub fn new(replies: Vec<Value>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

impl AgentBackend for ReplayAgent {
    fn respond(&self, _: &[ChatMessage], _: &[String]) -> Result<AgentResponse, AgentError> {
        let next = match self.replies.lock() {
            Ok(mut replies) => replies.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        match next.ok_or(AgentError::ReplayExhausted)? {
            Value::String(text) => parse_agent_response(&text),
            value => Ok(serde_json::from_value(value)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::AgentAction;
    use crate::runtime::host::{HostView, PluginHost};
    use serde_json::json;

    fn ask(prompt: &str, existing: &[&str]) -> AgentResponse {
        let existing: Vec<String> = existing.iter().map(|name| name.to_string()).collect();
        ScriptedAgent
            .respond(&[ChatMessage::user(prompt)], &existing)
            .expect("scripted reply")
    }

    #[test]
    fn build_request_produces_a_full_plan() {
        let response = ask("Build a simple notes widget", &["To-Do List"]);
        assert_eq!(response.action, AgentAction::Build);
        let plan = response.plan.expect("plan");
        assert_eq!(plan.tasks.len(), plan.logs_for_tasks.len());
        let plugin = plan.new_plugin.expect("plugin");
        assert_eq!(plugin.name, "Quick Notes");
        assert_eq!(plugin.custom_view.map(|view| view.id), Some("view-quick-notes".to_string()));
        assert!(plugin.generated_code.is_some());
    }

    #[test]
    fn existing_plugins_get_a_chat_reply() {
        let response = ask("Create a to-do list plugin", &["To-Do List"]);
        assert_eq!(response.action, AgentAction::Chat);
        assert!(response.chat_reply.expect("reply").contains("'To-Do List' plugin already exists"));

        let response = ask("make me a counter", &["To-Do List", "counter"]);
        assert_eq!(response.action, AgentAction::Chat);
    }

    #[test]
    fn greetings_and_vague_requests_suggest_an_idea() {
        let hello = ask("hello there", &["To-Do List"]);
        assert_eq!(hello.action, AgentAction::Chat);
        assert!(hello.chat_reply.expect("reply").contains("'Counter'"));

        let vague = ask("build something cool", &["To-Do List", "Counter"]);
        assert_eq!(vague.action, AgentAction::Chat);
        assert!(vague.chat_reply.expect("reply").contains("'Quick Notes'"));
    }

    #[test]
    fn only_the_latest_user_message_counts() {
        let history = vec![
            ChatMessage::user("build a counter"),
            ChatMessage::agent("Done."),
            ChatMessage::user("thanks!"),
        ];
        let response = ScriptedAgent.respond(&history, &[]).expect("reply");
        assert_eq!(response.action, AgentAction::Chat);
    }

    #[test]
    fn every_blueprint_mounts_cleanly() {
        for blueprint in BLUEPRINTS {
            let mut host = PluginHost::default();
            host.mount(Some(blueprint.source));
            assert!(
                matches!(host.view(), HostView::Rendered(_)),
                "{} failed: {:?}",
                blueprint.name,
                host.view()
            );
            assert!(!host.text_content().is_empty(), "{} rendered nothing", blueprint.name);
        }
    }

    #[test]
    fn replay_serves_objects_and_raw_strings_in_order() {
        let agent = ReplayAgent::new(vec![
            json!({ "action": "CHAT", "chatReply": "first" }),
            json!("```json\n{\"action\":\"CHAT\",\"chatReply\":\"second\"}\n```"),
        ]);
        let first = agent.respond(&[], &[]).expect("first");
        let second = agent.respond(&[], &[]).expect("second");
        assert_eq!(first.chat_reply.as_deref(), Some("first"));
        assert_eq!(second.chat_reply.as_deref(), Some("second"));
        assert!(matches!(agent.respond(&[], &[]), Err(AgentError::ReplayExhausted)));
    }

    #[test]
    fn missing_replay_file_is_reported() {
        let error = ReplayAgent::from_path(Path::new("/nonexistent/catalyst-replay.json"))
            .expect_err("missing file");
        assert!(matches!(error, AgentError::ReplayFile { .. }));
    }
}
