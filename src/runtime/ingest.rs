use crate::runtime::error::{ConstructionError, ExecutionFailure};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub const COMPONENT_DECLARATION_PATTERN: &str = "const <Identifier> = ...";

/// How the agent authored a plugin's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthoringConvention {
    /// `(container) => { ... }` evaluated to a function that populates a mount target.
    MountFunction,
    /// `const Widget = () => ...` rendered with the sandbox's `React` entry point.
    DeclaredComponent,
}

impl AuthoringConvention {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MountFunction => "mount_function",
            Self::DeclaredComponent => "declared_component",
        }
    }
}

impl fmt::Display for AuthoringConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConventionPolicy {
    #[default]
    MountFunction,
    DeclaredComponent,
    Auto,
}

impl ConventionPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mount_function" | "mount-function" | "a" => Some(Self::MountFunction),
            "declared_component" | "declared-component" | "b" => Some(Self::DeclaredComponent),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MountFunction => "mount_function",
            Self::DeclaredComponent => "declared_component",
            Self::Auto => "auto",
        }
    }

    fn resolve(self, text: &str) -> AuthoringConvention {
        match self {
            Self::MountFunction => AuthoringConvention::MountFunction,
            Self::DeclaredComponent => AuthoringConvention::DeclaredComponent,
            Self::Auto => detect_convention(text),
        }
    }
}

/// Source text that passed the structural check for its convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSource {
    pub convention: AuthoringConvention,
    pub text: String,
    pub component_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingestion {
    Placeholder,
    Ready(ValidatedSource),
    Rejected(ExecutionFailure),
}

pub fn ingest(source: Option<&str>, policy: ConventionPolicy) -> Ingestion {
    let Some(raw) = source else {
        return Ingestion::Placeholder;
    };
    let text = strip_code_fence(raw);
    if text.trim().is_empty() {
        return Ingestion::Placeholder;
    }

    let convention = policy.resolve(text);
    let validated = match convention {
        AuthoringConvention::MountFunction => Ok(ValidatedSource {
            convention,
            text: text.to_string(),
            component_name: None,
        }),
        AuthoringConvention::DeclaredComponent => validate_declared_component(text),
    };

    match validated {
        Ok(source) => Ingestion::Ready(source),
        Err(error) => Ingestion::Rejected(error.into()),
    }
}

fn validate_declared_component(text: &str) -> Result<ValidatedSource, ConstructionError> {
    if let Some(found) = jsx_regex().find(text) {
        // the match ends with `<` plus one ASCII letter
        let snippet: String = text[found.end() - 2..]
            .chars()
            .take_while(|ch| !ch.is_whitespace() && *ch != '>')
            .take(24)
            .collect();
        return Err(ConstructionError::validation(format!(
            "expected component markup built with `React.createElement(...)`, found JSX near `{snippet}`"
        )));
    }

    let Some(name) = component_name(text) else {
        return Err(ConstructionError::validation(format!(
            "Could not find a valid component name: expected a declaration matching pattern `{COMPONENT_DECLARATION_PATTERN}`, none found"
        )));
    };

    Ok(ValidatedSource {
        convention: AuthoringConvention::DeclaredComponent,
        text: text.to_string(),
        component_name: Some(name),
    })
}

pub fn component_name(text: &str) -> Option<String> {
    component_regex()
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
}

pub fn detect_convention(text: &str) -> AuthoringConvention {
    let head = skip_leading_trivia(text);
    if opens_function_expression(head) {
        AuthoringConvention::MountFunction
    } else if component_name(text).is_some() {
        AuthoringConvention::DeclaredComponent
    } else {
        AuthoringConvention::MountFunction
    }
}

fn opens_function_expression(head: &str) -> bool {
    head.starts_with('(')
        || head.starts_with("function")
        || head.starts_with("async")
        || bare_arrow_regex().is_match(head)
}

fn skip_leading_trivia(text: &str) -> &str {
    let mut rest = text.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            return rest;
        }
    }
}

/// Agents often wrap code in a Markdown fence even when told not to.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return raw;
    };
    let body = after_open.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim_end()
}

fn component_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bconst\s+([A-Z][A-Za-z0-9_$]*)\s*=").expect("component declaration regex")
    })
}

fn bare_arrow_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_$][\w$]*\s*=>").expect("bare arrow regex"))
}

fn jsx_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\breturn|=>)\s*\(?\s*<[A-Za-z]").expect("jsx regex"))
}
