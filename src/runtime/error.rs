use std::fmt;

/// Which step of the plugin pipeline produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Validation,
    Evaluation,
    Type,
    Execution,
    Rendering,
}

impl FailurePhase {
    pub fn header(self) -> &'static str {
        match self {
            Self::Validation => "Plugin Compilation Error",
            Self::Evaluation | Self::Type | Self::Execution => "Plugin Execution Error",
            Self::Rendering => "Plugin Runtime Error",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Evaluation => "evaluation",
            Self::Type => "type",
            Self::Execution => "execution",
            Self::Rendering => "rendering",
        }
    }
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    #[error("{message}")]
    Validation { message: String },
    #[error("{message}")]
    Evaluation {
        message: String,
        cause: Option<String>,
    },
    #[error("{message}")]
    Type { message: String },
}

impl ConstructionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    pub fn phase(&self) -> FailurePhase {
        match self {
            Self::Validation { .. } => FailurePhase::Validation,
            Self::Evaluation { .. } => FailurePhase::Evaluation,
            Self::Type { .. } => FailurePhase::Type,
        }
    }
}

/// A throw raised by a unit after construction succeeded: while invoking a
/// mount function, during a component render pass, or from an event handler or
/// timer callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RenderingError {
    pub phase: FailurePhase,
    pub message: String,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub phase: FailurePhase,
    pub message: String,
    pub cause: Option<String>,
}

impl ExecutionFailure {
    pub fn new(phase: FailurePhase, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            format!("{} failed without a message", phase.as_str())
        } else {
            message
        };
        Self {
            phase,
            message,
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: Option<String>) -> Self {
        self.cause = cause.filter(|cause| !cause.trim().is_empty());
        self
    }

    pub fn header(&self) -> &'static str {
        self.phase.header()
    }

    pub fn to_log_line(&self) -> String {
        format!("{}: {}", self.header(), self.message)
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.header(), self.phase, self.message)
    }
}

impl From<ConstructionError> for ExecutionFailure {
    fn from(error: ConstructionError) -> Self {
        let phase = error.phase();
        match error {
            ConstructionError::Validation { message } | ConstructionError::Type { message } => {
                Self::new(phase, message)
            }
            ConstructionError::Evaluation { message, cause } => {
                Self::new(phase, message).with_cause(cause)
            }
        }
    }
}

impl From<RenderingError> for ExecutionFailure {
    fn from(error: RenderingError) -> Self {
        Self::new(error.phase, error.message).with_cause(error.cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_distinguish_compile_execute_and_runtime_phases() {
        assert_eq!(
            FailurePhase::Validation.header(),
            "Plugin Compilation Error"
        );
        assert_eq!(FailurePhase::Evaluation.header(), "Plugin Execution Error");
        assert_eq!(FailurePhase::Type.header(), "Plugin Execution Error");
        assert_eq!(FailurePhase::Rendering.header(), "Plugin Runtime Error");
    }

    #[test]
    fn blank_messages_are_replaced_with_phase_description() {
        let failure = ExecutionFailure::new(FailurePhase::Evaluation, "  ");
        assert_eq!(failure.message, "evaluation failed without a message");
    }

    #[test]
    fn construction_error_keeps_cause_when_converted() {
        let failure: ExecutionFailure = ConstructionError::Evaluation {
            message: "SyntaxError: unexpected token".to_string(),
            cause: Some("    at <eval>:1".to_string()),
        }
        .into();
        assert_eq!(failure.phase, FailurePhase::Evaluation);
        assert_eq!(failure.cause.as_deref(), Some("    at <eval>:1"));
    }
}
