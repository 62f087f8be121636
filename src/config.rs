//! Start-up configuration read from `CATALYST_*` environment variables.

use crate::runtime::{ConventionPolicy, SandboxLimits};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_TIME_BUDGET_MS: u64 = 250;
const DEFAULT_MEMORY_LIMIT_MB: usize = 32;
const DEFAULT_STACK_KB: usize = 512;
const DEFAULT_DELAY_SCALE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: unknown plugin convention `{value}` (expected mount_function, declared_component or auto)")]
    UnknownConvention { var: &'static str, value: String },
    #[error("{var}: cannot parse `{value}`")]
    Unparsable { var: &'static str, value: String },
    #[error("{var}: value must be greater than zero")]
    NotPositive { var: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub convention: ConventionPolicy,
    pub time_budget_ms: u64,
    pub memory_limit_mb: usize,
    pub stack_kb: usize,
    /// JSON array of recorded agent responses served in order instead of the scripted agent.
    pub agent_replay: Option<PathBuf>,
    /// Multiplier for the plan walk delays. `0` makes the walk instant.
    pub delay_scale: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            convention: ConventionPolicy::default(),
            time_budget_ms: DEFAULT_TIME_BUDGET_MS,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            stack_kb: DEFAULT_STACK_KB,
            agent_replay: None,
            delay_scale: DEFAULT_DELAY_SCALE,
        }
    }
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `CATALYST_PLUGIN_CONVENTION`: `mount_function` (default), `declared_component` or `auto`
    /// - `CATALYST_PLUGIN_TIME_BUDGET_MS`: default 250
    /// - `CATALYST_PLUGIN_MEMORY_LIMIT_MB`: default 32
    /// - `CATALYST_PLUGIN_STACK_KB`: default 512
    /// - `CATALYST_AGENT_REPLAY`: path to recorded agent responses
    /// - `CATALYST_AGENT_DELAY_SCALE`: default 1.0
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let convention = parse_convention(lookup(CONVENTION_VAR).as_deref())?;
        let time_budget_ms = positive(
            TIME_BUDGET_VAR,
            parse_var(TIME_BUDGET_VAR, lookup(TIME_BUDGET_VAR).as_deref(), DEFAULT_TIME_BUDGET_MS)?,
        )?;
        let memory_limit_mb = positive(
            MEMORY_VAR,
            parse_var(MEMORY_VAR, lookup(MEMORY_VAR).as_deref(), DEFAULT_MEMORY_LIMIT_MB)?,
        )?;
        let stack_kb = positive(
            STACK_VAR,
            parse_var(STACK_VAR, lookup(STACK_VAR).as_deref(), DEFAULT_STACK_KB)?,
        )?;
        let delay_scale: f64 =
            parse_var(DELAY_SCALE_VAR, lookup(DELAY_SCALE_VAR).as_deref(), DEFAULT_DELAY_SCALE)?;
        if !delay_scale.is_finite() || delay_scale < 0.0 {
            return Err(ConfigError::Unparsable {
                var: DELAY_SCALE_VAR,
                value: delay_scale.to_string(),
            });
        }
        let agent_replay = lookup(REPLAY_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            convention,
            time_budget_ms,
            memory_limit_mb,
            stack_kb,
            agent_replay,
            delay_scale,
        })
    }

    pub fn sandbox_limits(&self) -> SandboxLimits {
        SandboxLimits {
            memory_limit_bytes: self.memory_limit_mb * 1024 * 1024,
            max_stack_bytes: self.stack_kb * 1024,
            time_budget: Duration::from_millis(self.time_budget_ms),
        }
    }
}

const CONVENTION_VAR: &str = "CATALYST_PLUGIN_CONVENTION";
const TIME_BUDGET_VAR: &str = "CATALYST_PLUGIN_TIME_BUDGET_MS";
const MEMORY_VAR: &str = "CATALYST_PLUGIN_MEMORY_LIMIT_MB";
const STACK_VAR: &str = "CATALYST_PLUGIN_STACK_KB";
const REPLAY_VAR: &str = "CATALYST_AGENT_REPLAY";
const DELAY_SCALE_VAR: &str = "CATALYST_AGENT_DELAY_SCALE";

fn parse_convention(raw: Option<&str>) -> Result<ConventionPolicy, ConfigError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(ConventionPolicy::default()),
        Some(value) => ConventionPolicy::parse(value).ok_or_else(|| ConfigError::UnknownConvention {
            var: CONVENTION_VAR,
            value: value.to_string(),
        }),
    }
}

/// Absent or blank values fall back to `default`; anything else must parse.
fn parse_var<T: FromStr>(var: &'static str, raw: Option<&str>, default: T) -> Result<T, ConfigError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::Unparsable {
            var,
            value: value.to_string(),
        }),
    }
}

fn positive<T: PartialEq + Default>(var: &'static str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::NotPositive { var });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = config_from(&[]).expect("defaults");
        assert_eq!(config, AppConfig::default());
        let limits = config.sandbox_limits();
        assert_eq!(limits.memory_limit_bytes, 32 * 1024 * 1024);
        assert_eq!(limits.max_stack_bytes, 512 * 1024);
        assert_eq!(limits.time_budget, Duration::from_millis(250));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("CATALYST_PLUGIN_CONVENTION", "auto"),
            ("CATALYST_PLUGIN_TIME_BUDGET_MS", " 900 "),
            ("CATALYST_AGENT_REPLAY", "fixtures/replay.json"),
            ("CATALYST_AGENT_DELAY_SCALE", "0"),
        ])
        .expect("config");
        assert_eq!(config.convention, ConventionPolicy::Auto);
        assert_eq!(config.time_budget_ms, 900);
        assert_eq!(config.agent_replay, Some(PathBuf::from("fixtures/replay.json")));
        assert_eq!(config.delay_scale, 0.0);
    }

    #[test]
    fn bad_values_are_reported() {
        assert_eq!(
            config_from(&[("CATALYST_PLUGIN_CONVENTION", "jsx")]),
            Err(ConfigError::UnknownConvention {
                var: "CATALYST_PLUGIN_CONVENTION",
                value: "jsx".to_string()
            })
        );
        assert_eq!(
            config_from(&[("CATALYST_PLUGIN_STACK_KB", "lots")]),
            Err(ConfigError::Unparsable {
                var: "CATALYST_PLUGIN_STACK_KB",
                value: "lots".to_string()
            })
        );
        assert_eq!(
            config_from(&[("CATALYST_PLUGIN_TIME_BUDGET_MS", "0")]),
            Err(ConfigError::NotPositive {
                var: "CATALYST_PLUGIN_TIME_BUDGET_MS"
            })
        );
        assert!(config_from(&[("CATALYST_AGENT_DELAY_SCALE", "-1")]).is_err());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("CATALYST_PLUGIN_MEMORY_LIMIT_MB", "  "),
            ("CATALYST_AGENT_REPLAY", ""),
        ])
        .expect("config");
        assert_eq!(config.memory_limit_mb, 32);
        assert!(config.agent_replay.is_none());
    }
}
