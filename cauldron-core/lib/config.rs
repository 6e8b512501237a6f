//! Configuration for the execution and grading engine.
//!
//! This module handles engine configuration including:
//! - Which isolation backend runs submissions
//! - Where the worker program lives for process isolation
//! - Optional interpreter limits and execution timeout
//! - How grading compares serialized values
//!
//! Every setting can be overridden from `CAULDRON_*` environment variables through
//! [`EngineConfig::from_env`].

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{CauldronError, CauldronResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable selecting the isolation backend (`thread` or `process`)
pub const ISOLATION_ENV_VAR: &str = "CAULDRON_ISOLATION";

/// Environment variable for the worker program used by process isolation
pub const WORKER_EXE_ENV_VAR: &str = "CAULDRON_WORKER_EXE";

/// Environment variable for the execution timeout in milliseconds
pub const TIMEOUT_MS_ENV_VAR: &str = "CAULDRON_TIMEOUT_MS";

/// Environment variable for the interpreter loop iteration limit
pub const LOOP_LIMIT_ENV_VAR: &str = "CAULDRON_LOOP_LIMIT";

/// Environment variable for the interpreter recursion limit
pub const RECURSION_LIMIT_ENV_VAR: &str = "CAULDRON_RECURSION_LIMIT";

/// Environment variable selecting how grading treats object key order (`strict` or `normalized`)
pub const KEY_ORDER_ENV_VAR: &str = "CAULDRON_KEY_ORDER";

/// The argument that makes the cauldron binary act as a worker
pub const DEFAULT_WORKER_SUBCOMMAND: &str = "worker";

/// Capacity of the channel between a unit and the coordinator
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Loop iteration limit applied unless configured otherwise.
///
/// Thread units cannot be preempted, so this bound is what eventually returns the thread of a
/// terminated unit stuck in a loop that never calls `console`.
pub const DEFAULT_LOOP_ITERATION_LIMIT: u64 = 10_000_000;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where a submission runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationMode {
    /// A fresh interpreter on a dedicated OS thread of the host process.
    #[default]
    Thread,

    /// A fresh interpreter inside a worker subprocess that can be killed.
    Process,
}

/// How the grader treats the key order of objects when comparing results.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOrder {
    /// Objects compare equal only if their keys were inserted in the same order.
    #[default]
    Strict,

    /// Object keys are sorted recursively before serializing.
    Normalized,
}

/// Interpreter limits applied to every fresh context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    /// Maximum iterations of a single loop before the interpreter aborts.
    pub loop_iteration_limit: Option<u64>,

    /// Maximum call depth before the interpreter aborts.
    pub recursion_limit: Option<usize>,
}

/// Engine configuration.
#[derive(Debug, Clone, Getters, Setters, TypedBuilder)]
#[getset(get = "pub with_prefix", set = "pub")]
pub struct EngineConfig {
    /// The isolation backend used by the coordinator
    #[builder(default)]
    isolation: IsolationMode,

    /// Worker program for process isolation. Defaults to the current executable.
    #[builder(default, setter(strip_option))]
    worker_program: Option<PathBuf>,

    /// Arguments passed to the worker program
    #[builder(default = vec![DEFAULT_WORKER_SUBCOMMAND.to_string()])]
    worker_args: Vec<String>,

    /// Maximum wall time of a run. `None` means runs last until they finish or are cancelled.
    #[builder(default, setter(strip_option))]
    timeout: Option<Duration>,

    /// Capacity of the unit event channel
    #[builder(default = DEFAULT_CHANNEL_CAPACITY)]
    channel_capacity: usize,

    /// Interpreter loop iteration limit. `None` lets loops run forever.
    #[builder(default = Some(DEFAULT_LOOP_ITERATION_LIMIT), setter(strip_option))]
    loop_iteration_limit: Option<u64>,

    /// Interpreter recursion limit
    #[builder(default, setter(strip_option))]
    recursion_limit: Option<usize>,

    /// Key order policy used by the grader
    #[builder(default)]
    key_order: KeyOrder,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl EngineConfig {
    /// Loads the configuration from `CAULDRON_*` environment variables, falling back to defaults.
    pub fn from_env() -> CauldronResult<Self> {
        let mut config = Self::default();

        if let Some(isolation) = parse_var::<IsolationMode>(ISOLATION_ENV_VAR)? {
            config.isolation = isolation;
        }

        if let Ok(program) = env::var(WORKER_EXE_ENV_VAR) {
            config.worker_program = Some(PathBuf::from(program));
        }

        if let Some(ms) = parse_var::<u64>(TIMEOUT_MS_ENV_VAR)? {
            config.timeout = Some(Duration::from_millis(ms));
        }

        if let Some(limit) = parse_var(LOOP_LIMIT_ENV_VAR)? {
            config.loop_iteration_limit = Some(limit);
        }
        config.recursion_limit = parse_var(RECURSION_LIMIT_ENV_VAR)?;

        if let Some(key_order) = parse_var::<KeyOrder>(KEY_ORDER_ENV_VAR)? {
            config.key_order = key_order;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> CauldronResult<()> {
        if self.channel_capacity == 0 {
            return Err(CauldronError::InvalidConfig(
                "channel capacity must be greater than zero".to_string(),
            ));
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(CauldronError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }

        if self.loop_iteration_limit == Some(0) {
            return Err(CauldronError::InvalidConfig(
                "loop iteration limit must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// The interpreter limits for a fresh context.
    pub fn script_limits(&self) -> ScriptLimits {
        ScriptLimits {
            loop_iteration_limit: self.loop_iteration_limit,
            recursion_limit: self.recursion_limit,
        }
    }

    /// Returns the worker program for process isolation.
    /// If no program was configured, returns the current executable.
    pub fn resolve_worker_program(&self) -> CauldronResult<PathBuf> {
        match &self.worker_program {
            Some(program) => Ok(program.clone()),
            None => Ok(env::current_exe()?),
        }
    }
}

impl ScriptLimits {
    /// Loads interpreter limits from the environment, ignoring malformed values.
    ///
    /// Used by the worker process, which receives its limits from the coordinator's environment.
    pub fn from_env() -> Self {
        Self {
            loop_iteration_limit: env::var(LOOP_LIMIT_ENV_VAR)
                .ok()
                .and_then(|v| v.parse().ok())
                .or(Some(DEFAULT_LOOP_ITERATION_LIMIT)),
            recursion_limit: env::var(RECURSION_LIMIT_ENV_VAR)
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: Some(DEFAULT_LOOP_ITERATION_LIMIT),
            recursion_limit: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FromStr for IsolationMode {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" => Ok(Self::Thread),
            "process" => Ok(Self::Process),
            other => Err(CauldronError::InvalidConfig(format!(
                "unknown isolation mode '{}'. Valid modes: thread, process",
                other
            ))),
        }
    }
}

impl FromStr for KeyOrder {
    type Err = CauldronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "normalized" | "normalised" | "sorted" => Ok(Self::Normalized),
            other => Err(CauldronError::InvalidConfig(format!(
                "unknown key order '{}'. Valid values: strict, normalized",
                other
            ))),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn parse_var<T>(name: &str) -> CauldronResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            CauldronError::InvalidConfig(format!("{} has an invalid value '{}': {}", name, raw, e))
        }),
        Err(_) => Ok(None),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_observed_behaviour() {
        let config = EngineConfig::default();
        assert_eq!(*config.get_isolation(), IsolationMode::Thread);
        assert_eq!(*config.get_timeout(), None);
        assert_eq!(*config.get_key_order(), KeyOrder::Strict);
        assert_eq!(
            config.script_limits().loop_iteration_limit,
            Some(DEFAULT_LOOP_ITERATION_LIMIT)
        );
        assert_eq!(config.script_limits(), ScriptLimits::default());
        assert_eq!(config.get_worker_args(), &vec!["worker".to_string()]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = EngineConfig::builder()
            .isolation(IsolationMode::Process)
            .worker_program(PathBuf::from("/usr/bin/cauldron"))
            .timeout(Duration::from_millis(250))
            .loop_iteration_limit(1_000)
            .build();

        assert_eq!(*config.get_isolation(), IsolationMode::Process);
        assert_eq!(
            config.resolve_worker_program().unwrap(),
            PathBuf::from("/usr/bin/cauldron")
        );
        assert_eq!(config.script_limits().loop_iteration_limit, Some(1_000));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = EngineConfig::builder().channel_capacity(0).build();
        assert!(matches!(config.validate(), Err(CauldronError::InvalidConfig(_))));

        let config = EngineConfig::builder().timeout(Duration::ZERO).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_setters_chain() {
        let mut config = EngineConfig::default();
        config
            .set_isolation(IsolationMode::Process)
            .set_timeout(Some(Duration::from_secs(2)));

        assert_eq!(*config.get_isolation(), IsolationMode::Process);
        assert_eq!(*config.get_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("Process".parse::<IsolationMode>().unwrap(), IsolationMode::Process);
        assert!("vm".parse::<IsolationMode>().is_err());
        assert_eq!("normalized".parse::<KeyOrder>().unwrap(), KeyOrder::Normalized);
        assert!("loose".parse::<KeyOrder>().is_err());
    }
}
