use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub events_out: EventsOutConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Executable name or path. Relative paths are interpreted against the
    /// caller's working directory, not the script's.
    #[serde(default = "default_interpreter_path")]
    pub path: String,

    /// Options placed before the script target (`-u` keeps stdout unbuffered).
    #[serde(default = "default_interpreter_options")]
    pub options: Vec<String>,

    /// Run nested scripts as `-m package.module` from the caller's directory.
    #[serde(default)]
    pub module_mode: bool,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Fallback charset label for output that is not valid UTF-8.
    #[serde(default = "default_encoding")]
    pub encoding: String,

    #[serde(default)]
    pub stdout_delimiter: Option<String>,

    #[serde(default)]
    pub stderr_delimiter: Option<String>,
}

fn default_interpreter_path() -> String {
    "python3".to_string()
}

fn default_interpreter_options() -> Vec<String> {
    vec!["-u".to_string()]
}

fn default_encoding() -> String {
    "gbk".to_string()
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            path: default_interpreter_path(),
            options: default_interpreter_options(),
            module_mode: false,
            env: BTreeMap::new(),
            encoding: default_encoding(),
            stdout_delimiter: None,
            stderr_delimiter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_exit_grace_ms")]
    pub exit_grace_ms: u64,

    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
}

fn default_exit_grace_ms() -> u64 {
    5_000
}

fn default_stderr_tail_lines() -> usize {
    50
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            exit_grace_ms: default_exit_grace_ms(),
            stderr_tail_lines: default_stderr_tail_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsOutConfig {
    #[serde(default = "default_events_out_enabled")]
    pub enabled: bool,

    /// `stdout:` or a file path (appended).
    #[serde(default = "default_events_out_path")]
    pub path: String,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub drop_when_full: bool,
}

fn default_events_out_enabled() -> bool {
    true
}

fn default_events_out_path() -> String {
    "stdout:".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for EventsOutConfig {
    fn default() -> Self {
        Self {
            enabled: default_events_out_enabled(),
            path: default_events_out_path(),
            channel_capacity: default_channel_capacity(),
            drop_when_full: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// When set, logs go to a daily rolling file in this directory.
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}
