//! Interpreter handle abstraction and the subprocess-backed implementation.

mod decode;
mod process;
mod traceback;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::{ControlConfig, InterpreterConfig};
use crate::error::{InterpreterError, SpawnError};
use crate::script_path::{ResolvedScript, ScriptTarget};

pub use decode::{decode_bytes, OutputDecoder, Splitter};
pub use process::{ProcessInterpreter, ProcessInterpreterFactory};
pub use traceback::{PythonTraceback, TracebackCollector};

/// Events delivered by a running interpreter, in production order per stream.
#[derive(Debug)]
pub enum InterpreterEvent {
    /// One decoded stdout record.
    Message(String),
    /// One decoded stderr record (raw-error channel).
    Stderr(String),
    Error(InterpreterError),
    LogicError { exception: String, traceback: String },
    /// The process exited on its own. Delivered once, after all output.
    Exited { code: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub target: ScriptTarget,
    pub working_dir: PathBuf,
    pub args: Vec<String>,
}

impl ScriptSpec {
    pub fn from_resolved(resolved: &ResolvedScript, args: Vec<String>) -> Self {
        Self {
            target: resolved.target.clone(),
            working_dir: resolved.working_dir.clone(),
            args,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    pub interpreter: PathBuf,
    pub options: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub encoding: String,
    pub stdout_splitter: Splitter,
    pub stderr_splitter: Splitter,
    pub stderr_tail_lines: usize,
}

impl InterpreterOptions {
    pub fn from_config(
        cfg: &InterpreterConfig,
        control: &ControlConfig,
        interpreter: PathBuf,
    ) -> Self {
        Self {
            interpreter,
            options: cfg.options.clone(),
            env: cfg.env.clone(),
            encoding: cfg.encoding.clone(),
            stdout_splitter: Splitter::from_option(cfg.stdout_delimiter.as_deref()),
            stderr_splitter: Splitter::from_option(cfg.stderr_delimiter.as_deref()),
            stderr_tail_lines: control.stderr_tail_lines,
        }
    }

    /// Full argument vector passed after the executable.
    pub fn command_args(&self, script: &ScriptSpec) -> Vec<String> {
        let mut args = self.options.clone();
        match &script.target {
            ScriptTarget::File(path) => args.push(path.display().to_string()),
            ScriptTarget::Module(module) => {
                args.push("-m".to_string());
                args.push(module.clone());
            }
        }
        args.extend(script.args.iter().cloned());
        args
    }
}

/// A running interpreter, exclusively owned by one run.
#[async_trait]
pub trait InterpreterHandle: Send {
    /// Next event, or `None` once the process has exited and all output was
    /// delivered.
    async fn next_event(&mut self) -> Option<InterpreterEvent>;

    /// Write one newline-terminated message to stdin.
    async fn send(&mut self, message: &str) -> Result<(), InterpreterError>;

    /// Close stdin and wait for a natural exit; returns the exit code.
    async fn end(&mut self) -> std::io::Result<i32>;

    async fn kill(&mut self) -> std::io::Result<()>;

    fn terminated(&self) -> bool;

    /// Last stderr lines, for error reports.
    fn stderr_tail(&self) -> String {
        String::new()
    }
}

#[async_trait]
pub trait InterpreterFactory: Send + Sync {
    async fn spawn(
        &self,
        script: &ScriptSpec,
        options: &InterpreterOptions,
    ) -> Result<Box<dyn InterpreterHandle>, SpawnError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_args_for_module_target() {
        let opts = InterpreterOptions::from_config(
            &InterpreterConfig::default(),
            &ControlConfig::default(),
            PathBuf::from("python3"),
        );
        let spec = ScriptSpec {
            target: ScriptTarget::Module("logic.main".into()),
            working_dir: PathBuf::from("/app"),
            args: vec!["--fast".into()],
        };
        assert_eq!(opts.command_args(&spec), vec!["-u", "-m", "logic.main", "--fast"]);
    }

    #[test]
    fn command_args_for_file_target() {
        let mut cfg = InterpreterConfig::default();
        cfg.options.clear();
        let opts =
            InterpreterOptions::from_config(&cfg, &ControlConfig::default(), PathBuf::from("sh"));
        let spec = ScriptSpec {
            target: ScriptTarget::File(PathBuf::from("run.sh")),
            working_dir: PathBuf::from("/tmp"),
            args: vec![],
        };
        assert_eq!(opts.command_args(&spec), vec!["run.sh"]);
    }
}
