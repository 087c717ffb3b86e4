//! Interpreter lifecycle: spawn, event wiring, outcome gating, termination.

mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::{ControlConfig, InterpreterConfig};
use crate::context::{ArgumentMap, Outcome, RunContext};
use crate::error::{InterpreterError, RunError, ShutdownError, SpawnError};
use crate::interpreter::{
    InterpreterEvent, InterpreterFactory, InterpreterHandle, InterpreterOptions, ScriptSpec,
};
use crate::notify::UiNotifier;
use crate::responder::{Responder, RuleTable};
use crate::script_path::resolve_script;

pub use state::{InvalidTransition, SessionMachine, SessionState};

/// What to run and from where.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub script: PathBuf,
    pub cwd: PathBuf,
    /// Positional arguments handed to the script.
    pub argv: Vec<String>,
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub result: Result<Option<Value>, RunError>,
    pub history: Vec<String>,
    pub trail: Vec<SessionState>,
}

enum Step {
    Event(Option<InterpreterEvent>),
    Cancelled,
    CancelDropped,
}

/// Owns one interpreter session. Consumed by `run`, so it is never reused.
pub struct Communicator {
    run_id: String,
    rules: Arc<RuleTable>,
    notifier: Arc<dyn UiNotifier>,
    interpreter: InterpreterConfig,
    control: ControlConfig,
    machine: SessionMachine,
}

impl Communicator {
    pub fn new(
        run_id: impl Into<String>,
        rules: Arc<RuleTable>,
        notifier: Arc<dyn UiNotifier>,
        interpreter: InterpreterConfig,
        control: ControlConfig,
    ) -> Self {
        let run_id = run_id.into();
        Self {
            machine: SessionMachine::new(run_id.clone()),
            run_id,
            rules,
            notifier,
            interpreter,
            control,
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub async fn run(
        self,
        factory: &dyn InterpreterFactory,
        request: ScriptRequest,
        args: ArgumentMap,
    ) -> Result<Option<Value>, RunError> {
        self.run_to_report(factory, request, args, None).await.result
    }

    /// Like [`Communicator::run`], but a message on `cancel` fails the run
    /// with [`RunError::Cancelled`] and kills the interpreter.
    pub async fn run_with_cancel(
        self,
        factory: &dyn InterpreterFactory,
        request: ScriptRequest,
        args: ArgumentMap,
        cancel: oneshot::Receiver<()>,
    ) -> RunReport {
        self.run_to_report(factory, request, args, Some(cancel)).await
    }

    pub async fn run_to_report(
        mut self,
        factory: &dyn InterpreterFactory,
        request: ScriptRequest,
        args: ArgumentMap,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> RunReport {
        tracing::info!(
            target: "scriptbridge.communicator",
            run_id = %self.run_id,
            script = %request.script.display(),
            cwd = %request.cwd.display(),
            "run started"
        );
        let mut ctx = RunContext::new(Arc::new(args));

        self.transition(SessionState::Spawning);
        let mut handle = match self.spawn(factory, &request).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::error!(
                    target: "scriptbridge.communicator",
                    run_id = %self.run_id,
                    error = %err,
                    "interpreter spawn failed"
                );
                // Nothing was started, so there is nothing to kill.
                self.transition(SessionState::ErrorSignaled);
                self.transition(SessionState::Terminating);
                self.transition(SessionState::Terminated);
                let (history, _) = ctx.into_parts();
                return self.finish(history, Err(err.into()));
            }
        };

        self.transition(SessionState::Communicating);
        let responder = Responder::new(self.rules.clone(), self.notifier.clone());
        self.communicate(handle.as_mut(), &mut ctx, &responder, cancel)
            .await;

        let (history, outcome) = ctx.into_parts();
        let outcome = outcome.unwrap_or_else(|| {
            Outcome::Failure(
                InterpreterError::Reported("event loop ended without an outcome".into()).into(),
            )
        });

        let result = match outcome {
            Outcome::Success(value) => {
                self.transition(SessionState::ExitSignaled);
                self.transition(SessionState::Terminating);
                // A failed shutdown replaces the success value.
                self.shutdown_gracefully(handle.as_mut()).await.map(|()| value)
            }
            Outcome::Failure(err) => {
                self.transition(SessionState::ErrorSignaled);
                self.transition(SessionState::Terminating);
                self.force_kill(handle.as_mut()).await;
                Err(err)
            }
        };
        self.transition(SessionState::Terminated);
        self.finish(history, result)
    }

    async fn spawn(
        &self,
        factory: &dyn InterpreterFactory,
        request: &ScriptRequest,
    ) -> Result<Box<dyn InterpreterHandle>, SpawnError> {
        let resolved = resolve_script(&request.script, &request.cwd, &self.interpreter)?;
        let spec = ScriptSpec::from_resolved(&resolved, request.argv.clone());
        let options = InterpreterOptions::from_config(
            &self.interpreter,
            &self.control,
            resolved.interpreter.clone(),
        );
        factory.spawn(&spec, &options).await
    }

    async fn communicate(
        &self,
        handle: &mut dyn InterpreterHandle,
        ctx: &mut RunContext,
        responder: &Responder,
        mut cancel: Option<oneshot::Receiver<()>>,
    ) {
        while !ctx.has_outcome() {
            let step = match cancel.as_mut() {
                Some(rx) => tokio::select! {
                    biased;
                    res = rx => if res.is_ok() { Step::Cancelled } else { Step::CancelDropped },
                    event = handle.next_event() => Step::Event(event),
                },
                None => Step::Event(handle.next_event().await),
            };

            match step {
                Step::Event(event) => self.on_event(event, handle, ctx, responder).await,
                Step::Cancelled => {
                    tracing::warn!(
                        target: "scriptbridge.communicator",
                        run_id = %self.run_id,
                        "run cancelled by caller"
                    );
                    cancel = None;
                    ctx.record_failure(RunError::Cancelled);
                }
                Step::CancelDropped => cancel = None,
            }
        }
    }

    async fn on_event(
        &self,
        event: Option<InterpreterEvent>,
        handle: &mut dyn InterpreterHandle,
        ctx: &mut RunContext,
        responder: &Responder,
    ) {
        match event {
            Some(InterpreterEvent::Message(text)) => {
                if let Err(err) = responder.respond_to_message(&text, ctx) {
                    ctx.record_failure(err.into());
                }
                self.flush_outbox(handle, ctx).await;
            }
            Some(InterpreterEvent::Stderr(line)) => {
                tracing::warn!(
                    target: "scriptbridge.interpreter",
                    run_id = %self.run_id,
                    line = %line,
                    "interpreter stderr"
                );
            }
            Some(InterpreterEvent::Error(err)) => {
                tracing::error!(
                    target: "scriptbridge.communicator",
                    run_id = %self.run_id,
                    error = %err,
                    "interpreter error"
                );
                ctx.record_failure(err.into());
            }
            Some(InterpreterEvent::LogicError {
                exception,
                traceback,
            }) => {
                tracing::error!(
                    target: "scriptbridge.communicator",
                    run_id = %self.run_id,
                    exception = %exception,
                    "interpreter logic error"
                );
                ctx.record_failure(
                    InterpreterError::Logic {
                        exception,
                        traceback,
                    }
                    .into(),
                );
            }
            Some(InterpreterEvent::Exited { code }) => {
                ctx.record_failure(InterpreterError::UnexpectedExit { code }.into());
            }
            None => {
                ctx.record_failure(
                    InterpreterError::Reported("interpreter event stream closed".into()).into(),
                );
            }
        }
    }

    /// Write lines queued by callbacks. Dropped once the run has failed.
    async fn flush_outbox(&self, handle: &mut dyn InterpreterHandle, ctx: &mut RunContext) {
        let pending = ctx.drain_outbox();
        if pending.is_empty() {
            return;
        }
        if matches!(ctx.outcome(), Some(Outcome::Failure(_))) {
            tracing::debug!(
                target: "scriptbridge.communicator",
                run_id = %self.run_id,
                dropped = pending.len(),
                "run failed, queued messages not sent"
            );
            return;
        }
        for line in pending {
            if let Err(err) = handle.send(&line).await {
                tracing::warn!(
                    target: "scriptbridge.communicator",
                    run_id = %self.run_id,
                    error = %err,
                    "send to interpreter failed"
                );
                ctx.record_failure(err.into());
                return;
            }
        }
    }

    /// Ask the interpreter to finish. If it outlives the grace period it is
    /// killed, so a timed-out shutdown signals the process twice.
    async fn shutdown_gracefully(&self, handle: &mut dyn InterpreterHandle) -> Result<(), RunError> {
        if handle.terminated() {
            tracing::debug!(
                target: "scriptbridge.communicator",
                run_id = %self.run_id,
                "interpreter already exited"
            );
            return Ok(());
        }

        let grace_ms = self.control.exit_grace_ms;
        let waited = tokio::time::timeout(Duration::from_millis(grace_ms), handle.end()).await;
        match waited {
            Ok(Ok(0)) => Ok(()),
            Ok(Ok(code)) => Err(ShutdownError::NonZeroExit {
                code,
                stderr_tail: handle.stderr_tail(),
            }
            .into()),
            Ok(Err(e)) => Err(ShutdownError::Wait(e).into()),
            Err(_) => {
                tracing::warn!(
                    target: "scriptbridge.communicator",
                    run_id = %self.run_id,
                    grace_ms,
                    "interpreter did not exit in time, killing"
                );
                if let Err(e) = handle.kill().await {
                    tracing::warn!(
                        target: "scriptbridge.communicator",
                        run_id = %self.run_id,
                        error = %e,
                        "kill after grace timeout failed"
                    );
                }
                Err(ShutdownError::Timeout { grace_ms }.into())
            }
        }
    }

    async fn force_kill(&self, handle: &mut dyn InterpreterHandle) {
        if handle.terminated() {
            tracing::debug!(
                target: "scriptbridge.communicator",
                run_id = %self.run_id,
                "interpreter already terminated, not killing"
            );
            return;
        }
        if let Err(e) = handle.kill().await {
            tracing::warn!(
                target: "scriptbridge.communicator",
                run_id = %self.run_id,
                error = %e,
                "kill failed"
            );
        }
    }

    fn transition(&mut self, next: SessionState) {
        let advanced = self.machine.advance(next);
        debug_assert!(advanced.is_ok(), "invalid session transition: {advanced:?}");
    }

    fn finish(self, history: Vec<String>, result: Result<Option<Value>, RunError>) -> RunReport {
        match &result {
            Ok(value) => tracing::info!(
                target: "scriptbridge.communicator",
                run_id = %self.run_id,
                value = ?value,
                "run succeeded"
            ),
            Err(err) => tracing::error!(
                target: "scriptbridge.communicator",
                run_id = %self.run_id,
                kind = err.kind(),
                error = %err,
                "run failed"
            ),
        }
        RunReport {
            run_id: self.run_id,
            result,
            history,
            trail: self.machine.trail().to_vec(),
        }
    }
}
