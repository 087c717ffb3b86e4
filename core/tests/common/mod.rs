//! Scripted interpreter doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scriptbridge_core::api::{
    InterpreterError, InterpreterEvent, InterpreterFactory, InterpreterHandle, InterpreterOptions,
    ScriptSpec, SpawnError,
};

/// What the fake observed; shared with the test after the handle is moved.
#[derive(Debug, Default)]
pub struct Observed {
    pub sent: Vec<String>,
    pub ends: usize,
    pub kills: usize,
    pub spec: Option<ScriptSpec>,
    pub interpreter: Option<std::path::PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBehavior {
    Exit(i32),
    WaitError,
    Hang,
}

pub struct FakeInterpreter {
    events: VecDeque<InterpreterEvent>,
    observed: Arc<Mutex<Observed>>,
    end: EndBehavior,
    /// Block forever once the script is exhausted, like a live process.
    stay_alive: bool,
    terminated: bool,
    exit_on_sentinel: bool,
}

impl FakeInterpreter {
    pub fn new(events: Vec<InterpreterEvent>) -> (Self, Arc<Mutex<Observed>>) {
        let observed = Arc::new(Mutex::new(Observed::default()));
        (
            Self {
                events: events.into(),
                observed: observed.clone(),
                end: EndBehavior::Exit(0),
                stay_alive: true,
                terminated: false,
                exit_on_sentinel: false,
            },
            observed,
        )
    }

    pub fn end_behavior(mut self, end: EndBehavior) -> Self {
        self.end = end;
        self
    }

    /// Report the process as gone by the time the sentinel was read.
    pub fn exits_with_sentinel(mut self) -> Self {
        self.exit_on_sentinel = true;
        self
    }
}

#[async_trait]
impl InterpreterHandle for FakeInterpreter {
    async fn next_event(&mut self) -> Option<InterpreterEvent> {
        match self.events.pop_front() {
            Some(event) => {
                match &event {
                    InterpreterEvent::Exited { .. } => self.terminated = true,
                    InterpreterEvent::Message(m)
                        if self.exit_on_sentinel && m.trim() == "__EXITING__" =>
                    {
                        self.terminated = true
                    }
                    _ => {}
                }
                Some(event)
            }
            None if self.stay_alive => std::future::pending().await,
            None => None,
        }
    }

    async fn send(&mut self, message: &str) -> Result<(), InterpreterError> {
        self.observed.lock().unwrap().sent.push(message.to_string());
        Ok(())
    }

    async fn end(&mut self) -> std::io::Result<i32> {
        self.observed.lock().unwrap().ends += 1;
        match self.end {
            EndBehavior::Exit(code) => {
                self.terminated = true;
                Ok(code)
            }
            EndBehavior::WaitError => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "wait failed",
            )),
            EndBehavior::Hang => std::future::pending().await,
        }
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.observed.lock().unwrap().kills += 1;
        self.terminated = true;
        Ok(())
    }

    fn terminated(&self) -> bool {
        self.terminated
    }

    fn stderr_tail(&self) -> String {
        "Traceback (most recent call last):\nRuntimeError: late".to_string()
    }
}

/// Hands out one prepared interpreter, or a spawn error.
pub struct FakeFactory {
    interpreter: Mutex<Option<FakeInterpreter>>,
    observed: Arc<Mutex<Observed>>,
    fail: bool,
}

impl FakeFactory {
    pub fn new(interpreter: FakeInterpreter, observed: Arc<Mutex<Observed>>) -> Self {
        Self {
            interpreter: Mutex::new(Some(interpreter)),
            observed,
            fail: false,
        }
    }

    pub fn failing() -> (Self, Arc<Mutex<Observed>>) {
        let observed = Arc::new(Mutex::new(Observed::default()));
        (
            Self {
                interpreter: Mutex::new(None),
                observed: observed.clone(),
                fail: true,
            },
            observed,
        )
    }
}

#[async_trait]
impl InterpreterFactory for FakeFactory {
    async fn spawn(
        &self,
        script: &ScriptSpec,
        options: &InterpreterOptions,
    ) -> Result<Box<dyn InterpreterHandle>, SpawnError> {
        {
            let mut observed = self.observed.lock().unwrap();
            observed.spec = Some(script.clone());
            observed.interpreter = Some(options.interpreter.clone());
        }
        if self.fail {
            return Err(SpawnError::NotFound {
                program: options.interpreter.display().to_string(),
            });
        }
        let interpreter = self
            .interpreter
            .lock()
            .unwrap()
            .take()
            .expect("fake factory spawned twice");
        Ok(Box::new(interpreter))
    }
}

pub fn message(text: &str) -> InterpreterEvent {
    InterpreterEvent::Message(text.to_string())
}
