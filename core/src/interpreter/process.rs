use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{InterpreterError, SpawnError};

use super::decode::OutputDecoder;
use super::traceback::TracebackCollector;
use super::{InterpreterEvent, InterpreterFactory, InterpreterHandle, InterpreterOptions, ScriptSpec};

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const READ_BUF: usize = 8 * 1024;

pub struct ProcessInterpreterFactory;

#[async_trait]
impl InterpreterFactory for ProcessInterpreterFactory {
    async fn spawn(
        &self,
        script: &ScriptSpec,
        options: &InterpreterOptions,
    ) -> Result<Box<dyn InterpreterHandle>, SpawnError> {
        Ok(Box::new(ProcessInterpreter::spawn(script, options)?))
    }
}

#[derive(Clone)]
struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    cap: usize,
}

impl StderrTail {
    fn new(cap: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(cap))),
            cap,
        }
    }

    fn push(&self, line: &str) {
        if self.cap == 0 {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            if lines.len() == self.cap {
                lines.pop_front();
            }
            lines.push_back(line.to_string());
        }
    }

    fn snapshot(&self) -> String {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default()
    }
}

/// Interpreter subprocess with piped stdio.
///
/// stdout and stderr are pumped by background tasks into a single event
/// channel. The child is killed if the handle is dropped while running.
pub struct ProcessInterpreter {
    child: Child,
    stdin: Option<ChildStdin>,
    events: mpsc::Receiver<InterpreterEvent>,
    pumps: Vec<JoinHandle<()>>,
    stderr_tail: StderrTail,
    exit_code: Option<i32>,
    exit_reported: bool,
    killed: bool,
}

impl ProcessInterpreter {
    pub fn spawn(script: &ScriptSpec, options: &InterpreterOptions) -> Result<Self, SpawnError> {
        let program = options.interpreter.display().to_string();
        let args = options.command_args(script);

        let mut cmd = Command::new(&options.interpreter);
        cmd.args(&args)
            .current_dir(&script.working_dir)
            .envs(&options.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SpawnError::NotFound {
                    program: program.clone(),
                }
            } else {
                SpawnError::Io {
                    program: program.clone(),
                    source,
                }
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(SpawnError::MissingStdio { stream: "stdin" })?;
        let stdout = child
            .stdout
            .take()
            .ok_or(SpawnError::MissingStdio { stream: "stdout" })?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SpawnError::MissingStdio { stream: "stderr" })?;

        tracing::debug!(
            target: "scriptbridge.interpreter",
            program = %program,
            args = ?args,
            cwd = %script.working_dir.display(),
            pid = ?child.id(),
            "interpreter spawned"
        );

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let stderr_tail = StderrTail::new(options.stderr_tail_lines);
        let pumps = vec![
            pump_stdout(
                stdout,
                OutputDecoder::new(options.stdout_splitter.clone(), &options.encoding),
                tx.clone(),
            ),
            pump_stderr(
                stderr,
                OutputDecoder::new(options.stderr_splitter.clone(), &options.encoding),
                stderr_tail.clone(),
                tx,
            ),
        ];

        Ok(Self {
            child,
            stdin: Some(stdin),
            events: rx,
            pumps,
            stderr_tail,
            exit_code: None,
            exit_reported: false,
            killed: false,
        })
    }

    fn record_exit(&mut self, status: ExitStatus) -> i32 {
        let code = exit_code(status);
        self.exit_code = Some(code);
        code
    }
}

#[async_trait]
impl InterpreterHandle for ProcessInterpreter {
    async fn next_event(&mut self) -> Option<InterpreterEvent> {
        if let Some(event) = self.events.recv().await {
            return Some(event);
        }
        // Both pumps hit EOF; the exit is reported after all output.
        if self.exit_reported {
            return None;
        }
        self.exit_reported = true;
        match self.child.wait().await {
            Ok(status) => {
                let code = self.record_exit(status);
                Some(InterpreterEvent::Exited { code })
            }
            Err(source) => Some(InterpreterEvent::Error(InterpreterError::StreamIo {
                stream: "wait",
                source,
            })),
        }
    }

    async fn send(&mut self, message: &str) -> Result<(), InterpreterError> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            InterpreterError::Send(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin already closed",
            ))
        })?;
        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(InterpreterError::Send)?;
        if !message.ends_with('\n') {
            stdin.write_all(b"\n").await.map_err(InterpreterError::Send)?;
        }
        stdin.flush().await.map_err(InterpreterError::Send)
    }

    async fn end(&mut self) -> std::io::Result<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        // Undelivered output is drained and discarded from here on.
        self.events.close();
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        let status = self.child.wait().await?;
        Ok(self.record_exit(status))
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.events.close();
        self.stdin.take();
        self.child.kill().await?;
        self.killed = true;
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        Ok(())
    }

    fn terminated(&self) -> bool {
        self.killed || self.exit_code.is_some()
    }

    fn stderr_tail(&self) -> String {
        self.stderr_tail.snapshot()
    }
}

fn pump_stdout<R>(
    mut reader: R,
    mut decoder: OutputDecoder,
    tx: mpsc::Sender<InterpreterEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut sink = EventSink::new(tx);
        let mut buf = vec![0u8; READ_BUF];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for record in decoder.push(&buf[..n]) {
                        sink.send(InterpreterEvent::Message(record)).await;
                    }
                }
                Err(source) => {
                    sink.send(InterpreterEvent::Error(InterpreterError::StreamIo {
                        stream: "stdout",
                        source,
                    }))
                    .await;
                    return;
                }
            }
        }
        if let Some(rest) = decoder.finish() {
            sink.send(InterpreterEvent::Message(rest)).await;
        }
    })
}

fn pump_stderr<R>(
    mut reader: R,
    mut decoder: OutputDecoder,
    tail: StderrTail,
    tx: mpsc::Sender<InterpreterEvent>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut sink = EventSink::new(tx);
        let mut tracebacks = TracebackCollector::new();
        let mut buf = vec![0u8; READ_BUF];
        let mut records = Vec::new();
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => records.extend(decoder.push(&buf[..n])),
                Err(source) => {
                    sink.send(InterpreterEvent::Error(InterpreterError::StreamIo {
                        stream: "stderr",
                        source,
                    }))
                    .await;
                    return;
                }
            }
            for record in records.drain(..) {
                forward_stderr(&mut sink, &mut tracebacks, &tail, record).await;
            }
        }
        if let Some(rest) = decoder.finish() {
            forward_stderr(&mut sink, &mut tracebacks, &tail, rest).await;
        }
    })
}

async fn forward_stderr(
    sink: &mut EventSink,
    tracebacks: &mut TracebackCollector,
    tail: &StderrTail,
    record: String,
) {
    tail.push(&record);
    let traceback = tracebacks.observe(&record);
    sink.send(InterpreterEvent::Stderr(record)).await;
    if let Some(tb) = traceback {
        sink.send(InterpreterEvent::LogicError {
            exception: tb.exception,
            traceback: tb.traceback,
        })
        .await;
    }
}

/// Keeps reading after the receiver is gone so the child never blocks on a
/// full pipe.
struct EventSink {
    tx: mpsc::Sender<InterpreterEvent>,
    closed: bool,
}

impl EventSink {
    fn new(tx: mpsc::Sender<InterpreterEvent>) -> Self {
        Self { tx, closed: false }
    }

    async fn send(&mut self, event: InterpreterEvent) {
        if self.closed {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.closed = true;
        }
    }
}

/// Shell-style code: a signal death reports as `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status
            .code()
            .or_else(|| status.signal().map(|sig| 128 + sig))
            .unwrap_or(1)
    }
    #[cfg(not(unix))]
    {
        status.code().unwrap_or(1)
    }
}
