// # Process Line Source
//
// This crate provides the child-process line source for the tunnel DNS system.
//
// ## Architecture
//
// ```text
//            ┌── stdout ──▶ reader task ──┐
// child ─────┤                            ├──▶ bounded channel ──▶ LineStream
//            └── stderr ──▶ reader task ──┘
//
// supervisor task: logs the exit status, or kills the child once the
//                  LineStream is dropped
// ```
//
// The executable is started directly from its argument vector, never
// through a shell. The channel is bounded, so a loop busy with a DNS
// update stops draining the pipes and the tunnel blocks on its own writes.
//
// The stream ends when the child exits, even if a process it left behind
// still holds the pipes open: once the child is gone the readers deliver
// whatever output is already buffered and then stop.

use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use tunnel_dns_core::config::TunnelConfig;
use tunnel_dns_core::traits::{LineSource, LineSourceFactory, LineStream};
use tunnel_dns_core::{Error, Registry, Result};

/// Default number of lines buffered between the pipes and the loop
const DEFAULT_LINE_BUFFER: usize = 64;

/// Longest line forwarded in one piece; longer output is split
const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Time given to the reactor to surface output written just before exit
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Line source backed by a child process
#[derive(Debug, Clone)]
pub struct ProcessLineSource {
    /// Executable to run
    binary: String,

    /// Arguments, passed verbatim
    args: Vec<String>,

    /// Capacity of the line channel
    line_buffer: usize,
}

impl ProcessLineSource {
    /// Create a new process line source
    ///
    /// # Parameters
    ///
    /// - `binary`: Executable path, or a name looked up in PATH
    /// - `args`: Arguments passed without shell interpretation
    pub fn new(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
            line_buffer: DEFAULT_LINE_BUFFER,
        }
    }

    /// Set the number of lines buffered ahead of the loop
    pub fn with_line_buffer(mut self, line_buffer: usize) -> Self {
        self.line_buffer = line_buffer.max(1);
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl LineSource for ProcessLineSource {
    async fn spawn(&self) -> Result<LineStream> {
        let mut child = self.command().spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::binary_not_found(&self.binary),
            _ => Error::line_source(format!("Failed to launch {}: {}", self.binary, e)),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::line_source("Tunnel stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::line_source("Tunnel stderr was not captured"))?;

        info!(
            "🚀 Started tunnel {} (pid {})",
            self.binary,
            child
                .id()
                .map(|pid| pid.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        let (line_tx, line_rx) = mpsc::channel(self.line_buffer);
        let (exited_tx, exited_rx) = watch::channel(false);
        tokio::spawn(forward_lines(
            stdout,
            line_tx.clone(),
            exited_rx.clone(),
            "stdout",
        ));
        tokio::spawn(forward_lines(stderr, line_tx, exited_rx, "stderr"));

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(supervise(child, stop_rx, exited_tx, self.binary.clone()));

        Ok(Box::pin(ProcessLines {
            lines: ReceiverStream::new(line_rx),
            _stop: stop_tx,
        }))
    }

    fn source_name(&self) -> &str {
        &self.binary
    }
}

/// Merged output of one child process
///
/// Dropping it drops `_stop`, which tells the supervisor to kill the child.
struct ProcessLines {
    lines: ReceiverStream<String>,
    _stop: oneshot::Sender<()>,
}

impl Stream for ProcessLines {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        Pin::new(&mut self.lines).poll_next(cx)
    }
}

/// Push every line of `pipe` into `tx` until EOF, until the loop is gone,
/// or until the child has exited and no more output is immediately readable
///
/// Lines longer than [`MAX_LINE_BYTES`] are forwarded in pieces.
async fn forward_lines<R>(
    pipe: R,
    tx: mpsc::Sender<String>,
    mut exited: watch::Receiver<bool>,
    pipe_name: &'static str,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE_BYTES);

        let read = tokio::select! {
            biased;
            read = limited.read_until(b'\n', &mut buf) => read,
            _ = async {
                let _ = exited.wait_for(|gone| *gone).await;
            } => {
                if !buf.is_empty() {
                    let _ = tx.send(decode_line(&buf)).await;
                }
                debug!("Tunnel exited, no longer reading its {}", pipe_name);
                return;
            }
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(decode_line(&buf)).await.is_err() {
                    debug!("Line stream dropped, no longer reading tunnel {}", pipe_name);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to read tunnel {}: {}", pipe_name, e);
                break;
            }
        }
    }

    debug!("Tunnel {} closed", pipe_name);
}

/// Wait for the child to exit, or kill it when asked to stop
///
/// Either way the readers are told the child is gone afterwards.
async fn supervise(
    mut child: Child,
    stop_rx: oneshot::Receiver<()>,
    exited_tx: watch::Sender<bool>,
    binary: String,
) {
    tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => info!("Tunnel {} exited: {}", binary, status),
                Err(e) => warn!("Failed to wait for tunnel {}: {}", binary, e),
            }
            tokio::time::sleep(EXIT_DRAIN_GRACE).await;
        }
        _ = stop_rx => {
            debug!("Stopping tunnel {}", binary);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill tunnel {}: {}", binary, e);
            }
        }
    }

    let _ = exited_tx.send(true);
}

/// Decode one raw line, replacing invalid UTF-8 and dropping the line ending
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(|c: char| c == '\n' || c == '\r')
        .to_string()
}

/// Factory for creating process line sources
pub struct ProcessFactory;

impl LineSourceFactory for ProcessFactory {
    fn create(&self, config: &TunnelConfig) -> Result<Box<dyn LineSource>> {
        match config {
            TunnelConfig::Process {
                binary,
                args,
                line_buffer,
            } => {
                if binary.trim().is_empty() {
                    return Err(Error::config("Tunnel binary is required"));
                }

                Ok(Box::new(
                    ProcessLineSource::new(binary.clone(), args.clone())
                        .with_line_buffer(*line_buffer),
                ))
            }
            _ => Err(Error::config("Invalid config for process line source")),
        }
    }
}

/// Register the process line source with a registry
pub fn register(registry: &Registry) {
    registry.register_line_source("process", Box::new(ProcessFactory));
}
