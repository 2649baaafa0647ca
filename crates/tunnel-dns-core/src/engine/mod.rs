//! Reconciliation loop
//!
//! The ReconciliationLoop is responsible for:
//! - Launching the tunnel via LineSource
//! - Extracting announced endpoints from its output
//! - Filtering out hosts that were already synchronized
//! - Updating the DNS record via DnsUpdater
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ LineSource  │─── line ───┐
//! └─────────────┘            │
//!                            ▼
//!                 ┌─────────────────────┐
//!                 │ ReconciliationLoop  │
//!                 └─────────────────────┘
//!                            │
//!         ┌──────────────────┼──────────────────┐
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  SeenHosts   │   │  DnsUpdater  │   │   Events    │
//! │  (filter)    │   │  (update)    │   │  (notify)   │
//! └──────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! ## State Machine
//!
//! ```text
//! AwaitLine ─▶ Parse ─┬─ no endpoint ───────────────▶ AwaitLine
//!                     ├─ host already seen ─────────▶ AwaitLine
//!                     └─ new host ─▶ UpdateDNS ─────▶ AwaitLine
//! ```
//!
//! Lines are handled strictly one at a time: while a DNS update is in
//! flight the line stream is not polled, so the tunnel's output backs up
//! into the line source buffer and the pipe behind it.

use crate::config::{EngineConfig, ExitPolicy};
use crate::endpoint::{Endpoint, extract_endpoint};
use crate::error::{Error, Result};
use crate::state::SeenHosts;
use crate::traits::{DnsUpdater, LineSource, LineStream, UpdateOutcome};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, trace, warn};

/// Events emitted by the ReconciliationLoop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Loop started
    Started {
        source: String,
        record_name: String,
    },

    /// A tunnel instance is running and its output is being read
    TunnelStarted { attempt: usize },

    /// A host not seen before was announced
    EndpointDiscovered { endpoint: Endpoint },

    /// An already synchronized host was announced again
    DuplicateSuppressed { exposed_host: String },

    /// DNS update succeeded
    UpdateSucceeded { endpoint: Endpoint },

    /// DNS update failed (not retried)
    UpdateFailed {
        endpoint: Endpoint,
        status: Option<u16>,
        error: String,
    },

    /// The tunnel closed its output
    TunnelExited { attempt: usize },

    /// Loop stopped
    Stopped { reason: String },
}

/// What happened to a single line of tunnel output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The line is not an endpoint announcement
    NoMatch,
    /// The host was already synchronized
    Duplicate { exposed_host: String },
    /// The DNS record now points at the endpoint
    Updated { endpoint: Endpoint },
    /// The DNS update failed
    UpdateFailed {
        endpoint: Endpoint,
        status: Option<u16>,
        error: String,
    },
}

/// How reading from one tunnel instance ended
enum StreamEnd {
    Closed,
    Shutdown,
}

/// Reconciliation loop
///
/// Converts the tunnel's line stream into at-most-once DNS updates per
/// exposed host. The loop owns its [`SeenHosts`] exclusively, so two loop
/// instances never share deduplication state.
///
/// ## Lifecycle
///
/// 1. Create with [`ReconciliationLoop::new()`]
/// 2. Start with [`ReconciliationLoop::run()`]
/// 3. Runs until shutdown or until the tunnel exits under [`ExitPolicy::Terminate`]
pub struct ReconciliationLoop {
    /// Launches the tunnel and yields its output
    source: Box<dyn LineSource>,

    /// Rewrites the DNS record
    updater: Box<dyn DnsUpdater>,

    /// Hosts already handed to the updater
    seen: SeenHosts,

    /// Behaviour when the tunnel closes its output
    exit_policy: ExitPolicy,

    /// Delay before relaunching the tunnel
    restart_delay: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<LoopEvent>,
}

impl ReconciliationLoop {
    /// Create a new reconciliation loop
    ///
    /// # Returns
    ///
    /// A tuple of (loop, event_receiver) where event_receiver yields loop events
    pub fn new(
        source: Box<dyn LineSource>,
        updater: Box<dyn DnsUpdater>,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<LoopEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            source,
            updater,
            seen: SeenHosts::new(),
            exit_policy: config.on_tunnel_exit,
            restart_delay: Duration::from_secs(config.restart_delay_secs),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Hosts synchronized so far
    pub fn seen_hosts(&self) -> &SeenHosts {
        &self.seen
    }

    /// Run the loop
    ///
    /// Launches the tunnel and processes its output until Ctrl-C is
    /// received or the tunnel exits under [`ExitPolicy::Terminate`].
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shutdown signal received
    /// - `Err(Error::BinaryNotFound)`: The tunnel executable is missing
    /// - `Err(Error::TunnelExited)`: The tunnel closed its output
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the loop with a programmatic shutdown signal
    ///
    /// Identical to [`run()`](Self::run) except that shutdown is triggered
    /// by `shutdown_rx` instead of Ctrl-C. Used by tests and embedders.
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        // One listener for the whole run, so a signal that arrives while an
        // update is in flight is still seen afterwards
        let shutdown = wait_for_shutdown(shutdown_rx);
        tokio::pin!(shutdown);

        let source_name = self.source.source_name().to_string();
        self.emit_event(LoopEvent::Started {
            source: source_name.clone(),
            record_name: self.updater.record_name().to_string(),
        });

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut lines = match self.source.spawn().await {
                Ok(lines) => lines,
                Err(e) => {
                    error!("Failed to launch tunnel {}: {}", source_name, e);
                    self.emit_event(LoopEvent::Stopped {
                        reason: e.to_string(),
                    });
                    return Err(e);
                }
            };

            info!(
                "Tunnel {} running (attempt {}), watching for endpoints to sync to {}",
                source_name,
                attempt,
                self.updater.record_name()
            );
            self.emit_event(LoopEvent::TunnelStarted { attempt });

            let end = self.consume(&mut lines, &mut shutdown).await;
            drop(lines);

            if let StreamEnd::Shutdown = end {
                info!("Shutdown signal received");
                self.emit_event(LoopEvent::Stopped {
                    reason: "Shutdown signal".to_string(),
                });
                return Ok(());
            }

            warn!("Tunnel {} closed its output", source_name);
            self.emit_event(LoopEvent::TunnelExited { attempt });

            match self.exit_policy {
                ExitPolicy::Terminate => {
                    self.emit_event(LoopEvent::Stopped {
                        reason: "Tunnel exited".to_string(),
                    });
                    return Err(Error::tunnel_exited(format!(
                        "{} closed its output after {} synchronized endpoint(s)",
                        source_name,
                        self.seen.len()
                    )));
                }
                ExitPolicy::Restart => {
                    info!("Relaunching tunnel in {:?}", self.restart_delay);
                    tokio::select! {
                        biased;
                        _ = shutdown.as_mut() => {
                            info!("Shutdown signal received");
                            self.emit_event(LoopEvent::Stopped {
                                reason: "Shutdown signal".to_string(),
                            });
                            return Ok(());
                        }
                        _ = tokio::time::sleep(self.restart_delay) => {}
                    }
                }
            }
        }
    }

    /// Feed every line of one tunnel instance through [`process_line`](Self::process_line)
    ///
    /// A pending shutdown is checked before every line.
    async fn consume<F>(&mut self, lines: &mut LineStream, shutdown: &mut Pin<&mut F>) -> StreamEnd
    where
        F: Future<Output = ()>,
    {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.as_mut() => return StreamEnd::Shutdown,
                line = lines.next() => match line {
                    Some(line) => {
                        self.process_line(&line).await;
                    }
                    None => return StreamEnd::Closed,
                },
            }
        }
    }

    /// Run one line through the state machine
    ///
    /// Extracts an endpoint, filters it through the reconciliation state
    /// and, for a new host, performs the DNS update. Update failures are
    /// reported in the returned outcome and never propagated: the host
    /// stays recorded as seen and is not retried.
    pub async fn process_line(&mut self, line: &str) -> LineOutcome {
        trace!("tunnel: {}", line);

        let Some(endpoint) = extract_endpoint(line) else {
            return LineOutcome::NoMatch;
        };

        if !self.seen.should_process(&endpoint.exposed_host) {
            debug!(
                "Endpoint {} already synchronized, ignoring",
                endpoint.exposed_host
            );
            self.emit_event(LoopEvent::DuplicateSuppressed {
                exposed_host: endpoint.exposed_host.clone(),
            });
            return LineOutcome::Duplicate {
                exposed_host: endpoint.exposed_host,
            };
        }

        info!(
            "🚀 Updating DNS record {}: target={} port={}",
            self.updater.record_name(),
            endpoint.exposed_host,
            endpoint.local_port
        );
        self.emit_event(LoopEvent::EndpointDiscovered {
            endpoint: endpoint.clone(),
        });

        let (status, error) = match self.updater.update_endpoint(&endpoint).await {
            Ok(UpdateOutcome::Applied) => {
                info!(
                    "✅ DNS record {} updated successfully: {}",
                    self.updater.record_name(),
                    endpoint
                );
                self.emit_event(LoopEvent::UpdateSucceeded {
                    endpoint: endpoint.clone(),
                });
                return LineOutcome::Updated { endpoint };
            }
            Ok(UpdateOutcome::Rejected { status, body }) => {
                error!(
                    "❌ Failed to update DNS record {}: {}",
                    self.updater.record_name(),
                    status
                );
                error!("{}", body);
                (Some(status), body)
            }
            Err(e) => {
                error!(
                    "❌ Failed to update DNS record {}: {}",
                    self.updater.record_name(),
                    e
                );
                (None, e.to_string())
            }
        };

        self.emit_event(LoopEvent::UpdateFailed {
            endpoint: endpoint.clone(),
            status,
            error: error.clone(),
        });
        LineOutcome::UpdateFailed {
            endpoint,
            status,
            error,
        }
    }

    /// Emit a loop event
    fn emit_event(&self, event: LoopEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, event discarded");
            }
        }
    }
}

/// Resolve once shutdown is requested
///
/// Uses the programmatic channel when one is given, Ctrl-C otherwise.
/// Must be polled at most once to completion.
async fn wait_for_shutdown(shutdown_rx: Option<oneshot::Receiver<()>>) {
    match shutdown_rx {
        Some(rx) => {
            let _ = rx.await;
        }
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
