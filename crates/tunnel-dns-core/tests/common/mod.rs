//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal line sources and DNS updaters that record
//! how the reconciliation loop drives them.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tunnel_dns_core::config::{EngineConfig, ExitPolicy};
use tunnel_dns_core::error::{Error, Result};
use tunnel_dns_core::traits::{DnsUpdater, LineSource, LineStream, UpdateOutcome};
use tunnel_dns_core::Endpoint;

/// A line source that replays scripted output, one script per launch
///
/// Launches beyond the scripted ones produce a tunnel that stays silent
/// and never exits, unless the binary is set to vanish after them.
pub struct ScriptedLineSource {
    runs: Arc<std::sync::Mutex<VecDeque<Vec<String>>>>,
    spawn_count: Arc<AtomicUsize>,
    missing_binary: bool,
    missing_after_runs: bool,
}

impl ScriptedLineSource {
    /// A tunnel that prints `lines` once and exits
    pub fn new(lines: &[&str]) -> Self {
        Self::with_runs(&[lines])
    }

    /// A tunnel that prints `runs[n]` on its n-th launch
    pub fn with_runs(runs: &[&[&str]]) -> Self {
        let runs = runs
            .iter()
            .map(|run| run.iter().map(|line| line.to_string()).collect())
            .collect();
        Self {
            runs: Arc::new(std::sync::Mutex::new(runs)),
            spawn_count: Arc::new(AtomicUsize::new(0)),
            missing_binary: false,
            missing_after_runs: false,
        }
    }

    /// A tunnel that prints `runs[n]` on its n-th launch, after which its
    /// executable disappears
    pub fn with_runs_then_missing_binary(runs: &[&[&str]]) -> Self {
        Self {
            missing_after_runs: true,
            ..Self::with_runs(runs)
        }
    }

    /// A tunnel whose executable does not exist
    pub fn missing_binary() -> Self {
        Self {
            missing_binary: true,
            ..Self::with_runs(&[])
        }
    }

    /// Create a new ScriptedLineSource that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            runs: Arc::clone(&other.runs),
            spawn_count: Arc::clone(&other.spawn_count),
            missing_binary: other.missing_binary,
            missing_after_runs: other.missing_after_runs,
        }
    }

    /// Get the number of times spawn() was called
    pub fn spawn_count(&self) -> usize {
        self.spawn_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LineSource for ScriptedLineSource {
    async fn spawn(&self) -> Result<LineStream> {
        self.spawn_count.fetch_add(1, Ordering::SeqCst);

        if self.missing_binary {
            return Err(Error::binary_not_found("./playit-linux-amd64"));
        }

        match self.runs.lock().unwrap().pop_front() {
            Some(lines) => Ok(Box::pin(tokio_stream::iter(lines))),
            None if self.missing_after_runs => {
                Err(Error::binary_not_found("./playit-linux-amd64"))
            }
            None => Ok(Box::pin(tokio_stream::pending::<String>())),
        }
    }

    fn source_name(&self) -> &str {
        "scripted"
    }
}

/// A line source whose output is fed by the test
pub struct ControlledLineSource {
    engine_rx: Arc<std::sync::Mutex<Option<mpsc::UnboundedReceiver<String>>>>,
}

impl ControlledLineSource {
    /// Create a new controlled line source and the sender feeding it
    pub fn new() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            engine_rx: Arc::new(std::sync::Mutex::new(Some(rx))),
        };
        (source, tx)
    }
}

#[async_trait::async_trait]
impl LineSource for ControlledLineSource {
    async fn spawn(&self) -> Result<LineStream> {
        let rx = self
            .engine_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::line_source("controlled source can only be launched once"))?;

        Ok(Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx),
        ))
    }

    fn source_name(&self) -> &str {
        "controlled"
    }
}

/// Scripted answer of the mock updater
#[derive(Debug, Clone)]
pub enum MockResponse {
    Applied,
    Rejected(u16, &'static str),
    TransportError,
}

/// A mock DnsUpdater that tracks calls
pub struct MockDnsUpdater {
    /// Call counter for update_endpoint()
    update_call_count: Arc<AtomicUsize>,
    /// Endpoints passed to update_endpoint(), in call order
    updated_endpoints: Arc<std::sync::Mutex<Vec<Endpoint>>>,
    /// Answers to give, in order; `Applied` once exhausted
    responses: Arc<std::sync::Mutex<VecDeque<MockResponse>>>,
    /// Simulated request latency
    latency: Duration,
}

impl MockDnsUpdater {
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            update_call_count: Arc::new(AtomicUsize::new(0)),
            updated_endpoints: Arc::new(std::sync::Mutex::new(Vec::new())),
            responses: Arc::new(std::sync::Mutex::new(responses.into())),
            latency: Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Get the number of times update_endpoint() was called
    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    /// Get the endpoints that were pushed, in call order
    pub fn updated_endpoints(&self) -> Vec<Endpoint> {
        self.updated_endpoints.lock().unwrap().clone()
    }

    /// Create a new MockDnsUpdater that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            update_call_count: Arc::clone(&other.update_call_count),
            updated_endpoints: Arc::clone(&other.updated_endpoints),
            responses: Arc::clone(&other.responses),
            latency: other.latency,
        }
    }
}

#[async_trait::async_trait]
impl DnsUpdater for MockDnsUpdater {
    async fn update_endpoint(&self, endpoint: &Endpoint) -> Result<UpdateOutcome> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.updated_endpoints
            .lock()
            .unwrap()
            .push(endpoint.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockResponse::Applied);

        match response {
            MockResponse::Applied => Ok(UpdateOutcome::Applied),
            MockResponse::Rejected(status, body) => Ok(UpdateOutcome::Rejected {
                status,
                body: body.to_string(),
            }),
            MockResponse::TransportError => {
                Err(Error::provider("mock", "HTTP request failed: connection refused"))
            }
        }
    }

    fn record_name(&self) -> &str {
        "_minecraft._tcp.example.com"
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Engine settings for tests
pub fn engine_config(on_tunnel_exit: ExitPolicy) -> EngineConfig {
    EngineConfig {
        on_tunnel_exit,
        restart_delay_secs: 0,
        event_channel_capacity: 100,
    }
}

/// Wait until `condition` holds, failing the test after one second
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 1s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
