//! Contract Test: Tunnel Lifecycle
//!
//! Constraints verified:
//! - A missing tunnel binary is surfaced as BinaryNotFound, no DNS traffic
//! - Under the terminate policy, tunnel exit ends the loop with TunnelExited
//! - Under the restart policy, the tunnel is relaunched and the state survives
//! - A binary that vanishes before a relaunch is surfaced as BinaryNotFound
//! - Lines are consumed one at a time while an update is in flight
//! - A shutdown signal stops the loop cleanly

mod common;

use common::*;
use std::time::Duration;
use tunnel_dns_core::config::ExitPolicy;
use tunnel_dns_core::{Endpoint, Error, LoopEvent, ReconciliationLoop};

#[tokio::test]
async fn missing_binary_is_surfaced_to_caller() {
    let source = ScriptedLineSource::missing_binary();
    let updater = MockDnsUpdater::new();

    let (mut engine, _events) = ReconciliationLoop::new(
        Box::new(ScriptedLineSource::sharing_counters_with(&source)),
        Box::new(MockDnsUpdater::sharing_counters_with(&updater)),
        &engine_config(ExitPolicy::Restart),
    )
    .expect("loop construction succeeds");

    let result = engine.run_with_shutdown(None).await;

    assert!(matches!(result, Err(Error::BinaryNotFound { .. })));
    assert_eq!(source.spawn_count(), 1, "Missing binary must not be retried");
    assert_eq!(updater.update_call_count(), 0);
}

#[tokio::test]
async fn terminate_policy_stops_when_tunnel_exits() {
    let source = ScriptedLineSource::new(&["a.example.com => 127.0.0.1:25565"]);
    let (mut engine, mut events) = ReconciliationLoop::new(
        Box::new(ScriptedLineSource::sharing_counters_with(&source)),
        Box::new(MockDnsUpdater::new()),
        &engine_config(ExitPolicy::Terminate),
    )
    .expect("loop construction succeeds");

    let result = engine.run_with_shutdown(None).await;

    assert!(matches!(result, Err(Error::TunnelExited(_))));
    assert_eq!(source.spawn_count(), 1);

    let mut saw_exit = false;
    while let Ok(event) = events.try_recv() {
        if event == (LoopEvent::TunnelExited { attempt: 1 }) {
            saw_exit = true;
        }
    }
    assert!(saw_exit, "TunnelExited event must be emitted");
}

#[tokio::test]
async fn restart_policy_relaunches_and_keeps_state() {
    let source = ScriptedLineSource::with_runs(&[
        &["a.example.com => 127.0.0.1:25565"],
        &[
            "a.example.com => 127.0.0.1:25565",
            "b.example.com => 127.0.0.1:25566",
        ],
    ]);
    let updater = MockDnsUpdater::new();

    let (mut engine, _events) = ReconciliationLoop::new(
        Box::new(ScriptedLineSource::sharing_counters_with(&source)),
        Box::new(MockDnsUpdater::sharing_counters_with(&updater)),
        &engine_config(ExitPolicy::Restart),
    )
    .expect("loop construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move {
        let result = engine.run_with_shutdown(Some(shutdown_rx)).await;
        (engine, result)
    });

    // Third launch is a silent tunnel that never exits
    wait_until(|| source.spawn_count() >= 3).await;

    shutdown_tx.send(()).unwrap();
    let (engine, result) = handle.await.unwrap();
    result.expect("shutdown is clean");

    assert_eq!(
        updater.updated_endpoints(),
        vec![
            Endpoint::new("a.example.com", "25565"),
            Endpoint::new("b.example.com", "25566"),
        ]
    );
    assert_eq!(engine.seen_hosts().len(), 2);
}

#[tokio::test]
async fn missing_binary_on_relaunch_is_surfaced_to_caller() {
    let source = ScriptedLineSource::with_runs_then_missing_binary(&[&[
        "a.example.com => 127.0.0.1:25565",
    ]]);
    let updater = MockDnsUpdater::new();

    let (mut engine, _events) = ReconciliationLoop::new(
        Box::new(ScriptedLineSource::sharing_counters_with(&source)),
        Box::new(MockDnsUpdater::sharing_counters_with(&updater)),
        &engine_config(ExitPolicy::Restart),
    )
    .expect("loop construction succeeds");

    let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let result = tokio::time::timeout(
        Duration::from_secs(1),
        engine.run_with_shutdown(Some(shutdown_rx)),
    )
    .await
    .expect("loop stops on the failed relaunch");

    assert!(matches!(result, Err(Error::BinaryNotFound { .. })));
    assert_eq!(source.spawn_count(), 2);
    assert_eq!(
        updater.updated_endpoints(),
        vec![Endpoint::new("a.example.com", "25565")]
    );
}

#[tokio::test]
async fn lines_wait_for_in_flight_update() {
    let (source, line_tx) = ControlledLineSource::new();
    let updater = MockDnsUpdater::new().with_latency(Duration::from_millis(100));

    let (mut engine, mut events) = ReconciliationLoop::new(
        Box::new(source),
        Box::new(MockDnsUpdater::sharing_counters_with(&updater)),
        &engine_config(ExitPolicy::Terminate),
    )
    .expect("loop construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    line_tx.send("a.example.com => 127.0.0.1:1".to_string()).unwrap();
    line_tx.send("b.example.com => 127.0.0.1:2".to_string()).unwrap();

    // While the first update is in flight the second line is not consumed
    wait_until(|| updater.update_call_count() >= 1).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(updater.update_call_count(), 1);

    wait_until(|| updater.update_call_count() >= 2).await;

    // Wait for the second update to complete before stopping
    let mut succeeded = 0;
    while succeeded < 2 {
        match tokio::time::timeout(Duration::from_secs(1), events.recv()).await {
            Ok(Some(LoopEvent::UpdateSucceeded { .. })) => succeeded += 1,
            Ok(Some(_)) => {}
            other => panic!("expected update events, got {:?}", other),
        }
    }

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().expect("shutdown is clean");

    assert_eq!(
        updater.updated_endpoints(),
        vec![
            Endpoint::new("a.example.com", "1"),
            Endpoint::new("b.example.com", "2"),
        ]
    );
}

#[tokio::test]
async fn shutdown_signal_stops_idle_loop() {
    let (source, _line_tx) = ControlledLineSource::new();
    let updater = MockDnsUpdater::new();

    let (mut engine, mut events) = ReconciliationLoop::new(
        Box::new(source),
        Box::new(MockDnsUpdater::sharing_counters_with(&updater)),
        &engine_config(ExitPolicy::Terminate),
    )
    .expect("loop construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loop stops promptly")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(updater.update_call_count(), 0);

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    assert_eq!(
        last,
        Some(LoopEvent::Stopped {
            reason: "Shutdown signal".to_string()
        })
    );
}
