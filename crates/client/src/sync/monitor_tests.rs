// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use gl_core::protocol::{ClientMessage, ServerMessage};

use super::monitor::NetworkMonitor;
use super::transport_tests::MockTransport;

#[test]
fn starts_with_connectivity_but_unconfirmed_reachability() {
    let monitor = NetworkMonitor::new();
    assert!(monitor.connectivity());
    assert!(!monitor.is_online());
}

#[test]
fn online_requires_both_signals() {
    let monitor = NetworkMonitor::new();

    monitor.report_reachable(true);
    assert!(monitor.is_online());

    monitor.set_connectivity(false);
    assert!(!monitor.is_online());
}

#[test]
fn losing_connectivity_clears_reachability() {
    let monitor = NetworkMonitor::new();
    monitor.report_reachable(true);

    monitor.set_connectivity(false);
    monitor.set_connectivity(true);

    // The old reachability observation does not carry over to the new
    // link; a probe has to re-establish it.
    assert!(!monitor.is_online());
}

#[test]
fn subscribers_see_transitions() {
    let monitor = NetworkMonitor::new();
    let mut rx = monitor.subscribe();
    assert!(!*rx.borrow_and_update());

    monitor.report_reachable(true);
    assert!(rx.has_changed().unwrap());
    assert!(*rx.borrow_and_update());

    monitor.set_connectivity(false);
    assert!(rx.has_changed().unwrap());
    assert!(!*rx.borrow_and_update());
}

#[test]
fn clones_share_state() {
    let monitor = NetworkMonitor::new();
    let clone = monitor.clone();

    clone.report_reachable(true);
    assert!(monitor.is_online());
}

#[tokio::test]
async fn probe_confirms_reachability_on_pong() {
    let monitor = NetworkMonitor::new();
    let mut transport = MockTransport::new();
    transport.queue_incoming(ServerMessage::pong(0));

    assert!(monitor.probe(&mut transport).await);
    assert!(monitor.is_online());

    let sent = transport.get_outgoing();
    assert_eq!(sent, vec![ClientMessage::ping(0)]);
}

#[tokio::test]
async fn probe_skips_unrelated_frames() {
    let monitor = NetworkMonitor::new();
    let mut transport = MockTransport::new();
    transport.queue_incoming(ServerMessage::pong(99));
    transport.queue_incoming(ServerMessage::pong(0));

    assert!(monitor.probe(&mut transport).await);
}

#[tokio::test]
async fn probe_timeout_reports_unreachable() {
    let monitor = NetworkMonitor::new().with_probe_timeout(Duration::from_millis(50));
    monitor.report_reachable(true);

    let mut transport = MockTransport::new();
    transport.set_block_on_empty(true);

    assert!(!monitor.probe(&mut transport).await);
    assert!(!monitor.is_online());
}

#[tokio::test]
async fn probe_send_failure_reports_unreachable() {
    let monitor = NetworkMonitor::new();
    monitor.report_reachable(true);

    let mut transport = MockTransport::new();
    transport.set_send_fail(true);

    assert!(!monitor.probe(&mut transport).await);
    assert!(!monitor.is_online());
}
