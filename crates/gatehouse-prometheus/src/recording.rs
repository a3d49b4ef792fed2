// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.

use metrics::{describe_counter, describe_gauge};

/// Register all Gatehouse metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("gatehouse_connects_total", "Connect attempts by outcome");
    describe_counter!(
        "gatehouse_disconnects_total",
        "Transport disconnects by classification"
    );
    describe_counter!(
        "gatehouse_reconnects_scheduled_total",
        "Reconnect timers scheduled after transient disconnects"
    );
    describe_counter!(
        "gatehouse_restarts_scheduled_total",
        "Client rebuilds scheduled after restart signals"
    );
    describe_counter!(
        "gatehouse_messages_ingested_total",
        "Inbound messages by ingest outcome"
    );
    describe_counter!("gatehouse_bot_replies_total", "Bot replies by delivery outcome");
    describe_counter!(
        "gatehouse_send_failures_total",
        "Outbound sends that failed after all retries"
    );
    describe_counter!(
        "gatehouse_reconcile_actions_total",
        "Corrections applied by the session reconciler"
    );
    describe_gauge!("gatehouse_live_sessions", "Sessions present in the registry");
}

/// `outcome`: `ok`, `in_flight`, `failed`.
pub fn record_connect(outcome: &'static str) {
    metrics::counter!("gatehouse_connects_total", "outcome" => outcome).increment(1);
}

/// `kind`: `reconnectable`, `restart_required`, `terminal`.
pub fn record_disconnect(kind: &str) {
    metrics::counter!("gatehouse_disconnects_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_reconnect_scheduled() {
    metrics::counter!("gatehouse_reconnects_scheduled_total").increment(1);
}

pub fn record_restart_scheduled() {
    metrics::counter!("gatehouse_restarts_scheduled_total").increment(1);
}

/// `outcome`: `stored`, `duplicate`, `dropped`.
pub fn record_ingest(outcome: &'static str) {
    metrics::counter!("gatehouse_messages_ingested_total", "outcome" => outcome).increment(1);
}

pub fn record_bot_reply(delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    metrics::counter!("gatehouse_bot_replies_total", "outcome" => outcome).increment(1);
}

pub fn record_send_failure() {
    metrics::counter!("gatehouse_send_failures_total").increment(1);
}

/// `action`: `marked_disconnected`, `zombie`, `orphan`.
pub fn record_reconcile_cycle(action: &'static str, count: u64) {
    if count > 0 {
        metrics::counter!("gatehouse_reconcile_actions_total", "action" => action)
            .increment(count);
    }
}

pub fn set_live_sessions(count: usize) {
    metrics::gauge!("gatehouse_live_sessions").set(count as f64);
}
