// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic convergence of live sessions and persisted records.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gatehouse_config::model::ReconcilerConfig;
use gatehouse_core::types::parse_timestamp;
use gatehouse_core::{GatehouseError, StorageAdapter, TenantId};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lifecycle::SessionLifecycleController;
use crate::registry::ConnectionRegistry;

/// Actions taken by one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Connected records without a live session, flipped to disconnected.
    pub marked_disconnected: usize,
    /// Live sessions idle past the stale timeout, disconnected.
    pub zombies: usize,
    /// Live sessions without any persisted record, disconnected.
    pub orphans: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub connected: usize,
    pub live_in_memory: usize,
    pub stale_detected: usize,
}

pub struct SessionReconciler {
    controller: Arc<SessionLifecycleController>,
    storage: Arc<dyn StorageAdapter>,
    config: ReconcilerConfig,
}

fn is_stale(last_connected_at: Option<&str>, cutoff: DateTime<Utc>) -> bool {
    last_connected_at
        .and_then(parse_timestamp)
        .is_some_and(|at| at < cutoff)
}

impl SessionReconciler {
    pub fn new(
        controller: Arc<SessionLifecycleController>,
        storage: Arc<dyn StorageAdapter>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            controller,
            storage,
            config,
        }
    }

    fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.controller.registry()
    }

    fn cutoff(&self) -> DateTime<Utc> {
        let stale = chrono::Duration::from_std(self.config.stale_timeout())
            .unwrap_or(chrono::Duration::MAX);
        Utc::now()
            .checked_sub_signed(stale)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Run one reconciliation pass.
    ///
    /// Per-tenant failures are counted and skipped; only failing to read the
    /// session table aborts the cycle.
    pub async fn run_cycle(&self) -> Result<ReconcileReport, GatehouseError> {
        let mut report = ReconcileReport::default();
        let cutoff = self.cutoff();
        let records = self.storage.list_session_records(false).await?;
        let persisted: HashSet<&str> = records.iter().map(|r| r.tenant_id.as_str()).collect();

        for record in records.iter().filter(|r| r.is_connected) {
            let tenant = TenantId::new(record.tenant_id.as_str());
            match self.registry().get(&tenant) {
                None => match self.storage.mark_session_disconnected(&tenant).await {
                    Ok(_) => {
                        debug!(tenant = %tenant, "connected record without live session reset");
                        report.marked_disconnected += 1;
                    }
                    Err(e) => {
                        warn!(tenant = %tenant, error = %e, "failed to reset session record");
                        report.failures += 1;
                    }
                },
                Some(handle) => {
                    let session = handle.session();
                    if !is_stale(session.last_connected_at.as_deref(), cutoff) {
                        continue;
                    }
                    match self.controller.disconnect(&tenant).await {
                        Ok(_) => {
                            info!(tenant = %tenant, "zombie session disconnected");
                            report.zombies += 1;
                        }
                        Err(e) => {
                            warn!(tenant = %tenant, error = %e, "failed to disconnect zombie session");
                            report.failures += 1;
                        }
                    }
                }
            }
        }

        for handle in self.registry().handles() {
            let tenant = handle.tenant();
            if persisted.contains(tenant.as_str()) || handle.is_busy() {
                continue;
            }
            // The session may have persisted its first record since the listing.
            match self.storage.get_session_record(tenant).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "failed to read session record");
                    report.failures += 1;
                    continue;
                }
            }
            match self.controller.disconnect(tenant).await {
                Ok(_) => {
                    info!(tenant = %tenant, "orphan session disconnected");
                    report.orphans += 1;
                }
                Err(e) => {
                    warn!(tenant = %tenant, error = %e, "failed to disconnect orphan session");
                    report.failures += 1;
                }
            }
        }

        gatehouse_prometheus::record_reconcile_cycle("marked_disconnected", report.marked_disconnected as u64);
        gatehouse_prometheus::record_reconcile_cycle("zombie", report.zombies as u64);
        gatehouse_prometheus::record_reconcile_cycle("orphan", report.orphans as u64);
        gatehouse_prometheus::record_reconcile_cycle("failure", report.failures as u64);
        Ok(report)
    }

    /// Read-only counts over persisted records and the live registry.
    pub async fn stats(&self) -> Result<SessionStats, GatehouseError> {
        let cutoff = self.cutoff();
        let records = self.storage.list_session_records(false).await?;
        let connected: Vec<_> = records.iter().filter(|r| r.is_connected).collect();
        let stale_detected = connected
            .iter()
            .filter(|r| is_stale(r.last_connected_at.as_deref(), cutoff))
            .count();
        Ok(SessionStats {
            total_sessions: records.len(),
            connected: connected.len(),
            live_in_memory: self.registry().len(),
            stale_detected,
        })
    }

    /// Run cycles every `cleanup_interval` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.cleanup_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        info!(
            interval_secs = self.config.cleanup_interval_secs,
            stale_timeout_secs = self.config.stale_timeout_secs,
            "session reconciler started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.run_cycle().await {
                        Ok(report) if report != ReconcileReport::default() => {
                            info!(?report, "reconciliation cycle complete");
                        }
                        Ok(_) => debug!("reconciliation cycle found nothing to do"),
                        Err(e) => warn!(error = %e, "reconciliation cycle failed"),
                    }
                }
            }
        }
        info!("session reconciler stopped");
    }
}
