// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gatehouse status` and `gatehouse reconcile` one-shot commands.
//!
//! Both work directly against the database, without a running server.

use gatehouse_config::GatehouseConfig;
use gatehouse_core::{GatehouseError, SessionStatus, StorageAdapter, TenantId};
use gatehouse_storage::SqliteStorage;

use crate::stack::Stack;

/// Print the persisted status of one tenant, or of every known tenant.
pub async fn run_status(
    config: &GatehouseConfig,
    tenant: Option<&str>,
    json: bool,
) -> Result<(), GatehouseError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;

    let statuses = match tenant {
        Some(tenant) => {
            let tenant = TenantId::new(tenant);
            vec![match storage.get_session_record(&tenant).await? {
                Some(record) => SessionStatus::from_record(&record),
                None => SessionStatus::idle(&tenant),
            }]
        }
        None => storage
            .list_session_records(false)
            .await?
            .iter()
            .map(SessionStatus::from_record)
            .collect(),
    };
    storage.close().await?;

    if json {
        let out = serde_json::to_string_pretty(&statuses)
            .map_err(|e| GatehouseError::Internal(format!("failed to encode status: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", render_table(&statuses));
    }
    Ok(())
}

fn render_table(statuses: &[SessionStatus]) -> String {
    if statuses.is_empty() {
        return "no sessions recorded\n".to_string();
    }
    let width = statuses
        .iter()
        .map(|s| s.tenant_id.len())
        .max()
        .unwrap_or(0)
        .max("TENANT".len());
    let mut out = format!("{:<width$}  {:<10}  {:<9}  LAST CONNECTED\n", "TENANT", "STATE", "CONNECTED");
    for s in statuses {
        out.push_str(&format!(
            "{:<width$}  {:<10}  {:<9}  {}\n",
            s.tenant_id,
            s.state.to_string(),
            if s.connected { "yes" } else { "no" },
            s.last_connected_at.as_deref().unwrap_or("-"),
        ));
    }
    out
}

/// Run a single reconciliation cycle.
///
/// No sessions are live in this process, so every record still marked
/// connected is flipped to disconnected. Use it only while no server is
/// running against the same database.
pub async fn run_reconcile(config: &GatehouseConfig, json: bool) -> Result<(), GatehouseError> {
    let stack = Stack::build(config).await?;
    let report = stack.reconciler.run_cycle().await;
    stack.close().await?;
    let report = report?;

    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| GatehouseError::Internal(format!("failed to encode report: {e}")))?;
        println!("{out}");
    } else {
        println!(
            "marked disconnected: {}, zombies: {}, orphans: {}, failures: {}",
            report.marked_disconnected, report.zombies, report.orphans, report.failures
        );
    }
    Ok(())
}
