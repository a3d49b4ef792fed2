// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the Gatehouse collaborators.
//!
//! Collaborators are injected at construction time as `Arc<dyn Trait>`.
//! Long-lived adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod auth_state;
pub mod outbound;
pub mod realtime;
pub mod storage;
pub mod transport;

pub use adapter::PluginAdapter;
pub use auth_state::AuthStateStore;
pub use outbound::OutboundSender;
pub use realtime::RealtimeSink;
pub use storage::StorageAdapter;
pub use transport::{TransportClient, TransportConnection, TransportFactory};
