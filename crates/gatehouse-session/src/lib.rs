// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-tenant session management.
//!
//! - [`registry`] holds at most one live session per tenant.
//! - [`fsm`] is the pure lifecycle state machine.
//! - [`lifecycle`] drives transports and applies state machine effects.
//! - [`reconciler`] converges live sessions with persisted records.

pub mod fsm;
pub mod lifecycle;
pub mod reconciler;
pub mod registry;

pub use fsm::{Effect, LifecycleEvent, RetryPolicy, Session};
pub use lifecycle::SessionLifecycleController;
pub use reconciler::{ReconcileReport, SessionReconciler, SessionStats};
pub use registry::{ConnectionRegistry, SessionHandle};
