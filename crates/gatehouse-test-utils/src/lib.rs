// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Gatehouse integration tests.
//!
//! - [`MockTransportFactory`] / [`MockTransport`]: scriptable transport whose
//!   events are injected by the test and whose sends are captured.
//! - [`FaultyStorage`]: SQLite storage with injectable failures.
//! - [`TestHarness`]: the full session stack over a temporary SQLite file.

pub mod faulty_storage;
pub mod harness;
pub mod mock_transport;

pub use faulty_storage::FaultyStorage;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_transport::{MockTransport, MockTransportFactory};
