// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message ingest pipeline.
//!
//! Turns raw transport events into persisted messages. Deduplication rests
//! entirely on the UNIQUE external message id: a redelivered message is
//! reported as [`IngestOutcome::Duplicate`] and has no other effect.

pub mod pipeline;

pub use pipeline::{DropReason, IngestOutcome, MessageIngestPipeline, MAX_PAGE_SIZE};
