// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule and command based auto-responder.
//!
//! Replies are chosen from greetings, tenant keyword rules, the `catalog`,
//! `order` and `status` commands, and finally a fallback text. Delivery goes
//! through an [`gatehouse_core::OutboundSender`] so this crate never depends
//! on the session layer.

pub mod engine;
pub mod intent;
pub mod order;
pub mod render;

pub use engine::{BotReply, BotResponseEngine, ReplySource};
