// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Gatehouse session gateway.
//!
//! This crate provides the collaborator traits, error types, and common
//! types shared by every Gatehouse crate. Storage, transport, and realtime
//! implementations plug in through the traits defined here.

pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::GatehouseError;
pub use retry::{RetryExhausted, with_retries};
pub use types::{
    AdapterType, AuthCredentials, ConnectionState, DisconnectKind, DisconnectReason,
    HealthStatus, RawInboundEvent, RealtimeEvent, SessionStatus, TenantId, TransportEvent,
};

pub use traits::{
    AuthStateStore, OutboundSender, PluginAdapter, RealtimeSink, StorageAdapter,
    TransportClient, TransportConnection, TransportFactory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Storage,
            AdapterType::Transport,
            AdapterType::Observability,
        ] {
            let s = variant.to_string();
            assert_eq!(AdapterType::from_str(&s).unwrap(), variant);
        }
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_storage<T: StorageAdapter>() {}
        fn _assert_auth_state<T: AuthStateStore>() {}
        fn _assert_factory<T: TransportFactory>() {}
        fn _assert_client<T: TransportClient>() {}
        fn _assert_sink<T: RealtimeSink>() {}
        fn _assert_outbound<T: OutboundSender>() {}
    }

    #[test]
    fn traits_are_object_safe() {
        fn _dyn(
            _: &dyn StorageAdapter,
            _: &dyn AuthStateStore,
            _: &dyn TransportFactory,
            _: &dyn TransportClient,
            _: &dyn RealtimeSink,
            _: &dyn OutboundSender,
        ) {
        }
    }
}
