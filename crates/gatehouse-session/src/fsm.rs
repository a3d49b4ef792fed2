// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure session state machine.
//!
//! [`step`] maps a session and an event to the next session plus the side
//! effects the controller must run, in order. Nothing here performs IO.

use std::time::Duration;

use gatehouse_config::model::SessionConfig;
use gatehouse_core::types::{SessionRecord, now_timestamp};
use gatehouse_core::{ConnectionState, DisconnectKind, DisconnectReason, SessionStatus, TenantId};

/// In-memory lifecycle state of one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub tenant_id: TenantId,
    pub state: ConnectionState,
    pub qr: Option<String>,
    pub last_connected_at: Option<String>,
    pub reconnect_attempts: u32,
    pub restart_attempts: u32,
    /// Whether stored credentials are known to exist.
    pub has_credentials: bool,
    pub detail: Option<String>,
}

impl Session {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            state: ConnectionState::Idle,
            qr: None,
            last_connected_at: None,
            reconnect_attempts: 0,
            restart_attempts: 0,
            has_credentials: false,
            detail: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            tenant_id: self.tenant_id.to_string(),
            connected: self.state.is_open(),
            state: self.state,
            qr: self.qr.clone(),
            reconnect_attempts: self.reconnect_attempts,
            restart_attempts: self.restart_attempts,
            last_connected_at: self.last_connected_at.clone(),
            detail: self.detail.clone(),
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            tenant_id: self.tenant_id.to_string(),
            is_connected: self.state.is_open(),
            connection_state: self.state.to_string(),
            last_connected_at: self.last_connected_at.clone(),
            qr_code: self.qr.clone(),
            auth_data_ref: self
                .has_credentials
                .then(|| self.tenant_id.auth_data_ref()),
            updated_at: now_timestamp(),
        }
    }
}

/// Retry limits and delays applied by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub max_restart_attempts: u32,
    pub restart_delay: Duration,
}

impl From<&SessionConfig> for RetryPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_delay: config.reconnect_delay(),
            max_restart_attempts: config.max_restart_attempts,
            restart_delay: config.restart_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A transport is about to be built.
    ///
    /// `resumed` when stored credentials were found. `reset_attempts` for an
    /// explicit caller request, as opposed to a timer firing.
    Connect { resumed: bool, reset_attempts: bool },
    /// The transport factory failed.
    ConnectFailed(String),
    Qr(String),
    Opened { at: String },
    /// Inbound traffic on an open session.
    Activity { at: String },
    CredentialsSaved,
    Closed(DisconnectReason),
    RestartRequired,
    /// The event stream ended without a close notification.
    StreamEnded,
    DisconnectStarted,
    Disconnected,
}

/// Side effects, executed by the controller in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Drop the current transport client without logging out.
    CloseClient,
    ClearCredentials,
    Persist,
    DeleteRecord,
    Unregister,
    PublishStatus,
    PublishQr(String),
    ScheduleReconnect(Duration),
    ScheduleRestart(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub session: Session,
    pub effects: Vec<Effect>,
}

const MAX_ATTEMPTS_DETAIL: &str = "max reconnect attempts exceeded";

pub fn step(current: &Session, event: LifecycleEvent, policy: &RetryPolicy) -> Transition {
    use Effect::*;

    let mut s = current.clone();
    let effects = match event {
        LifecycleEvent::Connect {
            resumed,
            reset_attempts,
        } => {
            if reset_attempts {
                s.reconnect_attempts = 0;
                s.restart_attempts = 0;
            }
            s.state = if resumed {
                ConnectionState::Authenticating
            } else {
                ConnectionState::Connecting
            };
            s.has_credentials = resumed;
            s.qr = None;
            s.detail = None;
            vec![Persist, PublishStatus]
        }
        LifecycleEvent::ConnectFailed(message) => {
            s.state = ConnectionState::Error;
            s.qr = None;
            s.detail = Some(message);
            vec![Persist, PublishStatus]
        }
        LifecycleEvent::Qr(payload) => {
            s.state = ConnectionState::AwaitingQr;
            s.qr = Some(payload.clone());
            vec![Persist, PublishQr(payload), PublishStatus]
        }
        LifecycleEvent::Opened { at } => {
            s.state = ConnectionState::Open;
            s.reconnect_attempts = 0;
            s.restart_attempts = 0;
            s.last_connected_at = Some(at);
            s.qr = None;
            s.detail = None;
            vec![Persist, PublishStatus]
        }
        LifecycleEvent::Activity { at } => {
            if s.state.is_open() {
                s.last_connected_at = Some(at);
            }
            Vec::new()
        }
        LifecycleEvent::CredentialsSaved => {
            let changed = !s.has_credentials;
            s.has_credentials = true;
            if changed { vec![Persist] } else { Vec::new() }
        }
        LifecycleEvent::RestartRequired => return restart(s, policy),
        LifecycleEvent::Closed(reason) => match reason.kind() {
            DisconnectKind::RestartRequired => return restart(s, policy),
            DisconnectKind::Terminal => {
                s.state = ConnectionState::Idle;
                s.qr = None;
                s.reconnect_attempts = 0;
                s.restart_attempts = 0;
                s.has_credentials = false;
                s.detail = Some(match reason.message {
                    Some(m) => format!("logged out ({}): {m}", reason.code),
                    None => format!("logged out ({})", reason.code),
                });
                vec![CloseClient, ClearCredentials, DeleteRecord, Unregister, PublishStatus]
            }
            DisconnectKind::Reconnectable => return reconnect(s, policy),
        },
        LifecycleEvent::StreamEnded => return reconnect(s, policy),
        LifecycleEvent::DisconnectStarted => {
            s.state = ConnectionState::Closing;
            vec![PublishStatus]
        }
        LifecycleEvent::Disconnected => {
            s.state = ConnectionState::Idle;
            s.qr = None;
            s.reconnect_attempts = 0;
            s.restart_attempts = 0;
            s.has_credentials = false;
            s.detail = None;
            vec![CloseClient, ClearCredentials, Persist, Unregister, PublishStatus]
        }
    };
    Transition {
        session: s,
        effects,
    }
}

fn restart(mut s: Session, policy: &RetryPolicy) -> Transition {
    s.restart_attempts += 1;
    if s.restart_attempts > policy.max_restart_attempts {
        return reconnect(s, policy);
    }
    s.state = ConnectionState::Restarting;
    s.qr = None;
    Transition {
        session: s,
        effects: vec![
            Effect::CloseClient,
            Effect::Persist,
            Effect::PublishStatus,
            Effect::ScheduleRestart(policy.restart_delay),
        ],
    }
}

fn reconnect(mut s: Session, policy: &RetryPolicy) -> Transition {
    s.qr = None;
    if s.reconnect_attempts < policy.max_reconnect_attempts {
        s.reconnect_attempts += 1;
        s.state = ConnectionState::Idle;
        Transition {
            session: s,
            effects: vec![
                Effect::CloseClient,
                Effect::Persist,
                Effect::PublishStatus,
                Effect::ScheduleReconnect(policy.reconnect_delay),
            ],
        }
    } else {
        s.state = ConnectionState::Error;
        s.detail = Some(MAX_ATTEMPTS_DETAIL.to_string());
        Transition {
            session: s,
            effects: vec![Effect::CloseClient, Effect::Persist, Effect::PublishStatus],
        }
    }
}
