//! Domain events and the publisher port
//!
//! State changes that the surrounding system reacts to (sending the OTP
//! email, fan-out revocation, audit) are announced through an explicit
//! port, called synchronously right after the persistence write returns.
//! The contract is "the state mutation is durable before the event goes
//! out", never the other way around.

use uuid::Uuid;

/// Events emitted by the session and multi-factor services
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    /// A refresh token chain was created
    RefreshTokenIssued { session_id: Uuid, token_id: Uuid },

    /// An access token was derived from an existing chain
    AccessTokenRefreshed { token_id: Uuid },

    /// A verifier confirmed step-up authentication
    MultiFactorVerified {
        user_id: String,
        token_id: Uuid,
        reference: String,
    },

    /// A verifier rejected a submitted code
    MultiFactorFailed { user_id: String, method: String },

    /// A one-time credential was generated and needs delivery
    OtpGenerated { user_id: String, method: String },

    /// A session and its refresh tokens were revoked
    SessionRevoked { session_id: Uuid },

    /// A plugin's claims were attached to a refresh token
    PluginAttached { token_id: Uuid, plugin: String },
}

/// Synchronous event sink implemented by the surrounding system
pub trait EventPublisher: Send + Sync {
    /// Hands an event to the outer task layer; must not block on I/O
    fn publish(&self, event: DomainEvent);
}

/// Publisher for callers without an event bus
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventPublisher;

impl EventPublisher for NoopEventPublisher {
    fn publish(&self, _event: DomainEvent) {}
}

pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records published events for assertions
    #[derive(Debug, Clone, Default)]
    pub struct RecordingEventPublisher {
        events: Arc<Mutex<Vec<DomainEvent>>>,
    }

    impl RecordingEventPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<DomainEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventPublisher for RecordingEventPublisher {
        fn publish(&self, event: DomainEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
