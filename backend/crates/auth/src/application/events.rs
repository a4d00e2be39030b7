//! Domain Events
//!
//! Best-effort notifications about state changes. Publishing never fails the
//! request that produced the event.

#[cfg(test)]
use std::sync::Mutex;

use crate::domain::value_object::{UserId, user_role::UserRole, user_status::UserStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    UserRegistered {
        user_id: UserId,
        email: String,
        role: UserRole,
    },
    AdminCreated {
        user_id: UserId,
        role: UserRole,
        created_by: UserId,
    },
    UserRoleChanged {
        user_id: UserId,
        old_role: UserRole,
        new_role: UserRole,
        updated_by: UserId,
    },
    UserStatusChanged {
        user_id: UserId,
        old_status: UserStatus,
        new_status: UserStatus,
        reason: Option<String>,
        updated_by: UserId,
    },
    /// Carries the bearer reset token for the mail collaborator
    PasswordResetRequested {
        user_id: UserId,
        email: String,
        reset_token: String,
    },
    PasswordReset {
        user_id: UserId,
    },
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::UserRegistered { .. } => "user_registered",
            AuthEvent::AdminCreated { .. } => "admin_created",
            AuthEvent::UserRoleChanged { .. } => "user_role_changed",
            AuthEvent::UserStatusChanged { .. } => "user_status_changed",
            AuthEvent::PasswordResetRequested { .. } => "password_reset_requested",
            AuthEvent::PasswordReset { .. } => "password_reset",
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            AuthEvent::UserRegistered { user_id, .. }
            | AuthEvent::AdminCreated { user_id, .. }
            | AuthEvent::UserRoleChanged { user_id, .. }
            | AuthEvent::UserStatusChanged { user_id, .. }
            | AuthEvent::PasswordResetRequested { user_id, .. }
            | AuthEvent::PasswordReset { user_id } => *user_id,
        }
    }
}

/// Event sink
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: AuthEvent);
}

/// Writes events as structured `tracing` records
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: AuthEvent) {
        match &event {
            AuthEvent::UserRoleChanged {
                old_role, new_role, ..
            } => {
                tracing::info!(
                    target: "auth::events",
                    event = event.name(),
                    user_id = %event.user_id(),
                    old_role = old_role.code(),
                    new_role = new_role.code(),
                    "Auth event"
                );
            }
            AuthEvent::UserStatusChanged {
                old_status,
                new_status,
                reason,
                ..
            } => {
                tracing::info!(
                    target: "auth::events",
                    event = event.name(),
                    user_id = %event.user_id(),
                    old_status = old_status.code(),
                    new_status = new_status.code(),
                    reason = reason.as_deref().unwrap_or(""),
                    "Auth event"
                );
            }
            // The reset token itself stays out of the logs
            _ => {
                tracing::info!(
                    target: "auth::events",
                    event = event.name(),
                    user_id = %event.user_id(),
                    "Auth event"
                );
            }
        }
    }
}

/// Keeps every published event in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<AuthEvent>>,
}

#[cfg(test)]
impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuthEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: AuthEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
