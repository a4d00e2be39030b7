//! Password Reset Use Cases
//!
//! `ForgotPassword` issues a single-use token valid for one hour and hands it
//! to the event sink for delivery. `ResetPassword` consumes it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::{
    bounded,
    config::AuthConfig,
    events::{AuthEvent, EventPublisher},
};
use crate::domain::entity::PasswordResetToken;
use crate::domain::repository::{
    PasswordResetTokenRepository, RefreshTokenRepository, UserRepository,
};
use crate::domain::value_object::{
    email::Email,
    opaque_token::OpaqueToken,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Forgot password output
///
/// The bearer token is not part of it: it only travels through the
/// `PasswordResetRequested` event.
#[derive(Debug, Clone)]
pub struct ForgotPasswordOutput {
    pub expires_at: DateTime<Utc>,
}

/// Forgot password use case
pub struct ForgotPasswordUseCase<U, P>
where
    U: UserRepository,
    P: PasswordResetTokenRepository,
{
    user_repo: Arc<U>,
    reset_repo: Arc<P>,
    events: Arc<dyn EventPublisher>,
    config: Arc<AuthConfig>,
}

impl<U, P> ForgotPasswordUseCase<U, P>
where
    U: UserRepository,
    P: PasswordResetTokenRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        reset_repo: Arc<P>,
        events: Arc<dyn EventPublisher>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            reset_repo,
            events,
            config,
        }
    }

    pub async fn execute(&self, email: String) -> AuthResult<ForgotPasswordOutput> {
        let email = Email::new(email)?;

        // Reports unknown addresses, which lets callers enumerate accounts
        let user = bounded(
            self.config.store_timeout,
            "user find_by_email",
            self.user_repo.find_by_email(&email),
        )
        .await?
        .ok_or(AuthError::EmailNotFound)?;

        let (record, token) =
            PasswordResetToken::issue(user.id, self.config.reset_token_ttl_chrono());
        bounded(
            self.config.store_timeout,
            "reset token create",
            self.reset_repo.create(&record),
        )
        .await?;

        tracing::info!(user_id = %user.id, expires_at = %record.expires_at, "Password reset requested");

        self.events.publish(AuthEvent::PasswordResetRequested {
            user_id: user.id,
            email: user.email.to_string(),
            reset_token: token.into_string(),
        });

        Ok(ForgotPasswordOutput {
            expires_at: record.expires_at,
        })
    }
}

/// Reset password input
pub struct ResetPasswordInput {
    pub token: String,
    pub new_password: String,
}

/// Reset password use case
pub struct ResetPasswordUseCase<U, T, P>
where
    U: UserRepository,
    T: RefreshTokenRepository,
    P: PasswordResetTokenRepository,
{
    user_repo: Arc<U>,
    token_repo: Arc<T>,
    reset_repo: Arc<P>,
    events: Arc<dyn EventPublisher>,
    config: Arc<AuthConfig>,
}

impl<U, T, P> ResetPasswordUseCase<U, T, P>
where
    U: UserRepository,
    T: RefreshTokenRepository,
    P: PasswordResetTokenRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        token_repo: Arc<T>,
        reset_repo: Arc<P>,
        events: Arc<dyn EventPublisher>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            token_repo,
            reset_repo,
            events,
            config,
        }
    }

    /// Hashes first, then consumes the token, then writes the hash. A failed
    /// hash leaves the token usable; a lost race leaves the password alone.
    pub async fn execute(&self, input: ResetPasswordInput) -> AuthResult<()> {
        let raw_password = RawPassword::new(input.new_password)?;

        let token = OpaqueToken::from_client(input.token);
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredResetToken);
        }
        let digest = token.digest();

        let pending = bounded(
            self.config.store_timeout,
            "reset token find_valid",
            self.reset_repo.find_valid(&digest, Utc::now()),
        )
        .await?;
        if pending.is_none() {
            return Err(AuthError::InvalidOrExpiredResetToken);
        }

        let password_hash =
            UserPassword::hash(raw_password, self.config.pepper(), self.config.hashing_cost)
                .await?;

        let consumed = bounded(
            self.config.store_timeout,
            "reset token consume",
            self.reset_repo.consume(&digest, Utc::now()),
        )
        .await?
        .ok_or(AuthError::InvalidOrExpiredResetToken)?;

        let user_id = consumed.user_id;
        let written = bounded(
            self.config.store_timeout,
            "user set_password_hash",
            self.user_repo
                .set_password_hash(&user_id, &password_hash, None, Utc::now()),
        )
        .await;
        match written {
            Ok(_) => {}
            Err(AuthError::UserNotFound) => return Err(AuthError::InvalidOrExpiredResetToken),
            Err(e) => return Err(e),
        }

        let revoked = bounded(
            self.config.store_timeout,
            "refresh token delete_all_for_user",
            self.token_repo.delete_all_for_user(&user_id),
        )
        .await?;

        tracing::info!(user_id = %user_id, sessions_revoked = revoked, "Password reset");

        self.events.publish(AuthEvent::PasswordReset { user_id });

        Ok(())
    }
}
