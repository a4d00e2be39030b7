//! Login Use Case
//!
//! Verifies credentials and starts a session. Checks run in a fixed order:
//! lookup, status, password, TOTP, expected role.

use std::sync::Arc;

use chrono::Utc;
use platform::password::HashingCost;

use crate::application::{
    bounded,
    config::AuthConfig,
    session::{SessionIssuer, TokenPair},
};
use crate::domain::entity::User;
use crate::domain::repository::{RefreshTokenRepository, UserRepository};
use crate::domain::services::TotpManager;
use crate::domain::value_object::{
    email::Email,
    user_password::{RawPassword, UserPassword},
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// Login input
pub struct LoginInput {
    pub email: String,
    pub password: String,
    /// TOTP code (if required by deployment or surface)
    pub totp_code: Option<String>,
    /// Role the calling surface is reserved for
    pub expected_role: Option<UserRole>,
}

/// Login output
#[derive(Debug)]
pub struct LoginOutput {
    pub user: User,
    pub tokens: TokenPair,
}

/// Login use case
pub struct LoginUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    user_repo: Arc<U>,
    sessions: SessionIssuer<T>,
    config: Arc<AuthConfig>,
}

impl<U, T> LoginUseCase<U, T>
where
    U: UserRepository,
    T: RefreshTokenRepository,
{
    pub fn new(user_repo: Arc<U>, sessions: SessionIssuer<T>, config: Arc<AuthConfig>) -> Self {
        Self {
            user_repo,
            sessions,
            config,
        }
    }

    pub async fn execute(&self, input: LoginInput) -> AuthResult<LoginOutput> {
        // A malformed address cannot belong to anyone
        let email = Email::new(&input.email).map_err(|_| AuthError::InvalidCredentials)?;

        let found = bounded(
            self.config.store_timeout,
            "user find_by_email",
            self.user_repo.find_by_email(&email),
        )
        .await?;
        let Some(mut user) = found else {
            self.verify_against_dummy(input.password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !user.can_login() {
            tracing::info!(user_id = %user.id, status = %user.status, "Login refused for inactive account");
            return Err(AuthError::AccountNotActive);
        }

        let rehash_source = user
            .password_hash
            .needs_rehash(self.config.hashing_cost)
            .then(|| input.password.clone());
        let raw_password = RawPassword::for_verification(input.password);
        if !user
            .password_hash
            .verify(raw_password, self.config.pepper())
            .await?
        {
            tracing::warn!(user_id = %user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if self.totp_required(input.expected_role) {
            let code = input.totp_code.as_deref().unwrap_or_default();
            let valid = TotpManager::new(&self.config.totp_issuer).validate_code(
                code,
                &user.totp_secret,
                Utc::now(),
            )?;
            if !valid {
                tracing::warn!(user_id = %user.id, "TOTP verification failed");
                return Err(AuthError::InvalidTotp);
            }
        }

        if let Some(expected) = input.expected_role {
            if !user.role.satisfies(expected) {
                tracing::warn!(
                    user_id = %user.id,
                    role = %user.role,
                    expected = %expected,
                    "Role does not satisfy login surface"
                );
                return Err(AuthError::InsufficientPrivilege);
            }
        }

        let tokens = self.sessions.issue(&user).await?;

        if let Some(password) = rehash_source {
            self.upgrade_hash(&mut user, password).await;
        }
        // Only the login stamp is written; role and status stay as stored
        user.record_login();
        bounded(
            self.config.store_timeout,
            "user record_login",
            self.user_repo.record_login(&user.id, user.updated_at),
        )
        .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

        Ok(LoginOutput { user, tokens })
    }

    fn totp_required(&self, expected_role: Option<UserRole>) -> bool {
        self.config.require_totp
            || (self.config.require_totp_for_elevated
                && expected_role.is_some_and(|role| role.is_admin_or_higher()))
    }

    /// Rehash with the current cost after a successful verification.
    /// Failure keeps the old hash, as does a password changed meanwhile.
    async fn upgrade_hash(&self, user: &mut User, password: String) {
        let raw = RawPassword::for_verification(password);
        let hash = match UserPassword::hash(raw, self.config.pepper(), self.config.hashing_cost).await
        {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Password rehash failed");
                return;
            }
        };

        let swapped = bounded(
            self.config.store_timeout,
            "user set_password_hash",
            self.user_repo.set_password_hash(
                &user.id,
                &hash,
                Some(&user.password_hash),
                Utc::now(),
            ),
        )
        .await;

        match swapped {
            Ok(true) => {
                tracing::info!(user_id = %user.id, "Password hash upgraded");
                user.set_password(hash);
            }
            Ok(false) => {
                tracing::info!(user_id = %user.id, "Password changed during login, rehash skipped");
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Password rehash failed");
            }
        }
    }

    /// Spend the same Argon2 work on an unknown email as on a known one
    async fn verify_against_dummy(&self, password: String) {
        match dummy_hash(self.config.hashing_cost) {
            Ok(hash) => {
                let raw = RawPassword::for_verification(password);
                let _ = hash.verify(raw, self.config.pepper()).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dummy password hash unavailable");
            }
        }
    }
}

/// Fixed salt and digest; verification cost comes from the parameters
const DUMMY_SALT: &str = "c29tZXNhbHRzb21lc2FsdA";
const DUMMY_DIGEST: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn dummy_hash(cost: HashingCost) -> AuthResult<UserPassword> {
    UserPassword::from_phc_string(format!(
        "$argon2id$v=19$m={},t={},p={}${DUMMY_SALT}${DUMMY_DIGEST}",
        cost.memory_kib, cost.iterations, cost.parallelism
    ))
}
