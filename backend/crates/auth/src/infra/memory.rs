//! In-Memory Repository Implementation
//!
//! All three stores behind one `tokio::sync::RwLock`. Used by tests and local
//! development without a database.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::entity::{PasswordResetToken, RefreshToken, User};
use crate::domain::repository::{
    ListUsersQuery, PasswordResetTokenRepository, RefreshTokenRepository, UserRepository,
};
use crate::domain::value_object::{
    UserId, email::Email, user_name::UserName, user_password::UserPassword, user_role::UserRole,
    user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    /// Keyed by token digest
    refresh_tokens: HashMap<String, RefreshToken>,
    /// Keyed by token digest
    reset_tokens: HashMap<String, PasswordResetToken>,
}

/// In-memory auth repository
#[derive(Clone, Default)]
pub struct InMemoryAuthRepository {
    tables: Arc<RwLock<Tables>>,
    latency: Option<Duration>,
}

impl InMemoryAuthRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` (simulates a slow store)
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Another handle on the same tables, without the artificial latency
    pub fn without_latency(&self) -> Self {
        Self {
            tables: self.tables.clone(),
            latency: None,
        }
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.tables.read().await.refresh_tokens.len()
    }

    pub async fn reset_token_count(&self) -> usize {
        self.tables.read().await.reset_tokens.len()
    }

    /// Rewrite a stored reset token in place
    pub async fn update_reset_token<F>(&self, user_id: &UserId, f: F)
    where
        F: Fn(&mut PasswordResetToken),
    {
        let mut tables = self.tables.write().await;
        tables
            .reset_tokens
            .values_mut()
            .filter(|t| t.user_id == *user_id)
            .for_each(f);
    }

    /// Apply `f` to one stored user under the write lock
    async fn with_user<F>(&self, id: &UserId, f: F) -> AuthResult<()>
    where
        F: FnOnce(&mut User),
    {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or(AuthError::UserNotFound)?;
        f(user);
        Ok(())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for InMemoryAuthRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::DuplicateEmail);
        }
        if tables.users.contains_key(&user.id) {
            return Err(AuthError::Internal(format!("Duplicate user id: {}", user.id)));
        }

        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> AuthResult<Option<User>> {
        self.delay().await;
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == *email).cloned())
    }

    async fn find_by_name(&self, name: &UserName) -> AuthResult<Option<User>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.name == *name)
            .min_by_key(|u| u.created_at)
            .cloned())
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|u| u.email == *email))
    }

    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        self.with_user(id, |user| {
            user.last_login_at = Some(at);
            user.updated_at = at;
        })
        .await
    }

    async fn set_password_hash(
        &self,
        id: &UserId,
        hash: &UserPassword,
        expected: Option<&UserPassword>,
        at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(id).ok_or(AuthError::UserNotFound)?;

        if expected.is_some_and(|expected| user.password_hash != *expected) {
            return Ok(false);
        }
        user.password_hash = hash.clone();
        user.updated_at = at;
        Ok(true)
    }

    async fn set_role(
        &self,
        id: &UserId,
        role: UserRole,
        updated_by: &UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<()> {
        self.with_user(id, |user| {
            user.role = role;
            user.updated_by = Some(*updated_by);
            user.updated_at = at;
        })
        .await
    }

    async fn set_status(
        &self,
        id: &UserId,
        status: UserStatus,
        updated_by: &UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<()> {
        self.with_user(id, |user| {
            user.status = status;
            user.updated_by = Some(*updated_by);
            user.updated_at = at;
        })
        .await
    }

    async fn list(&self, query: &ListUsersQuery) -> AuthResult<(Vec<User>, u64)> {
        self.delay().await;
        let tables = self.tables.read().await;

        let mut matching: Vec<&User> = tables.users.values().filter(|u| query.matches(u)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });

        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }
}

// ============================================================================
// Refresh Token Repository Implementation
// ============================================================================

impl RefreshTokenRepository for InMemoryAuthRepository {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        if tables.refresh_tokens.contains_key(&token.token_digest) {
            return Err(AuthError::Internal("Duplicate refresh token".into()));
        }
        tables
            .refresh_tokens
            .insert(token.token_digest.clone(), token.clone());
        Ok(())
    }

    async fn rotate(
        &self,
        old_digest: &str,
        new_digest: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<RefreshToken>> {
        self.delay().await;
        // Check and swap under one write guard
        let mut tables = self.tables.write().await;

        let usable = tables
            .refresh_tokens
            .get(old_digest)
            .is_some_and(|t| t.is_usable(now));
        if !usable {
            return Ok(None);
        }

        let Some(mut token) = tables.refresh_tokens.remove(old_digest) else {
            return Ok(None);
        };
        token.token_digest = new_digest.to_string();
        token.expires_at = new_expires_at;
        token.updated_at = now;
        tables
            .refresh_tokens
            .insert(new_digest.to_string(), token.clone());

        Ok(Some(token))
    }

    async fn delete_by_digest(&self, digest: &str) -> AuthResult<bool> {
        self.delay().await;
        Ok(self
            .tables
            .write()
            .await
            .refresh_tokens
            .remove(digest)
            .is_some())
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.user_id != *user_id);
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables.refresh_tokens.retain(|_, t| t.is_usable(now));
        Ok((before - tables.refresh_tokens.len()) as u64)
    }
}

// ============================================================================
// Password Reset Token Repository Implementation
// ============================================================================

impl PasswordResetTokenRepository for InMemoryAuthRepository {
    async fn create(&self, token: &PasswordResetToken) -> AuthResult<()> {
        self.delay().await;
        self.tables
            .write()
            .await
            .reset_tokens
            .insert(token.token_digest.clone(), token.clone());
        Ok(())
    }

    async fn find_valid(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>> {
        self.delay().await;
        let tables = self.tables.read().await;
        Ok(tables
            .reset_tokens
            .get(digest)
            .filter(|t| !t.is_expired(now))
            .cloned())
    }

    async fn consume(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>> {
        self.delay().await;
        let mut tables = self.tables.write().await;

        let valid = tables
            .reset_tokens
            .get(digest)
            .is_some_and(|t| !t.is_expired(now));
        if !valid {
            return Ok(None);
        }
        Ok(tables.reset_tokens.remove(digest))
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        self.delay().await;
        let mut tables = self.tables.write().await;
        let before = tables.reset_tokens.len();
        tables.reset_tokens.retain(|_, t| !t.is_expired(now));
        Ok((before - tables.reset_tokens.len()) as u64)
    }
}
