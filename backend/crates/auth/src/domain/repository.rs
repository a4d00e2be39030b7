//! Repository Traits
//!
//! Interfaces for data persistence. Implementations live in the
//! infrastructure layer (`infra::postgres`, `infra::memory`).

use chrono::{DateTime, Utc};

use crate::domain::entity::{PasswordResetToken, RefreshToken, User};
use crate::domain::value_object::{
    UserId, email::Email, user_name::UserName, user_password::UserPassword, user_role::UserRole,
    user_status::UserStatus,
};
use crate::error::AuthResult;

/// Default page size for user listings
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
/// Largest accepted page size
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Filtered, paginated user listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersQuery {
    /// 1-based
    pub page: u32,
    pub limit: u32,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
}

impl ListUsersQuery {
    /// Normalize raw paging input: page below 1 becomes 1, limit is clamped
    /// to `1..=MAX_PAGE_LIMIT` and defaults to [`DEFAULT_PAGE_LIMIT`].
    pub fn new(
        page: Option<u32>,
        limit: Option<u32>,
        role: Option<UserRole>,
        status: Option<UserStatus>,
    ) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            role,
            status,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn matches(&self, user: &User) -> bool {
        self.role.is_none_or(|role| user.role == role)
            && self.status.is_none_or(|status| user.status == status)
    }
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self::new(None, None, None, None)
    }
}

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Insert a user. A taken email yields `AuthError::DuplicateEmail`.
    async fn create(&self, user: &User) -> AuthResult<()>;

    async fn find_by_id(&self, id: &UserId) -> AuthResult<Option<User>>;

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    /// First user with exactly this display name (admin lookup)
    async fn find_by_name(&self, name: &UserName) -> AuthResult<Option<User>>;

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool>;

    /// Stamp a successful login. Only `last_login_at` and `updated_at` change.
    /// A missing user yields `AuthError::UserNotFound`.
    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> AuthResult<()>;

    /// Replace the password hash.
    ///
    /// With `expected`, the write only happens while the stored hash still
    /// equals it and the result says whether it did. Without it the write is
    /// unconditional and always `true`.
    async fn set_password_hash(
        &self,
        id: &UserId,
        hash: &UserPassword,
        expected: Option<&UserPassword>,
        at: DateTime<Utc>,
    ) -> AuthResult<bool>;

    async fn set_role(
        &self,
        id: &UserId,
        role: UserRole,
        updated_by: &UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<()>;

    async fn set_status(
        &self,
        id: &UserId,
        status: UserStatus,
        updated_by: &UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<()>;

    /// One page of users, newest first, plus the total matching the filters
    async fn list(&self, query: &ListUsersQuery) -> AuthResult<(Vec<User>, u64)>;
}

/// Refresh token repository trait
#[trait_variant::make(RefreshTokenRepository: Send)]
pub trait LocalRefreshTokenRepository {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()>;

    /// Atomically replace a usable token's digest and expiry.
    ///
    /// Matches only when `old_digest` exists, is not revoked and
    /// `expires_at > now`. Of any number of concurrent calls with the same
    /// `old_digest`, at most one returns `Some`.
    async fn rotate(
        &self,
        old_digest: &str,
        new_digest: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<RefreshToken>>;

    /// Returns whether a row was removed
    async fn delete_by_digest(&self, digest: &str) -> AuthResult<bool>;

    /// Ends every session of a user, returns the number removed
    async fn delete_all_for_user(&self, user_id: &UserId) -> AuthResult<u64>;

    /// Remove expired and revoked rows
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Password reset token repository trait
#[trait_variant::make(PasswordResetTokenRepository: Send)]
pub trait LocalPasswordResetTokenRepository {
    async fn create(&self, token: &PasswordResetToken) -> AuthResult<()>;

    /// Token with this digest, if present and `expires_at > now`
    async fn find_valid(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>>;

    /// Delete and return a valid token. Concurrent consumers: at most one wins.
    async fn consume(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>>;

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

/// Everything the auth use cases persist
///
/// Implemented automatically for any type providing all three stores.
pub trait AuthStore:
    UserRepository + RefreshTokenRepository + PasswordResetTokenRepository + Send + Sync + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository + RefreshTokenRepository + PasswordResetTokenRepository + Send + Sync + 'static
{
}
