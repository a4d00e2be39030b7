//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::domain::entity::{PasswordResetToken, RefreshToken, User};
use crate::domain::repository::{
    ListUsersQuery, PasswordResetTokenRepository, RefreshTokenRepository, UserRepository,
};
use crate::domain::value_object::{
    PasswordResetTokenId, RefreshTokenId, UserId, email::Email, totp_secret::TotpSecret,
    user_name::UserName, user_password::UserPassword, user_role::UserRole,
    user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

const USER_COLUMNS: &str = r#"
    id,
    email,
    password_hash,
    name,
    phone,
    totp_secret,
    role,
    status,
    last_login_at,
    created_at,
    updated_at,
    created_by,
    updated_by
"#;

const REFRESH_TOKEN_COLUMNS: &str =
    "id, user_id, token_digest, expires_at, revoked, created_at, updated_at";

const RESET_TOKEN_COLUMNS: &str = "id, user_id, token_digest, expires_at, created_at, updated_at";

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Purge dead refresh and reset tokens
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = Utc::now();
        let sessions = RefreshTokenRepository::cleanup_expired(self, now).await?;
        let resets = PasswordResetTokenRepository::cleanup_expired(self, now).await?;

        tracing::info!(
            refresh_tokens_deleted = sessions,
            reset_tokens_deleted = resets,
            "Cleaned up expired auth tokens"
        );

        Ok(sessions + resets)
    }

    async fn find_user_where<T>(&self, clause: &str, value: T) -> AuthResult<Option<User>>
    where
        T: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + 'static,
    {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UserRow::into_user).transpose()
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id,
                email,
                password_hash,
                name,
                phone,
                totp_secret,
                role,
                status,
                last_login_at,
                created_at,
                updated_at,
                created_by,
                updated_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_phc_string())
        .bind(user.name.as_str())
        .bind(&user.phone)
        .bind(user.totp_secret.as_base32())
        .bind(user.role.id())
        .bind(user.status.id())
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.created_by.map(|id| *id.as_uuid()))
        .bind(user.updated_by.map(|id| *id.as_uuid()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> AuthResult<Option<User>> {
        self.find_user_where("id = $1", *id.as_uuid()).await
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        self.find_user_where("email = $1", email.as_str().to_string())
            .await
    }

    async fn find_by_name(&self, name: &UserName) -> AuthResult<Option<User>> {
        self.find_user_where(
            "name = $1 ORDER BY created_at ASC LIMIT 1",
            name.as_str().to_string(),
        )
        .await
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> AuthResult<()> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        require_row(result.rows_affected())
    }

    async fn set_password_hash(
        &self,
        id: &UserId,
        hash: &UserPassword,
        expected: Option<&UserPassword>,
        at: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $2,
                updated_at = $3
            WHERE id = $1
              AND ($4::TEXT IS NULL OR password_hash = $4)
            "#,
        )
        .bind(id.as_uuid())
        .bind(hash.as_phc_string())
        .bind(at)
        .bind(expected.map(UserPassword::as_phc_string))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Tell a lost swap apart from a missing user
        match expected {
            Some(_) if self.find_by_id(id).await?.is_some() => Ok(false),
            _ => Err(AuthError::UserNotFound),
        }
    }

    async fn set_role(
        &self,
        id: &UserId,
        role: UserRole,
        updated_by: &UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<()> {
        let result = sqlx::query(
            "UPDATE users SET role = $2, updated_by = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(role.id())
        .bind(updated_by.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        require_row(result.rows_affected())
    }

    async fn set_status(
        &self,
        id: &UserId,
        status: UserStatus,
        updated_by: &UserId,
        at: DateTime<Utc>,
    ) -> AuthResult<()> {
        let result = sqlx::query(
            "UPDATE users SET status = $2, updated_by = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(status.id())
        .bind(updated_by.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;

        require_row(result.rows_affected())
    }

    async fn list(&self, query: &ListUsersQuery) -> AuthResult<(Vec<User>, u64)> {
        let role = query.role.map(|r| r.id());
        let status = query.status.map(|s| s.id());

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM users
            WHERE ($1::SMALLINT IS NULL OR role = $1)
              AND ($2::SMALLINT IS NULL OR status = $2)
            "#,
        )
        .bind(role)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::SMALLINT IS NULL OR role = $1)
              AND ($2::SMALLINT IS NULL OR status = $2)
            ORDER BY created_at DESC, id
            LIMIT $3 OFFSET $4
            "#
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role)
            .bind(status)
            .bind(i64::from(query.limit))
            .bind(i64::try_from(query.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let users = rows
            .into_iter()
            .map(UserRow::into_user)
            .collect::<AuthResult<Vec<_>>>()?;

        Ok((users, u64::try_from(total).unwrap_or_default()))
    }
}

/// Single-row updates address users by id; no row means no such user
fn require_row(rows_affected: u64) -> AuthResult<()> {
    if rows_affected == 0 {
        return Err(AuthError::UserNotFound);
    }
    Ok(())
}

// ============================================================================
// Refresh Token Repository Implementation
// ============================================================================

impl RefreshTokenRepository for PgAuthRepository {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                id,
                user_id,
                token_digest,
                expires_at,
                revoked,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_digest)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate(
        &self,
        old_digest: &str,
        new_digest: &str,
        new_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<RefreshToken>> {
        // Single conditional UPDATE: the row lock serializes racing rotations
        let sql = format!(
            r#"
            UPDATE refresh_tokens SET
                token_digest = $2,
                expires_at = $3,
                updated_at = $4
            WHERE token_digest = $1
              AND expires_at > $4
              AND NOT revoked
            RETURNING {REFRESH_TOKEN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RefreshTokenRow>(&sql)
            .bind(old_digest)
            .bind(new_digest)
            .bind(new_expires_at)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RefreshTokenRow::into_refresh_token))
    }

    async fn delete_by_digest(&self, digest: &str) -> AuthResult<bool> {
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE token_digest = $1")
            .bind(digest)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted =
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1 OR revoked")
                .bind(now)
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Password Reset Token Repository Implementation
// ============================================================================

impl PasswordResetTokenRepository for PgAuthRepository {
    async fn create(&self, token: &PasswordResetToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (
                id,
                user_id,
                token_digest,
                expires_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.user_id.as_uuid())
        .bind(&token.token_digest)
        .bind(token.expires_at)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_valid(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>> {
        let sql = format!(
            "SELECT {RESET_TOKEN_COLUMNS} FROM password_reset_tokens \
             WHERE token_digest = $1 AND expires_at > $2"
        );
        let row = sqlx::query_as::<_, ResetTokenRow>(&sql)
            .bind(digest)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ResetTokenRow::into_reset_token))
    }

    async fn consume(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<PasswordResetToken>> {
        let sql = format!(
            "DELETE FROM password_reset_tokens \
             WHERE token_digest = $1 AND expires_at > $2 \
             RETURNING {RESET_TOKEN_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ResetTokenRow>(&sql)
            .bind(digest)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(ResetTokenRow::into_reset_token))
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    phone: String,
    totp_secret: String,
    role: i16,
    status: i16,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        Ok(User {
            id: UserId::from_uuid(self.id),
            email: Email::from_db(self.email),
            password_hash: UserPassword::from_phc_string(self.password_hash)?,
            name: UserName::from_db(self.name),
            phone: self.phone,
            totp_secret: TotpSecret::from_base32(self.totp_secret)?,
            role: UserRole::from_id(self.role)
                .ok_or_else(|| AuthError::Internal(format!("Invalid role id: {}", self.role)))?,
            status: UserStatus::from_id(self.status)
                .ok_or_else(|| AuthError::Internal(format!("Invalid status id: {}", self.status)))?,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            created_by: self.created_by.map(UserId::from_uuid),
            updated_by: self.updated_by.map(UserId::from_uuid),
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_digest: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn into_refresh_token(self) -> RefreshToken {
        RefreshToken {
            id: RefreshTokenId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            token_digest: self.token_digest,
            expires_at: self.expires_at,
            revoked: self.revoked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ResetTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_digest: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResetTokenRow {
    fn into_reset_token(self) -> PasswordResetToken {
        PasswordResetToken {
            id: PasswordResetTokenId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            token_digest: self.token_digest,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
