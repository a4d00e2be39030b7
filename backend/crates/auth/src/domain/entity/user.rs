//! User Entity
//!
//! Identity record owned by the auth service. Role, status and last login
//! only change through the orchestrator use cases.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{
    UserId, email::Email, permission::Permission, totp_secret::TotpSecret, user_name::UserName,
    user_password::UserPassword, user_role::UserRole, user_status::UserStatus,
};

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    /// Immutable identifier, also the access token subject
    pub id: UserId,
    /// Unique, lowercased
    pub email: Email,
    /// Never serialized outward
    pub password_hash: UserPassword,
    pub name: UserName,
    pub phone: String,
    /// Set at registration, never rotated automatically
    pub totp_secret: TotpSecret,
    pub role: UserRole,
    pub status: UserStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Unset for self-registration
    pub created_by: Option<UserId>,
    pub updated_by: Option<UserId>,
}

/// Validated fields for a new account
pub struct NewUser {
    pub email: Email,
    pub password_hash: UserPassword,
    pub name: UserName,
    pub phone: String,
    pub totp_secret: TotpSecret,
    pub role: UserRole,
    pub created_by: Option<UserId>,
}

impl User {
    /// Create a new Active user
    pub fn new(new: NewUser) -> Self {
        let now = Utc::now();

        Self {
            id: UserId::new(),
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            phone: new.phone.trim().to_string(),
            totp_secret: new.totp_secret,
            role: new.role,
            status: UserStatus::Active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
            created_by: new.created_by,
            updated_by: new.created_by,
        }
    }

    /// Record successful login
    pub fn record_login(&mut self) {
        let now = Utc::now();
        self.last_login_at = Some(now);
        self.updated_at = now;
    }

    pub fn can_login(&self) -> bool {
        self.status.can_login()
    }

    pub fn is_super_admin(&self) -> bool {
        self.role.is_super_admin()
    }

    /// Permissions derived from the current role
    pub fn permissions(&self) -> &'static [Permission] {
        self.role.permissions()
    }

    pub fn set_role(&mut self, role: UserRole, updated_by: UserId) {
        self.role = role;
        self.touch(Some(updated_by));
    }

    pub fn set_status(&mut self, status: UserStatus, updated_by: UserId) {
        self.status = status;
        self.touch(Some(updated_by));
    }

    /// Replace the password hash (self-service reset, no acting admin)
    pub fn set_password(&mut self, password_hash: UserPassword) {
        self.password_hash = password_hash;
        self.touch(None);
    }

    fn touch(&mut self, updated_by: Option<UserId>) {
        self.updated_at = Utc::now();
        if updated_by.is_some() {
            self.updated_by = updated_by;
        }
    }
}
