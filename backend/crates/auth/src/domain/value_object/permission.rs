//! Permission Value Object
//!
//! Fine-grained capabilities. Never stored: always derived from the current
//! [`UserRole`](super::user_role::UserRole) at read time.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    UserCreate,
    UserRead,
    UserUpdate,
    UserDelete,
    AdminCreate,
    AdminRead,
    AdminUpdate,
    AdminDelete,
    SystemManage,
    ProfileRead,
    ProfileUpdate,
}

impl Permission {
    pub const ALL: [Permission; 11] = [
        Permission::UserCreate,
        Permission::UserRead,
        Permission::UserUpdate,
        Permission::UserDelete,
        Permission::AdminCreate,
        Permission::AdminRead,
        Permission::AdminUpdate,
        Permission::AdminDelete,
        Permission::SystemManage,
        Permission::ProfileRead,
        Permission::ProfileUpdate,
    ];

    #[inline]
    pub const fn code(&self) -> &'static str {
        use Permission::*;
        match self {
            UserCreate => "user:create",
            UserRead => "user:read",
            UserUpdate => "user:update",
            UserDelete => "user:delete",
            AdminCreate => "admin:create",
            AdminRead => "admin:read",
            AdminUpdate => "admin:update",
            AdminDelete => "admin:delete",
            SystemManage => "system:manage",
            ProfileRead => "profile:read",
            ProfileUpdate => "profile:update",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.code() == code)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Permission {
    type Err = AuthError;

    /// An unknown permission can never be satisfied, so it is `Forbidden`
    /// rather than a validation error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s.trim()).ok_or(AuthError::Forbidden)
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Self::from_code(&code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown permission: {code}")))
    }
}
