//! User Role Value Object
//!
//! Closed set of authorization tiers. Wire form is the lowercase code,
//! storage form is the `SMALLINT` id. Anything else is rejected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::permission::Permission;
use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i16)]
pub enum UserRole {
    #[default]
    User = 0,
    Admin = 1,
    SuperAdmin = 2,
}

const USER_PERMISSIONS: &[Permission] = &[Permission::ProfileRead, Permission::ProfileUpdate];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::UserCreate,
    Permission::UserRead,
    Permission::UserUpdate,
    Permission::UserDelete,
];

const SUPER_ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::UserCreate,
    Permission::UserRead,
    Permission::UserUpdate,
    Permission::UserDelete,
    Permission::AdminCreate,
    Permission::AdminRead,
    Permission::AdminUpdate,
    Permission::AdminDelete,
    Permission::SystemManage,
];

impl UserRole {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        use UserRole::*;
        match self {
            User => "user",
            Admin => "admin",
            SuperAdmin => "super_admin",
        }
    }

    #[inline]
    pub const fn is_admin_or_higher(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SuperAdmin)
    }

    #[inline]
    pub const fn is_super_admin(&self) -> bool {
        matches!(self, UserRole::SuperAdmin)
    }

    /// Whether this role may use a surface that expects `expected`
    ///
    /// Roles are ordered: a SuperAdmin satisfies an Admin-only surface.
    #[inline]
    pub const fn satisfies(&self, expected: UserRole) -> bool {
        self.id() >= expected.id()
    }

    /// Fixed role to permission mapping
    pub const fn permissions(&self) -> &'static [Permission] {
        match self {
            UserRole::User => USER_PERMISSIONS,
            UserRole::Admin => ADMIN_PERMISSIONS,
            UserRole::SuperAdmin => SUPER_ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    #[inline]
    pub fn from_id(id: i16) -> Option<Self> {
        use UserRole::*;
        match id {
            0 => Some(User),
            1 => Some(Admin),
            2 => Some(SuperAdmin),
            _ => None,
        }
    }

    #[inline]
    pub fn from_code(code: &str) -> Option<Self> {
        use UserRole::*;
        match code {
            "user" => Some(User),
            "admin" => Some(Admin),
            "super_admin" => Some(SuperAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for UserRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s.trim())
            .ok_or_else(|| AuthError::Validation(format!("Unknown role: {s}")))
    }
}

impl Serialize for UserRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Self::from_code(&code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role: {code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_from_id() {
        assert_eq!(UserRole::from_id(0), Some(UserRole::User));
        assert_eq!(UserRole::from_id(1), Some(UserRole::Admin));
        assert_eq!(UserRole::from_id(2), Some(UserRole::SuperAdmin));
        assert_eq!(UserRole::from_id(7), None);
    }

    #[test]
    fn test_user_role_from_code() {
        assert_eq!(UserRole::from_code("user"), Some(UserRole::User));
        assert_eq!(UserRole::from_code("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_code("super_admin"), Some(UserRole::SuperAdmin));
        assert_eq!(UserRole::from_code("SuperAdmin"), None);
        assert!("moderator".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_satisfies_is_ordered() {
        assert!(UserRole::SuperAdmin.satisfies(UserRole::Admin));
        assert!(UserRole::Admin.satisfies(UserRole::Admin));
        assert!(!UserRole::User.satisfies(UserRole::Admin));
        assert!(!UserRole::Admin.satisfies(UserRole::SuperAdmin));
    }

    #[test]
    fn test_permission_mapping() {
        assert_eq!(
            UserRole::User.permissions(),
            &[Permission::ProfileRead, Permission::ProfileUpdate]
        );
        assert!(UserRole::Admin.has_permission(Permission::UserDelete));
        assert!(!UserRole::Admin.has_permission(Permission::AdminCreate));
        assert!(!UserRole::Admin.has_permission(Permission::ProfileRead));
        assert!(UserRole::SuperAdmin.has_permission(Permission::SystemManage));
        assert_eq!(UserRole::SuperAdmin.permissions().len(), 9);
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&UserRole::SuperAdmin).unwrap();
        assert_eq!(json, "\"super_admin\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
        assert!(serde_json::from_str::<UserRole>("\"root\"").is_err());
    }
}
