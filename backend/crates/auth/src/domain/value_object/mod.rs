//! Value Object Module

pub mod email;
pub mod opaque_token;
pub mod permission;
pub mod totp_secret;
pub mod user_name;
pub mod user_password;
pub mod user_role;
pub mod user_status;

pub use kernel::id::{PasswordResetTokenId, RefreshTokenId, UserId};
