//! Domain entities

pub mod password_reset_token;
pub mod refresh_token;
pub mod user;

pub use password_reset_token::PasswordResetToken;
pub use refresh_token::RefreshToken;
pub use user::{NewUser, User};
