//! Shared Kernel
//!
//! Vocabulary shared by every backend crate:
//! - the error taxonomy ([`error::kind::ErrorKind`]) and the unified
//!   [`error::app_error::AppError`] rendered as RFC 7807 problem details
//! - typed entity identifiers ([`id::Id`])
//!
//! Nothing domain specific lives here; auth rules stay in the `auth` crate.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
