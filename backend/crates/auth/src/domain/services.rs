//! Domain Services
//!
//! Stateless credential primitives used by the use cases:
//! - [`TokenSigner`]: HS256 access tokens bound to an immutable [`SigningKey`]
//! - [`TotpManager`]: TOTP enrollment and verification for one issuer

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use platform::crypto;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_object::{UserId, totp_secret::TotpSecret};
use crate::error::AuthResult;

// ============================================================================
// Signing key
// ============================================================================

/// Minimum HMAC key length accepted from configuration
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Length of a generated fallback key
const GENERATED_KEY_BYTES: usize = 64;

/// Accepted clock difference between services, in seconds
const LEEWAY_SECS: u64 = 5;

/// Symmetric key for access tokens
///
/// Built once at startup and moved into a [`TokenSigner`]. There is no way to
/// swap the key of an existing signer.
pub struct SigningKey {
    bytes: Vec<u8>,
    generated: bool,
}

impl SigningKey {
    /// Use a configured secret
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, TokenError> {
        let bytes = secret.as_ref().to_vec();
        if bytes.len() < MIN_SIGNING_KEY_BYTES {
            return Err(TokenError::KeyNotInitialized(format!(
                "signing key must be at least {MIN_SIGNING_KEY_BYTES} bytes (got {})",
                bytes.len()
            )));
        }
        Ok(Self {
            bytes,
            generated: false,
        })
    }

    /// Random process-local key
    ///
    /// Tokens signed with it become invalid on restart and are not accepted
    /// by other replicas.
    pub fn generate() -> Self {
        tracing::warn!(
            "No JWT signing secret configured; generated an ephemeral key. \
             All access tokens will be invalidated on restart. Set JWT_SECRET_KEY in production."
        );
        Self {
            bytes: crypto::random_bytes(GENERATED_KEY_BYTES),
            generated: true,
        }
    }

    /// `Some(secret)` from configuration, otherwise a generated key
    pub fn from_config(secret: Option<&str>) -> Result<Self, TokenError> {
        match secret.map(str::trim).filter(|s| !s.is_empty()) {
            Some(secret) => Self::from_secret(secret),
            None => Ok(Self::generate()),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("bytes", &"[REDACTED]")
            .field("generated", &self.generated)
            .finish()
    }
}

// ============================================================================
// Claims and errors
// ============================================================================

/// Access token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Immutable user id
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    /// Unique per token
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Malformed)
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    /// Includes `alg: none`
    #[error("token uses an unexpected signing algorithm")]
    AlgorithmMismatch,

    /// Wrong issuer, not yet valid, or a required claim is missing
    #[error("token claims rejected: {0}")]
    ClaimsRejected(String),

    /// Startup precondition, never a per-request condition
    #[error("signing key not initialized: {0}")]
    KeyNotInitialized(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::AlgorithmMismatch
            }
            ErrorKind::InvalidIssuer
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => TokenError::ClaimsRejected(err.to_string()),
            _ => TokenError::Malformed,
        }
    }
}

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Token signer
// ============================================================================

/// Issues and verifies HS256 access tokens
///
/// Shared read-only across request tasks (`Arc<TokenSigner>`).
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl TokenSigner {
    pub fn new(key: SigningKey, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256];
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = LEEWAY_SECS;

        Self {
            encoding: EncodingKey::from_secret(&key.bytes),
            decoding: DecodingKey::from_secret(&key.bytes),
            validation,
            issuer,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a token for `subject` valid for `ttl`
    pub fn issue(&self, subject: &UserId, ttl: Duration) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| TokenError::Signing(format!("invalid ttl: {e}")))?;
        let expires_at = now + ttl;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Check signature, algorithm, issuer and time claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token.trim(), &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TOTP manager
// ============================================================================

/// Enrollment material shown to the user once
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    pub secret: TotpSecret,
    pub uri: String,
}

/// TOTP operations scoped to one issuer name
#[derive(Debug, Clone)]
pub struct TotpManager {
    issuer: String,
}

impl TotpManager {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// New secret plus its `otpauth://` URI for `account_label`
    pub fn generate_secret(&self, account_label: &str) -> AuthResult<TotpEnrollment> {
        let secret = TotpSecret::generate();
        let uri = secret.enrollment_uri(&self.issuer, account_label)?;
        Ok(TotpEnrollment { secret, uri })
    }

    pub fn validate_code(&self, code: &str, secret: &TotpSecret, at: DateTime<Utc>) -> AuthResult<bool> {
        // Pre-epoch instants cannot carry a valid code
        let Ok(unix_time) = u64::try_from(at.timestamp()) else {
            return Ok(false);
        };
        secret.verify_at(code, unix_time)
    }
}
