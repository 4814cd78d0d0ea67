//! Error types for token issuing and verification
//!
//! Two classes of failure exist:
//!
//! - **Per-request** failures ([`AuthError::InvalidToken`]) are always recoverable.
//!   Callers map them to "unauthenticated" and let downstream authorization decide.
//! - **Startup** failures ([`AuthError::InvalidKeyMaterial`], [`AuthError::Configuration`])
//!   abort initialization. There is no degraded mode.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::wire::CodecError;

/// Result alias used throughout this crate
pub type AuthResult<T> = Result<T, AuthError>;

/// Top-level error for token operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token could not be accepted (absent, malformed, badly signed, expired,
    /// or carrying an undecodable principal)
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Key material could not be parsed or does not match the algorithm
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Settings are missing or contradict each other
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A principal could not be marshaled into a claim while encoding
    #[error("principal marshaling failed: {0}")]
    PrincipalMarshal(#[from] MarshalError),
}

impl AuthError {
    /// Create an invalid key material error
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether this error should be treated as "unauthenticated"
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, Self::InvalidToken(_))
    }

    /// Whether this error must abort process startup
    pub fn is_startup_fatal(&self) -> bool {
        matches!(self, Self::InvalidKeyMaterial(_) | Self::Configuration(_))
    }

    /// Whether the token was simply not supplied
    pub fn is_absent_token(&self) -> bool {
        matches!(self, Self::InvalidToken(TokenError::Absent))
    }
}

/// Reason a token was rejected during decoding
#[derive(Debug, Error)]
pub enum TokenError {
    /// Empty input: no token was supplied with the request
    #[error("no token supplied")]
    Absent,

    /// Parsing or signature verification failed
    #[error("verification failed: {0}")]
    Verification(#[from] jsonwebtoken::errors::Error),

    /// The expiry instant has elapsed
    #[error("token expired at {expired_at}")]
    Expired {
        /// Absolute expiry carried by the token
        expired_at: DateTime<Utc>,
    },

    /// The expiry claim is not a representable instant
    #[error("token expiry claim {0} is out of range")]
    ExpiryOutOfRange(i64),

    /// The signed payload does not carry a principal claim
    #[error("token carries no principal claim")]
    MissingPrincipal,

    /// The principal claim could not be turned back into a principal
    #[error("principal claim could not be decoded: {0}")]
    Unmarshal(#[source] MarshalError),
}

/// Failure converting between a principal and its claim value
#[derive(Debug, Error)]
pub enum MarshalError {
    /// The claim value does not have the shape the strategy expects
    #[error("expected a {expected} claim, found {found}")]
    UnexpectedShape {
        /// Shape required by the strategy
        expected: &'static str,
        /// Shape actually present
        found: &'static str,
    },

    /// Object mapping failed
    #[error("object mapping failed: {0}")]
    Mapping(#[from] serde_json::Error),

    /// Binary pack/unpack failed
    #[error("binary codec failed: {0}")]
    Codec(#[from] CodecError),

    /// Base64 armor could not be removed
    #[error("invalid base64 armor: {0}")]
    Armor(#[from] base64::DecodeError),
}
