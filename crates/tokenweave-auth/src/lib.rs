//! # Tokenweave Auth - Signed Session Tokens
//!
//! Issues and verifies compact signed session tokens (JWT) that carry an
//! application-defined principal, and moves them over HTTP as a cookie plus a
//! same-named header.
//!
//! ## Architecture
//!
//! - [`algorithm`] - Signature algorithm catalog and families
//! - [`keys`] - Key material resolution from a configured secret
//! - [`codec`] - `TokenCodec`: principal to token and back
//! - [`marshal`] - Pluggable principal marshaling (identity, map, packed)
//! - [`wire`] - Byte codecs used by packed marshaling
//! - [`clock`] - Injectable time source for expiry
//! - [`transport`] - Cookie/header token transport
//! - [`config`] - `TokenSettings` loading and validation
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tokenweave_auth::{MapMarshaller, TokenCodec, TokenSettings, UserPrincipal};
//!
//! let settings = TokenSettings::with_secret("s3cr3t");
//! let codec = TokenCodec::from_settings(&settings, Arc::new(MapMarshaller::new())).unwrap();
//!
//! let alice = UserPrincipal::new("alice", ["ADMIN"]);
//! let token = codec.encode(&alice).unwrap();
//! assert_eq!(codec.decode(&token).unwrap(), alice);
//! ```
//!
//! ## Algorithms
//!
//! | Family | Algorithms | Secret |
//! |--------|------------|--------|
//! | Symmetric | HS256, HS384, HS512 | any string |
//! | RSA | RS256, RS384, RS512 | PKCS#8 or PKCS#1 PEM |
//! | RSA-PSS | PS256, PS384, PS512 | PKCS#8 or PKCS#1 PEM |
//! | ECDSA | ES256 (P-256), ES384 (P-384) | PKCS#8 or SEC1 PEM |
//!
//! `none` is part of the catalog but is refused at construction.

pub mod algorithm;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod keys;
pub mod marshal;
pub mod principal;
pub mod transport;
pub mod wire;

#[doc(inline)]
pub use algorithm::{AlgorithmFamily, SignatureAlgorithm};
#[doc(inline)]
pub use clock::{Clock, ManualClock, SystemClock};
#[doc(inline)]
pub use codec::{EXPIRY_MILLIS_CLAIM, PRINCIPAL_CLAIM, TokenCodec};
#[doc(inline)]
pub use config::{CookieSettings, SameSitePolicy, SecretSource, TimeUnit, TokenSettings};
#[doc(inline)]
pub use error::{AuthError, AuthResult, MarshalError, TokenError};
#[doc(inline)]
pub use keys::{KeyKind, KeyPair};
#[doc(inline)]
pub use marshal::{
    IdentityMarshaller, MapMarshaller, PackedMarshaller, PrincipalEncoding, PrincipalMarshaller,
};
#[doc(inline)]
pub use principal::UserPrincipal;
#[doc(inline)]
pub use transport::TokenTransport;
#[doc(inline)]
pub use wire::{Codec, CodecError, CodecResult, JsonCodec, MsgPackCodec};

// Re-exported so downstream crates configure secrets without a direct dependency
pub use secrecy::{ExposeSecret, SecretString};
