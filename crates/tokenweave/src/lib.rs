//! # Tokenweave
//!
//! Stateless signed-token authentication for a request pipeline someone else built.
//!
//! The host constructs its [`Chain`](tokenweave_pipeline::Chain) of login, logout,
//! and authorization stages as it always does. At startup, [`TokenWeaving::install`]
//! grafts token support into it:
//!
//! - a [`TokenAuthenticationUnit`] that turns a request's token into an
//!   authenticated security context,
//! - a [`TokenIssuingSuccessHandler`] around every login stage's success handler,
//!   so each interactive login leaves with a token header and cookie,
//! - a [`TokenCookieClearingLogoutHandler`] ahead of every logout stage's handlers.
//!
//! Tokens themselves come from [`tokenweave_auth`]; the splicing primitives from
//! [`tokenweave_pipeline`]. Hosts built on `tower` can use
//! [`TokenAuthLayer`](crate::tower::TokenAuthLayer) instead of weaving.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tokenweave::TokenWeaving;
//! use tokenweave_auth::TokenSettings;
//! use tokenweave_pipeline::Chain;
//! use tokenweave_pipeline::host::{
//!     AuthorizationUnit, CredentialCheckUnit, EchoUnit, InMemoryCredentials, LogoutUnit,
//! };
//!
//! let users = InMemoryCredentials::new().with_user("alice", "s3cret", ["ADMIN"]);
//! let mut chain = Chain::new()
//!     .with(CredentialCheckUnit::new("/login", Arc::new(users)))
//!     .with(LogoutUnit::new("/logout"))
//!     .with(AuthorizationUnit::new(["/api"]))
//!     .with(EchoUnit);
//!
//! let weaving = TokenWeaving::from_settings(&TokenSettings::with_secret("s3cr3t")).unwrap();
//! let report = weaving.install(&mut chain).unwrap();
//!
//! assert_eq!(report.inserted_at, Some(1));
//! assert_eq!(chain.type_names()[1], "TokenAuthenticationUnit");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bridge;
pub mod error;
pub mod install;
pub mod tower;
pub mod units;

pub use bridge::{
    AuthenticationBridge, NameMapping, PrincipalMapping, TokenAuthority, UserPrincipalMapping,
};
pub use error::{WeaveError, WeaveResult};
pub use install::{TokenWeaving, WeaveReport};
pub use units::{
    TokenAuthenticationUnit, TokenCookieClearingLogoutHandler, TokenIssuingSuccessHandler,
};
