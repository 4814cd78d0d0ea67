//! # Tokenweave Pipeline
//!
//! Primitives for splicing behavior into a request pipeline that some other code
//! built and owns.
//!
//! ## Features
//!
//! - **Processing chain** - [`Chain`] of async [`ProcessingUnit`]s with a [`Next`]
//!   continuation
//! - **Field access** - [`fields`] locates named, typed slots on a unit or any type it
//!   extends, and copies state between a type and its extensions
//! - **Weaving** - [`PipelineWeaver`] inserts units by capability;
//!   [`wrap_handler_field`] and [`add_to_handler_list`] rewire handler slots
//! - **Stock stages** - login, logout, and authorization units in [`host`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tokenweave_pipeline::host::{CredentialCheckUnit, EchoUnit, InMemoryCredentials, LogoutUnit};
//! use tokenweave_pipeline::{Capability, Chain, PipelineWeaver};
//!
//! let users = InMemoryCredentials::new().with_user("alice", "s3cret", ["USER"]);
//! let mut chain = Chain::new()
//!     .with(CredentialCheckUnit::new("/login", Arc::new(users)))
//!     .with(LogoutUnit::new("/logout"))
//!     .with(EchoUnit);
//!
//! let weaver = PipelineWeaver::new(&mut chain);
//! assert_eq!(weaver.position(Capability::LOGOUT), Some(1));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod fields;
pub mod host;
pub mod security;
pub mod unit;
pub mod weaver;

pub use error::{FieldAccessError, FieldResult, PipelineError, PipelineResult};
pub use fields::{FieldHandle, Reflect, SlotDecl, SlotType};
pub use security::{
    AsAny, Authentication, AuthenticationSuccessHandler, LogoutHandler, SecurityContext,
};
pub use unit::{Capability, Chain, ChainHost, Exchange, Next, ProcessingUnit};
pub use weaver::{Decorator, PipelineWeaver, Wrapped, add_to_handler_list, wrap_handler_field};
