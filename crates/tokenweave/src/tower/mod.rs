//! # Tower Middleware Integration
//!
//! The request-filtering behavior of [`TokenAuthenticationUnit`](crate::TokenAuthenticationUnit)
//! for hosts built on `tower` instead of a [`Chain`](tokenweave_pipeline::Chain).
//!
//! - [`TokenAuthLayer`] - wraps services with token authentication
//! - [`TokenAuthService`] - verifies the request token and forwards the request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tokenweave::tower::TokenAuthLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(TokenAuthLayer::new(bridge))
//!     .service(my_inner_service);
//! ```
//!
//! ## Request Extensions
//!
//! A verified token puts the host [`Authentication`](tokenweave_pipeline::Authentication)
//! and the principal into the request's extensions. Requests without a valid token
//! are forwarded untouched; the inner service decides whether that is acceptable:
//!
//! ```rust,ignore
//! match req.extensions().get::<Authentication>() {
//!     Some(auth) => println!("Authenticated user: {}", auth.name()),
//!     None => return Ok(unauthorized()),
//! }
//! ```

mod layer;
mod service;

pub use layer::TokenAuthLayer;
pub use service::{TokenAuthService, TokenAuthServiceFuture};
