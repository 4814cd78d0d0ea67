//! Tower Service implementation for token authentication
//!
//! Works with `http::Request<B>`: the token is read from the configured cookie, or
//! the same-named header, and verified with the bridge's codec. Verification failure
//! is not an error here; the request goes on without an identity.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower_service::Service;
use tracing::{debug, trace};

use crate::bridge::AuthenticationBridge;

/// Tower Service that authenticates requests from their token
///
/// On success the host [`Authentication`](tokenweave_pipeline::Authentication) and
/// the principal `P` are inserted into the request's extensions.
#[derive(Debug)]
pub struct TokenAuthService<S, P> {
    inner: S,
    bridge: Arc<AuthenticationBridge<P>>,
}

impl<S: Clone, P> Clone for TokenAuthService<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            bridge: Arc::clone(&self.bridge),
        }
    }
}

impl<S, P> TokenAuthService<S, P> {
    /// Create a new token auth service
    pub fn new(inner: S, bridge: Arc<AuthenticationBridge<P>>) -> Self {
        Self { inner, bridge }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

/// Future type for token auth service responses
pub type TokenAuthServiceFuture<T, E> = BoxFuture<'static, Result<T, E>>;

impl<S, P, B> Service<http::Request<B>> for TokenAuthService<S, P>
where
    S: Service<http::Request<B>> + Clone + Send + 'static,
    S::Future: Send,
    P: Clone + Send + Sync + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TokenAuthServiceFuture<S::Response, S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        match self.bridge.read_principal(req.headers()) {
            Ok(principal) => {
                let authentication = self.bridge.to_host_auth(principal.clone());
                debug!(
                    user = %authentication.name(),
                    path = %req.uri().path(),
                    "Request authenticated from token"
                );
                req.extensions_mut().insert(authentication);
                req.extensions_mut().insert(principal);
            }
            Err(e) => {
                trace!(error = %e, path = %req.uri().path(), "Request continues unauthenticated");
            }
        }

        // The clone is ready only if polled; keep the polled service for this call.
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);
        Box::pin(async move { inner.call(req).await })
    }
}
