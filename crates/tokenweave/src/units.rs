//! Units and handlers woven into the host chain
//!
//! - [`TokenAuthenticationUnit`] authenticates requests from their token and always
//!   continues the chain.
//! - [`TokenIssuingSuccessHandler`] decorates a login stage's success handler: it
//!   writes the token header and cookie, then hands over to the previous handler.
//! - [`TokenCookieClearingLogoutHandler`] expires the token cookie on logout.

use std::sync::Arc;

use async_trait::async_trait;
use tokenweave_pipeline::{
    Authentication, AuthenticationSuccessHandler, Capability, Decorator, Exchange,
    LogoutHandler, Next, PipelineError, PipelineResult, ProcessingUnit, reflect,
};
use tracing::{debug, trace};

use crate::bridge::TokenAuthority;

/// Request filter: token in, security context out
#[derive(Debug, Clone)]
pub struct TokenAuthenticationUnit {
    /// Token verification
    pub authority: Arc<dyn TokenAuthority>,
}

impl TokenAuthenticationUnit {
    /// Unit backed by `authority`
    pub fn new(authority: Arc<dyn TokenAuthority>) -> Self {
        Self { authority }
    }
}

reflect!(TokenAuthenticationUnit {
    authority: Arc<dyn TokenAuthority>,
});

#[async_trait]
impl ProcessingUnit for TokenAuthenticationUnit {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::TOKEN_AUTHENTICATION]
    }

    async fn handle<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        next: Next<'a>,
    ) -> PipelineResult<()> {
        match self.authority.authenticate(exchange.request.headers()) {
            Ok(authentication) => {
                debug!(
                    user = %authentication.name(),
                    path = %exchange.path(),
                    "Request authenticated from token"
                );
                exchange.security.set_authentication(authentication);
            }
            Err(e) if e.is_absent_token() => {
                trace!(path = %exchange.path(), "No token on request");
            }
            Err(e) => {
                // Unauthenticated, not failed: authorization further down decides.
                debug!(error = %e, path = %exchange.path(), "Token not accepted");
            }
        }
        next.run(exchange).await
    }
}

/// Success decorator that issues a token before the previous success behavior
#[derive(Debug, Clone)]
pub struct TokenIssuingSuccessHandler {
    authority: Arc<dyn TokenAuthority>,
    delegate: Option<Arc<dyn AuthenticationSuccessHandler>>,
}

impl TokenIssuingSuccessHandler {
    /// Decorator with no delegate yet
    pub fn new(authority: Arc<dyn TokenAuthority>) -> Self {
        Self {
            authority,
            delegate: None,
        }
    }
}

impl AuthenticationSuccessHandler for TokenIssuingSuccessHandler {
    fn on_authentication_success(
        &self,
        exchange: &mut Exchange,
        authentication: &Authentication,
    ) -> PipelineResult<()> {
        self.authority
            .issue(authentication, exchange.response.headers_mut())
            .map_err(PipelineError::source)?;
        debug!(user = %authentication.name(), "Token issued on login");

        match &self.delegate {
            Some(delegate) => delegate.on_authentication_success(exchange, authentication),
            None => Ok(()),
        }
    }
}

impl Decorator<dyn AuthenticationSuccessHandler> for TokenIssuingSuccessHandler {
    fn delegate(&self) -> Option<Arc<dyn AuthenticationSuccessHandler>> {
        self.delegate.clone()
    }

    fn with_delegate(&self, delegate: Arc<dyn AuthenticationSuccessHandler>) -> Self {
        Self {
            authority: Arc::clone(&self.authority),
            delegate: Some(delegate),
        }
    }

    fn into_handler(self: Arc<Self>) -> Arc<dyn AuthenticationSuccessHandler> {
        self
    }
}

/// Logout handler that expires the token cookie
#[derive(Debug, Clone)]
pub struct TokenCookieClearingLogoutHandler {
    authority: Arc<dyn TokenAuthority>,
}

impl TokenCookieClearingLogoutHandler {
    /// Handler backed by `authority`
    pub fn new(authority: Arc<dyn TokenAuthority>) -> Self {
        Self { authority }
    }
}

impl LogoutHandler for TokenCookieClearingLogoutHandler {
    fn logout(
        &self,
        exchange: &mut Exchange,
        authentication: Option<&Authentication>,
    ) -> PipelineResult<()> {
        self.authority
            .clear(exchange.response.headers_mut())
            .map_err(PipelineError::source)?;
        trace!(
            user = authentication.map(Authentication::name),
            "Token cookie cleared"
        );
        Ok(())
    }
}
