//! Stock host stages
//!
//! The stages a host framework ships before any token support is woven in: an
//! interactive login endpoint, a logout endpoint, and an authorization gate. Their
//! handler slots are the attachment points weaving reaches into.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use http::{Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::PipelineResult;
use crate::reflect;
use crate::security::{Authentication, AuthenticationSuccessHandler, LogoutHandler};
use crate::unit::{Capability, Exchange, Next, ProcessingUnit};

/// Checks submitted credentials
pub trait CredentialVerifier: Send + Sync {
    /// Authenticated identity for valid credentials, `None` otherwise
    fn verify(&self, username: &str, password: &str) -> Option<Authentication>;
}

/// Fixed set of users, for demos and tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentials {
    users: HashMap<String, (String, Vec<String>)>,
}

impl InMemoryCredentials {
    /// Empty user set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user
    #[must_use]
    pub fn with_user<I, A>(mut self, username: &str, password: &str, authorities: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.users.insert(
            username.to_string(),
            (
                password.to_string(),
                authorities.into_iter().map(Into::into).collect(),
            ),
        );
        self
    }
}

impl CredentialVerifier for InMemoryCredentials {
    fn verify(&self, username: &str, password: &str) -> Option<Authentication> {
        let (expected, authorities) = self.users.get(username)?;
        (expected == password)
            .then(|| Authentication::authenticated(username, authorities.iter().cloned()))
    }
}

/// Default login success behavior: `200 OK` naming the user
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusSuccessHandler;

impl AuthenticationSuccessHandler for StatusSuccessHandler {
    fn on_authentication_success(
        &self,
        exchange: &mut Exchange,
        authentication: &Authentication,
    ) -> PipelineResult<()> {
        exchange.respond(StatusCode::OK, format!("welcome {}", authentication.name()));
        Ok(())
    }
}

/// Shared state of every authenticating stage
pub struct AuthenticationStage {
    /// Called after credentials are verified
    pub success_handler: Arc<dyn AuthenticationSuccessHandler>,
    /// Status returned for rejected credentials
    pub failure_status: StatusCode,
}

impl Default for AuthenticationStage {
    fn default() -> Self {
        Self {
            success_handler: Arc::new(StatusSuccessHandler),
            failure_status: StatusCode::UNAUTHORIZED,
        }
    }
}

reflect!(AuthenticationStage {
    success_handler: Arc<dyn AuthenticationSuccessHandler>,
    failure_status: StatusCode,
});

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

/// Login endpoint: verifies a JSON `{username, password}` body
pub struct CredentialCheckUnit {
    /// Inherited stage state
    pub stage: AuthenticationStage,
    /// Path accepting `POST` logins
    pub login_path: String,
    /// Credential check
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl CredentialCheckUnit {
    /// Login stage at `login_path`
    pub fn new(login_path: impl Into<String>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            stage: AuthenticationStage::default(),
            login_path: login_path.into(),
            verifier,
        }
    }
}

reflect!(CredentialCheckUnit : base stage {
    login_path: String,
    verifier: Arc<dyn CredentialVerifier>,
} static {
    CAPABILITIES: &'static [Capability] = &[Capability::CREDENTIAL_CHECK],
});

#[async_trait]
impl ProcessingUnit for CredentialCheckUnit {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::CREDENTIAL_CHECK]
    }

    async fn handle<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        next: Next<'a>,
    ) -> PipelineResult<()> {
        if exchange.request.method() != Method::POST || exchange.path() != self.login_path {
            return next.run(exchange).await;
        }

        let form: LoginForm = match serde_json::from_str(exchange.request.body()) {
            Ok(form) => form,
            Err(e) => {
                debug!(error = %e, "Malformed login body");
                exchange.respond(StatusCode::BAD_REQUEST, "malformed credentials");
                return Ok(());
            }
        };

        match self.verifier.verify(&form.username, &form.password) {
            Some(authentication) => {
                debug!(user = %authentication.name(), "Credentials accepted");
                exchange.security.set_authentication(authentication.clone());
                self.stage
                    .success_handler
                    .on_authentication_success(exchange, &authentication)
            }
            None => {
                warn!(user = %form.username, "Credentials rejected");
                exchange.respond(self.stage.failure_status, "bad credentials");
                Ok(())
            }
        }
    }
}

/// Logout endpoint: runs every logout handler in order
pub struct LogoutUnit {
    /// Path accepting logouts
    pub logout_path: String,
    /// Called in order on logout
    pub handlers: Vec<Arc<dyn LogoutHandler>>,
}

impl LogoutUnit {
    /// Logout stage at `logout_path` with no handlers
    pub fn new(logout_path: impl Into<String>) -> Self {
        Self {
            logout_path: logout_path.into(),
            handlers: Vec::new(),
        }
    }

    /// Append a handler
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn LogoutHandler>) -> Self {
        self.handlers.push(handler);
        self
    }
}

reflect!(LogoutUnit {
    logout_path: String,
    handlers: Vec<Arc<dyn LogoutHandler>>,
});

#[async_trait]
impl ProcessingUnit for LogoutUnit {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::LOGOUT]
    }

    async fn handle<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        next: Next<'a>,
    ) -> PipelineResult<()> {
        if exchange.path() != self.logout_path {
            return next.run(exchange).await;
        }

        let authentication = exchange.security.clear();
        for handler in &self.handlers {
            handler.logout(exchange, authentication.as_ref())?;
        }
        debug!(
            user = authentication.as_ref().map(Authentication::name),
            handlers = self.handlers.len(),
            "Logged out"
        );
        *exchange.response.status_mut() = StatusCode::NO_CONTENT;
        Ok(())
    }
}

/// Clears the security context on logout
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearContextLogoutHandler;

impl LogoutHandler for ClearContextLogoutHandler {
    fn logout(
        &self,
        exchange: &mut Exchange,
        _authentication: Option<&Authentication>,
    ) -> PipelineResult<()> {
        exchange.security.clear();
        Ok(())
    }
}

/// Rejects unauthenticated requests under protected path prefixes
pub struct AuthorizationUnit {
    /// Path prefixes requiring authentication
    pub protected: Vec<String>,
}

impl AuthorizationUnit {
    /// Gate for the given prefixes
    pub fn new<I, S>(protected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected: protected.into_iter().map(Into::into).collect(),
        }
    }

    fn guards(&self, path: &str) -> bool {
        self.protected.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

reflect!(AuthorizationUnit {
    protected: Vec<String>,
});

#[async_trait]
impl ProcessingUnit for AuthorizationUnit {
    fn capabilities(&self) -> &[Capability] {
        &[Capability::AUTHORIZATION]
    }

    async fn handle<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        next: Next<'a>,
    ) -> PipelineResult<()> {
        if self.guards(exchange.path()) && !exchange.security.is_authenticated() {
            debug!(path = %exchange.path(), "Unauthenticated request rejected");
            exchange.respond(StatusCode::UNAUTHORIZED, "authentication required");
            return Ok(());
        }
        next.run(exchange).await
    }
}

/// Terminal stage: answers `200 OK` with the caller's name
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoUnit;

reflect!(EchoUnit {});

#[async_trait]
impl ProcessingUnit for EchoUnit {
    fn capabilities(&self) -> &[Capability] {
        &[]
    }

    async fn handle<'a>(
        &'a self,
        exchange: &'a mut Exchange,
        _next: Next<'a>,
    ) -> PipelineResult<()> {
        let who = exchange
            .security
            .authentication()
            .map_or("anonymous", Authentication::name)
            .to_string();
        exchange.respond(StatusCode::OK, format!("hello {who}"));
        Ok(())
    }
}
