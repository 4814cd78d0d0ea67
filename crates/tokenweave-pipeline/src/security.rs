//! Host-side authentication vocabulary
//!
//! These are the types a host pipeline hands to its stages: the authenticated
//! identity, the per-request security context, and the handler seams that login
//! and logout stages call out to.

use std::any::Any;
use std::fmt;

use crate::error::PipelineResult;
use crate::unit::Exchange;

/// Authenticated (or pending) identity as the host represents it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    name: String,
    authorities: Vec<String>,
    authenticated: bool,
}

impl Authentication {
    /// An identity that is authenticated by construction
    pub fn authenticated<I, A>(name: impl Into<String>, authorities: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            name: name.into(),
            authorities: authorities.into_iter().map(Into::into).collect(),
            authenticated: true,
        }
    }

    /// An identity whose credentials have not been checked
    pub fn unauthenticated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authorities: Vec::new(),
            authenticated: false,
        }
    }

    /// Principal name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Granted authorities
    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    /// Whether credentials were verified
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Check for a granted authority
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }
}

/// Per-request security state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityContext {
    authentication: Option<Authentication>,
}

impl SecurityContext {
    /// Current authentication, if any
    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    /// Replace the current authentication
    pub fn set_authentication(&mut self, authentication: Authentication) {
        self.authentication = Some(authentication);
    }

    /// Drop the current authentication
    pub fn clear(&mut self) -> Option<Authentication> {
        self.authentication.take()
    }

    /// Whether an authenticated identity is present
    pub fn is_authenticated(&self) -> bool {
        self.authentication
            .as_ref()
            .is_some_and(Authentication::is_authenticated)
    }
}

/// Concrete-type view of a handler trait object
///
/// Call it through the trait object (`(*handler).as_any()`), not on the `Arc`.
pub trait AsAny {
    /// View as `Any`
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Called by a login stage once credentials have been verified
pub trait AuthenticationSuccessHandler: AsAny + fmt::Debug + Send + Sync {
    /// React to a successful interactive login
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be completed.
    fn on_authentication_success(
        &self,
        exchange: &mut Exchange,
        authentication: &Authentication,
    ) -> PipelineResult<()>;
}

/// Called by a logout stage, in list order
pub trait LogoutHandler: AsAny + fmt::Debug + Send + Sync {
    /// Undo whatever this handler is responsible for
    ///
    /// # Errors
    ///
    /// Returns an error if logout cannot be completed.
    fn logout(
        &self,
        exchange: &mut Exchange,
        authentication: Option<&Authentication>,
    ) -> PipelineResult<()>;
}
