//! One-shot installation of token support into a host chain
//!
//! Runs once at startup, before the chain serves traffic:
//!
//! 1. Insert a [`TokenAuthenticationUnit`] ahead of the first logout, credential
//!    check, or authorization stage (in that order of preference), or at the head of
//!    the chain when none is present.
//! 2. Wrap the `success_handler` of every credential-check stage with a
//!    [`TokenIssuingSuccessHandler`].
//! 3. Prepend a [`TokenCookieClearingLogoutHandler`] to the `handlers` of every
//!    logout stage.
//!
//! Every step is idempotent, so installing twice leaves the chain as the first
//! install did.

use std::sync::Arc;

use tokenweave_auth::{TokenSettings, UserPrincipal};
use tokenweave_pipeline::{
    AuthenticationSuccessHandler, Capability, ChainHost, LogoutHandler, PipelineWeaver, Wrapped,
    add_to_handler_list, wrap_handler_field,
};
use tracing::{info, warn};

use crate::bridge::{AuthenticationBridge, TokenAuthority};
use crate::error::{WeaveError, WeaveResult};
use crate::units::{
    TokenAuthenticationUnit, TokenCookieClearingLogoutHandler, TokenIssuingSuccessHandler,
};

/// Slot holding a credential-check stage's success handler
pub const SUCCESS_HANDLER_FIELD: &str = "success_handler";

/// Slot holding a logout stage's handler list
pub const LOGOUT_HANDLERS_FIELD: &str = "handlers";

/// Stages the token unit is placed in front of, most preferred first
pub const ANCHORS: [Capability; 3] = [
    Capability::LOGOUT,
    Capability::CREDENTIAL_CHECK,
    Capability::AUTHORIZATION,
];

/// What an installation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaveReport {
    /// Index the token unit was inserted at; `None` if one was already present
    pub inserted_at: Option<usize>,
    /// Success handlers newly wrapped
    pub success_handlers_wrapped: usize,
    /// Logout handler lists the cookie-clearing handler was added to
    pub logout_handlers_added: usize,
}

impl WeaveReport {
    /// Whether the installation changed nothing
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Installs token support into a host chain
#[derive(Debug, Clone)]
pub struct TokenWeaving {
    authority: Arc<dyn TokenAuthority>,
}

impl TokenWeaving {
    /// Weave units backed by `authority`
    pub fn new(authority: Arc<dyn TokenAuthority>) -> Self {
        Self { authority }
    }

    /// Weave units backed by `bridge`
    pub fn from_bridge<P: 'static>(bridge: AuthenticationBridge<P>) -> Self {
        Self::new(Arc::new(bridge))
    }

    /// Weave [`UserPrincipal`] tokens configured by `settings`
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::Auth`] if the settings or key material are invalid.
    pub fn from_settings(settings: &TokenSettings) -> WeaveResult<Self> {
        let bridge: AuthenticationBridge<UserPrincipal> =
            AuthenticationBridge::for_users(settings)?;
        Ok(Self::from_bridge(bridge))
    }

    /// Token authority shared by every woven unit
    pub fn authority(&self) -> &Arc<dyn TokenAuthority> {
        &self.authority
    }

    /// Graft token support into `host`'s chain
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::ChainUnavailable`] if the host has no chain, and
    /// [`WeaveError::ReflectiveAccess`] if a credential-check or logout stage lacks
    /// the slot weaving writes to. Either way the host must not start.
    pub fn install(&self, host: &mut impl ChainHost) -> WeaveResult<WeaveReport> {
        let chain = host.chain_mut().ok_or(WeaveError::ChainUnavailable)?;
        let mut weaver = PipelineWeaver::new(chain);

        let report = WeaveReport {
            inserted_at: self.insert_token_unit(&mut weaver),
            success_handlers_wrapped: self.wrap_success_handlers(&mut weaver)?,
            logout_handlers_added: self.extend_logout_handlers(&mut weaver)?,
        };

        info!(
            inserted_at = ?report.inserted_at,
            success_handlers_wrapped = report.success_handlers_wrapped,
            logout_handlers_added = report.logout_handlers_added,
            "Token support installed"
        );
        Ok(report)
    }

    fn insert_token_unit(&self, weaver: &mut PipelineWeaver<'_>) -> Option<usize> {
        if weaver.contains(Capability::TOKEN_AUTHENTICATION) {
            info!("Token authentication unit already present");
            return None;
        }

        let unit = TokenAuthenticationUnit::new(Arc::clone(&self.authority));
        let anchor = ANCHORS.into_iter().find(|anchor| weaver.contains(*anchor));
        match anchor {
            Some(anchor) => weaver.insert_before(anchor, unit),
            None => {
                warn!("No logout, credential check, or authorization stage; inserting first");
                weaver.insert_first(unit);
                Some(0)
            }
        }
    }

    fn wrap_success_handlers(&self, weaver: &mut PipelineWeaver<'_>) -> WeaveResult<usize> {
        let mut wrapped = 0;
        for unit in weaver.find_by_capability_mut(Capability::CREDENTIAL_CHECK) {
            let outcome = wrap_handler_field::<dyn AuthenticationSuccessHandler, _>(
                &mut *unit,
                SUCCESS_HANDLER_FIELD,
                TokenIssuingSuccessHandler::new(Arc::clone(&self.authority)),
            )?;
            if outcome == Wrapped::Fresh {
                wrapped += 1;
            }
        }
        Ok(wrapped)
    }

    fn extend_logout_handlers(&self, weaver: &mut PipelineWeaver<'_>) -> WeaveResult<usize> {
        let mut added = 0;
        for unit in weaver.find_by_capability_mut(Capability::LOGOUT) {
            let handler: Arc<dyn LogoutHandler> = Arc::new(TokenCookieClearingLogoutHandler::new(
                Arc::clone(&self.authority),
            ));
            if add_to_handler_list(&mut *unit, LOGOUT_HANDLERS_FIELD, handler)? {
                added += 1;
            }
        }
        Ok(added)
    }
}
