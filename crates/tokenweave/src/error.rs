//! Startup errors raised while weaving token support into a host

use thiserror::Error;
use tokenweave_auth::AuthError;
use tokenweave_pipeline::FieldAccessError;

/// Result alias for installation
pub type WeaveResult<T> = Result<T, WeaveError>;

/// Failure to install token support
///
/// Every variant is fatal: the host must not start serving traffic.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// The host has not built a chain to weave into
    #[error("host pipeline chain is unavailable")]
    ChainUnavailable,

    /// A host unit does not expose the slot weaving expects
    #[error("reflective access failed: {0}")]
    ReflectiveAccess(#[from] FieldAccessError),

    /// Token codec or transport could not be built
    #[error(transparent)]
    Auth(#[from] AuthError),
}
