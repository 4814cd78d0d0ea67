//! Stock principal type
//!
//! Applications may carry any serde type inside tokens; [`UserPrincipal`] covers the
//! common username + roles case.

use serde::{Deserialize, Serialize};

/// Authenticated user identity carried inside a token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserPrincipal {
    /// Login name
    pub username: String,
    /// Granted roles (e.g., `["ADMIN"]`)
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserPrincipal {
    /// Create a principal
    pub fn new<I, R>(username: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if the principal has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
