//! Token transport over HTTP
//!
//! Tokens travel in a named cookie and in a response header of the same name. On the
//! way in, the cookie wins; the header is the fallback for non-browser clients.

use cookie::Cookie;
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;

use crate::config::{CookieSettings, TokenSettings};
use crate::error::{AuthError, AuthResult};

/// Reads and writes the token cookie and header
#[derive(Debug, Clone)]
pub struct TokenTransport {
    name: String,
    header: HeaderName,
    cookie: CookieSettings,
}

impl TokenTransport {
    /// Create a transport for `name`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `name` is not a valid header name.
    pub fn new(name: impl Into<String>, cookie: CookieSettings) -> AuthResult<Self> {
        let name = name.into();
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            AuthError::configuration(format!("`{name}` is not a valid header name: {e}"))
        })?;
        Ok(Self {
            name,
            header,
            cookie,
        })
    }

    /// Create a transport from settings
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn from_settings(settings: &TokenSettings) -> AuthResult<Self> {
        Self::new(settings.attribute_name.clone(), settings.cookie.clone())
    }

    /// Cookie and header name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token carried by a request, or an empty string if there is none
    ///
    /// Every `Cookie` header is searched for a cookie with exactly this name before
    /// the same-named header is consulted. Empty values count as missing.
    pub fn extract(&self, headers: &HeaderMap) -> String {
        if let Some(token) = self.from_cookie(headers) {
            trace!(name = %self.name, "Token found in cookie");
            return token;
        }
        if let Some(token) = headers
            .get(&self.header)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            trace!(name = %self.name, "Token found in header");
            return token.to_string();
        }
        String::new()
    }

    fn from_cookie(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|c| c.name() == self.name && !c.value().is_empty())
            .map(|c| c.value().to_string())
    }

    /// Write `token` as both a response header and a cookie
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the token or cookie attributes cannot
    /// be expressed as header values.
    pub fn apply(&self, headers: &mut HeaderMap, token: &str) -> AuthResult<()> {
        let value = HeaderValue::from_str(token)
            .map_err(|e| AuthError::configuration(format!("token is not a header value: {e}")))?;
        headers.insert(self.header.clone(), value);
        let cookie = self.build_cookie(token.to_string(), self.cookie.max_age);
        headers.append(SET_COOKIE, set_cookie_value(&cookie)?);
        Ok(())
    }

    /// Expire the token cookie; no header is written
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the cookie attributes cannot be
    /// expressed as a header value.
    pub fn clear(&self, headers: &mut HeaderMap) -> AuthResult<()> {
        let cookie = self.build_cookie(String::new(), Some(0));
        headers.append(SET_COOKIE, set_cookie_value(&cookie)?);
        Ok(())
    }

    fn build_cookie(&self, value: String, max_age: Option<i64>) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), value))
            .path(self.cookie.path.clone())
            .secure(self.cookie.secure)
            .http_only(self.cookie.http_only);
        if let Some(domain) = &self.cookie.domain {
            builder = builder.domain(domain.clone());
        }
        if let Some(seconds) = max_age {
            builder = builder.max_age(cookie::time::Duration::seconds(seconds));
        }
        if let Some(policy) = self.cookie.same_site {
            builder = builder.same_site(policy.into());
        }
        builder.build()
    }
}

fn set_cookie_value(cookie: &Cookie<'_>) -> AuthResult<HeaderValue> {
    HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AuthError::configuration(format!("cookie is not a header value: {e}")))
}
