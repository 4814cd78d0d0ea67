//! Conversion between host authentications and token principals
//!
//! The host pipeline speaks [`Authentication`]; tokens carry an application
//! principal `P`. [`AuthenticationBridge`] sits between the two: it finds the token
//! on a request, verifies it with the [`TokenCodec`], and turns the principal into an
//! authentication the host trusts without re-checking credentials. In the other
//! direction it turns a fresh login into a token on the response.

use std::fmt;
use std::sync::Arc;

use http::HeaderMap;
use tokenweave_auth::{AuthResult, TokenCodec, TokenSettings, TokenTransport, UserPrincipal};
use tokenweave_pipeline::Authentication;
use tracing::trace;

/// Maps between the host's authentication and the token principal
pub trait PrincipalMapping<P>: Send + Sync {
    /// Principal to carry in a token for `authentication`
    fn to_principal(&self, authentication: &Authentication) -> P;

    /// Host authentication for a verified principal
    ///
    /// The result is authenticated by construction.
    fn to_host_auth(&self, principal: P) -> Authentication;
}

/// [`UserPrincipal`] mapping: name to username, authorities to roles
#[derive(Debug, Clone, Copy, Default)]
pub struct UserPrincipalMapping;

impl PrincipalMapping<UserPrincipal> for UserPrincipalMapping {
    fn to_principal(&self, authentication: &Authentication) -> UserPrincipal {
        UserPrincipal::new(
            authentication.name(),
            authentication.authorities().iter().cloned(),
        )
    }

    fn to_host_auth(&self, principal: UserPrincipal) -> Authentication {
        Authentication::authenticated(principal.username, principal.roles)
    }
}

/// Bare-name mapping for tokens that carry only the username
#[derive(Debug, Clone, Copy, Default)]
pub struct NameMapping;

impl PrincipalMapping<String> for NameMapping {
    fn to_principal(&self, authentication: &Authentication) -> String {
        authentication.name().to_string()
    }

    fn to_host_auth(&self, principal: String) -> Authentication {
        Authentication::authenticated(principal, Vec::<String>::new())
    }
}

/// Token codec, transport, and principal mapping for one principal type
pub struct AuthenticationBridge<P> {
    codec: Arc<TokenCodec<P>>,
    transport: TokenTransport,
    mapping: Arc<dyn PrincipalMapping<P>>,
}

impl<P> Clone for AuthenticationBridge<P> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            transport: self.transport.clone(),
            mapping: Arc::clone(&self.mapping),
        }
    }
}

impl<P> fmt::Debug for AuthenticationBridge<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationBridge")
            .field("codec", &self.codec)
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}

impl<P> AuthenticationBridge<P> {
    /// Assemble a bridge from its parts
    pub fn new(
        codec: Arc<TokenCodec<P>>,
        transport: TokenTransport,
        mapping: Arc<dyn PrincipalMapping<P>>,
    ) -> Self {
        Self {
            codec,
            transport,
            mapping,
        }
    }

    /// Token codec
    pub fn codec(&self) -> &TokenCodec<P> {
        &self.codec
    }

    /// Cookie/header transport
    pub fn transport(&self) -> &TokenTransport {
        &self.transport
    }

    /// Principal for `authentication`
    pub fn to_principal(&self, authentication: &Authentication) -> P {
        self.mapping.to_principal(authentication)
    }

    /// Authenticated host identity for `principal`
    pub fn to_host_auth(&self, principal: P) -> Authentication {
        self.mapping.to_host_auth(principal)
    }

    /// Token carried by a request: cookie first, then header, else empty
    pub fn extract_token(&self, headers: &HeaderMap) -> String {
        self.transport.extract(headers)
    }

    /// Verify the request's token and recover its principal
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`](tokenweave_auth::AuthError::InvalidToken)
    /// when the token is absent or does not verify.
    pub fn read_principal(&self, headers: &HeaderMap) -> AuthResult<P> {
        let token = self.extract_token(headers);
        self.codec.decode(&token)
    }

    /// Verify the request's token and build the host authentication
    ///
    /// # Errors
    ///
    /// As for [`read_principal`](Self::read_principal).
    pub fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Authentication> {
        self.read_principal(headers).map(|p| self.to_host_auth(p))
    }

    /// Encode `authentication` and write it as header and cookie
    ///
    /// Returns the issued token.
    ///
    /// # Errors
    ///
    /// Returns an error if the principal cannot be encoded or the token cannot be
    /// written as header values.
    pub fn issue(
        &self,
        authentication: &Authentication,
        headers: &mut HeaderMap,
    ) -> AuthResult<String> {
        let principal = self.to_principal(authentication);
        let token = self.codec.encode(&principal)?;
        self.transport.apply(headers, &token)?;
        trace!(user = %authentication.name(), "Token issued");
        Ok(token)
    }

    /// Expire the token cookie
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie cannot be written as a header value.
    pub fn clear(&self, headers: &mut HeaderMap) -> AuthResult<()> {
        self.transport.clear(headers)
    }
}

impl AuthenticationBridge<UserPrincipal> {
    /// Bridge for [`UserPrincipal`] tokens built from settings
    ///
    /// # Errors
    ///
    /// Returns a startup error if the settings are invalid or the key material does
    /// not fit the algorithm.
    pub fn for_users(settings: &TokenSettings) -> AuthResult<Self> {
        let codec = TokenCodec::structured(settings)?;
        let transport = TokenTransport::from_settings(settings)?;
        Ok(Self::new(Arc::new(codec), transport, Arc::new(UserPrincipalMapping)))
    }
}

/// Type-erased bridge, as held by the woven units
pub trait TokenAuthority: fmt::Debug + Send + Sync {
    /// Authentication carried by the request's token
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`](tokenweave_auth::AuthError::InvalidToken)
    /// when the token is absent or does not verify.
    fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Authentication>;

    /// Issue a token for `authentication` onto response headers
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be encoded or written.
    fn issue(&self, authentication: &Authentication, headers: &mut HeaderMap) -> AuthResult<()>;

    /// Expire the token cookie on response headers
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie cannot be written.
    fn clear(&self, headers: &mut HeaderMap) -> AuthResult<()>;
}

impl<P: 'static> TokenAuthority for AuthenticationBridge<P> {
    fn authenticate(&self, headers: &HeaderMap) -> AuthResult<Authentication> {
        AuthenticationBridge::authenticate(self, headers)
    }

    fn issue(&self, authentication: &Authentication, headers: &mut HeaderMap) -> AuthResult<()> {
        AuthenticationBridge::issue(self, authentication, headers).map(drop)
    }

    fn clear(&self, headers: &mut HeaderMap) -> AuthResult<()> {
        AuthenticationBridge::clear(self, headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http::header::{COOKIE, SET_COOKIE};

    fn bridge() -> AuthenticationBridge<UserPrincipal> {
        AuthenticationBridge::for_users(&TokenSettings::with_secret("s3cr3t")).unwrap()
    }

    #[test]
    fn test_user_mapping_round_trip() {
        let authentication = Authentication::authenticated("alice", ["ADMIN"]);
        let principal = UserPrincipalMapping.to_principal(&authentication);
        assert_eq!(principal, UserPrincipal::new("alice", ["ADMIN"]));
        assert_eq!(UserPrincipalMapping.to_host_auth(principal), authentication);
    }

    #[test]
    fn test_issue_then_authenticate_from_cookie() {
        let bridge = bridge();
        let alice = Authentication::authenticated("alice", ["ADMIN"]);

        let mut response = HeaderMap::new();
        let token = bridge.issue(&alice, &mut response).unwrap();
        assert_eq!(response.get("X-Auth-Token").unwrap(), token.as_str());
        assert!(response.contains_key(SET_COOKIE));

        let mut request = HeaderMap::new();
        request.insert(
            COOKIE,
            HeaderValue::from_str(&format!("X-Auth-Token={token}")).unwrap(),
        );
        assert_eq!(bridge.authenticate(&request).unwrap(), alice);
    }

    #[test]
    fn test_absent_token_is_invalid_not_panic() {
        let err = bridge().authenticate(&HeaderMap::new()).unwrap_err();
        assert!(err.is_absent_token());
        assert!(err.is_invalid_token());
    }

    #[test]
    fn test_bridge_debug_hides_keys() {
        let rendered = format!("{:?}", bridge());
        assert!(rendered.contains("X-Auth-Token"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
