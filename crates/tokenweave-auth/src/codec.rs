//! Token encoding and verification
//!
//! Encode: marshal the principal into the `principal` claim, stamp `exp` if a lifetime
//! is configured, sign, and compact. Decode runs the same steps in reverse: parse,
//! verify the signature, check expiry against the injected clock, extract the claim,
//! and unmarshal.
//!
//! Every decode failure is an [`AuthError::InvalidToken`]. An empty input is reported
//! as [`TokenError::Absent`] so callers can tell "no token" from "bad token".
//!
//! Expiry is tracked to the millisecond. The private `exp_ms` claim holds the Unix
//! millisecond of `now + lifetime` and is what decoding checks; a token is rejected
//! once the clock reaches that instant. The registered `exp` claim is also written,
//! rounded up to the next whole second, for readers that only know NumericDate.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, trace};

use crate::algorithm::SignatureAlgorithm;
use crate::clock::{Clock, SystemClock};
use crate::config::TokenSettings;
use crate::error::{AuthError, AuthResult, TokenError};
use crate::keys::KeyPair;
use crate::marshal::PrincipalMarshaller;

/// Claim name carrying the marshaled principal
pub const PRINCIPAL_CLAIM: &str = "principal";

/// Claim name carrying the expiry instant in Unix milliseconds
pub const EXPIRY_MILLIS_CLAIM: &str = "exp_ms";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    principal: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp_ms: Option<i64>,
}

impl Claims {
    /// Both expiry claims round up, so neither ends before `expires_at`
    fn expiring_at(principal: Value, expires_at: Option<DateTime<Utc>>) -> Self {
        let exp = expires_at.map(|at| {
            let partial_second = at.timestamp_subsec_nanos() > 0;
            at.timestamp() + i64::from(partial_second)
        });
        let exp_ms = expires_at.map(|at| {
            let partial_milli = at.timestamp_subsec_nanos() % 1_000_000 > 0;
            at.timestamp_millis() + i64::from(partial_milli)
        });
        Self {
            principal: Some(principal),
            exp,
            exp_ms,
        }
    }

    /// Expiry instant, preferring the millisecond claim
    fn expires_at(&self) -> Result<Option<DateTime<Utc>>, TokenError> {
        match (self.exp_ms, self.exp) {
            (Some(millis), _) => DateTime::from_timestamp_millis(millis)
                .map(Some)
                .ok_or(TokenError::ExpiryOutOfRange(millis)),
            (None, Some(secs)) => DateTime::from_timestamp(secs, 0)
                .map(Some)
                .ok_or(TokenError::ExpiryOutOfRange(secs)),
            (None, None) => Ok(None),
        }
    }
}

/// Signs principals into tokens and verifies them back
///
/// Read-only after construction; share it behind an `Arc` across request tasks.
pub struct TokenCodec<P> {
    algorithm: SignatureAlgorithm,
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Option<Duration>,
    clock: Arc<dyn Clock>,
    marshaller: Arc<dyn PrincipalMarshaller<P>>,
}

impl<P> fmt::Debug for TokenCodec<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &self.algorithm)
            .field("expiry", &self.expiry)
            .field("clock", &self.clock)
            .field("marshaller", &self.marshaller.name())
            .finish_non_exhaustive()
    }
}

impl<P> TokenCodec<P> {
    /// Create a codec
    ///
    /// Key material is resolved here, once. `expiry = None` issues tokens without an
    /// `exp` claim.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] if the secret does not fit the
    /// algorithm, or if the algorithm is `none`, and [`AuthError::Configuration`] if
    /// `now + expiry` is past the latest representable instant.
    pub fn new(
        algorithm: SignatureAlgorithm,
        secret: &secrecy::SecretString,
        expiry: Option<Duration>,
        marshaller: Arc<dyn PrincipalMarshaller<P>>,
    ) -> AuthResult<Self> {
        let backend = algorithm.to_jwt()?;
        if let Some(lifetime) = expiry
            && SystemClock.plus(lifetime).is_none()
        {
            return Err(AuthError::configuration(format!(
                "token lifetime of {lifetime} ends past the latest representable instant"
            )));
        }
        let keys = KeyPair::resolve(algorithm, secret)?;

        let mut validation = Validation::new(backend);
        validation.algorithms = vec![backend];
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        debug!(
            algorithm = %algorithm,
            expiry_ms = expiry.map(|d| d.num_milliseconds()),
            marshaller = marshaller.name(),
            "Token codec ready"
        );

        Ok(Self {
            algorithm,
            header: Header::new(backend),
            encoding_key: keys.encoding_key()?,
            decoding_key: keys.decoding_key()?,
            validation,
            expiry,
            clock: Arc::new(SystemClock),
            marshaller,
        })
    }

    /// Create a codec from settings
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the settings are invalid or the secret
    /// file cannot be read, and [`AuthError::InvalidKeyMaterial`] as for
    /// [`new`](Self::new).
    pub fn from_settings(
        settings: &TokenSettings,
        marshaller: Arc<dyn PrincipalMarshaller<P>>,
    ) -> AuthResult<Self> {
        settings.validate()?;
        let secret = settings.resolve_secret()?;
        Self::new(settings.algorithm, &secret, settings.expiry()?, marshaller)
    }

    /// Replace the clock used for stamping and checking expiry
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured algorithm
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Configured token lifetime
    pub fn expiry(&self) -> Option<Duration> {
        self.expiry
    }

    /// Sign `principal` into a compact token
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PrincipalMarshal`] if the principal cannot be marshaled,
    /// [`AuthError::Configuration`] if the clock is too close to the latest
    /// representable instant to stamp the expiry, and
    /// [`AuthError::InvalidKeyMaterial`] if signing fails.
    pub fn encode(&self, principal: &P) -> AuthResult<String> {
        let claim = self.marshaller.marshal(principal)?;
        // No lifetime means no clock read at all.
        let expires_at = match self.expiry {
            Some(lifetime) => Some(self.clock.plus(lifetime).ok_or_else(|| {
                AuthError::configuration(format!(
                    "token lifetime of {lifetime} ends past the latest representable instant"
                ))
            })?),
            None => None,
        };

        let claims = Claims::expiring_at(claim, expires_at);
        let token = jsonwebtoken::encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::invalid_key(format!("signing failed: {e}")))?;

        trace!(algorithm = %self.algorithm, expires_at = ?expires_at, "Issued token");
        Ok(token)
    }

    /// Verify `token` and recover its principal
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for an empty, malformed, badly signed,
    /// expired, or principal-less token, or one whose principal cannot be unmarshaled.
    pub fn decode(&self, token: &str) -> AuthResult<P> {
        self.verify(token).map_err(|e| {
            debug!(error = %e, algorithm = %self.algorithm, "Token rejected");
            AuthError::InvalidToken(e)
        })
    }

    fn verify(&self, token: &str) -> Result<P, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Absent);
        }

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        if let Some(expired_at) = claims.expires_at()?
            && self.clock.now() >= expired_at
        {
            return Err(TokenError::Expired { expired_at });
        }

        let claim = claims.principal.ok_or(TokenError::MissingPrincipal)?;
        self.marshaller.unmarshal(claim).map_err(TokenError::Unmarshal)
    }
}

impl<P> TokenCodec<P>
where
    P: Serialize + DeserializeOwned + 'static,
{
    /// Create a codec for a structured principal, using the settings' encoding
    ///
    /// # Errors
    ///
    /// See [`from_settings`](Self::from_settings).
    pub fn structured(settings: &TokenSettings) -> AuthResult<Self> {
        Self::from_settings(settings, settings.principal_encoding.marshaller())
    }
}
