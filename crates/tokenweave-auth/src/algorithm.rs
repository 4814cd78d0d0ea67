//! Signature algorithm catalog
//!
//! Algorithms are identified by their JOSE names (`HS256`, `RS256`, ...) and grouped
//! into families. The family decides what shape of key material is resolved from the
//! configured secret and how the signature is verified.

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Grouping of algorithms that share key shape and verification procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    /// Unsigned tokens
    None,
    /// HMAC with a shared secret
    Symmetric,
    /// RSASSA-PKCS1-v1_5
    Rsa,
    /// RSASSA-PSS
    RsaPss,
    /// ECDSA over NIST curves
    Ecdsa,
}

impl AlgorithmFamily {
    /// Whether keys in this family are asymmetric PEM key pairs
    pub fn is_asymmetric(self) -> bool {
        matches!(self, Self::Rsa | Self::RsaPss | Self::Ecdsa)
    }
}

/// Signing algorithm chosen at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SignatureAlgorithm {
    /// No signature
    #[serde(rename = "none")]
    None,
    /// HMAC using SHA-256
    HS256,
    /// HMAC using SHA-384
    HS384,
    /// HMAC using SHA-512
    #[default]
    HS512,
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// RSASSA-PSS using SHA-256
    PS256,
    /// RSASSA-PSS using SHA-384
    PS384,
    /// RSASSA-PSS using SHA-512
    PS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
}

impl SignatureAlgorithm {
    /// Every algorithm in the catalog
    pub const ALL: [Self; 12] = [
        Self::None,
        Self::HS256,
        Self::HS384,
        Self::HS512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::PS256,
        Self::PS384,
        Self::PS512,
        Self::ES256,
        Self::ES384,
    ];

    /// Family this algorithm belongs to
    pub fn family(self) -> AlgorithmFamily {
        match self {
            Self::None => AlgorithmFamily::None,
            Self::HS256 | Self::HS384 | Self::HS512 => AlgorithmFamily::Symmetric,
            Self::RS256 | Self::RS384 | Self::RS512 => AlgorithmFamily::Rsa,
            Self::PS256 | Self::PS384 | Self::PS512 => AlgorithmFamily::RsaPss,
            Self::ES256 | Self::ES384 => AlgorithmFamily::Ecdsa,
        }
    }

    /// JOSE `alg` header value
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::PS256 => "PS256",
            Self::PS384 => "PS384",
            Self::PS512 => "PS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        }
    }

    /// Signing backend algorithm
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] for `none`: tokens must be
    /// self-verifying, so unsigned tokens are never produced or accepted.
    pub fn to_jwt(self) -> AuthResult<Algorithm> {
        Ok(match self {
            Self::None => {
                return Err(AuthError::invalid_key(
                    "algorithm `none` cannot sign or verify tokens",
                ));
            }
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::RS512 => Algorithm::RS512,
            Self::PS256 => Algorithm::PS256,
            Self::PS384 => Algorithm::PS384,
            Self::PS512 => Algorithm::PS512,
            Self::ES256 => Algorithm::ES256,
            Self::ES384 => Algorithm::ES384,
        })
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuthError::configuration(format!("unknown signature algorithm `{s}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families() {
        assert_eq!(SignatureAlgorithm::HS384.family(), AlgorithmFamily::Symmetric);
        assert_eq!(SignatureAlgorithm::RS512.family(), AlgorithmFamily::Rsa);
        assert_eq!(SignatureAlgorithm::PS256.family(), AlgorithmFamily::RsaPss);
        assert_eq!(SignatureAlgorithm::ES384.family(), AlgorithmFamily::Ecdsa);
        assert_eq!(SignatureAlgorithm::None.family(), AlgorithmFamily::None);
        assert!(AlgorithmFamily::RsaPss.is_asymmetric());
        assert!(!AlgorithmFamily::Symmetric.is_asymmetric());
    }

    #[test]
    fn test_parse_round_trips_display() {
        for alg in SignatureAlgorithm::ALL {
            assert_eq!(alg.to_string().parse::<SignatureAlgorithm>().unwrap(), alg);
        }
        assert_eq!(
            "hs256".parse::<SignatureAlgorithm>().unwrap(),
            SignatureAlgorithm::HS256
        );
    }

    #[test]
    fn test_parse_unknown() {
        let err = "EdDSA".parse::<SignatureAlgorithm>().unwrap_err();
        assert!(err.is_startup_fatal());
    }

    #[test]
    fn test_none_has_no_backend_algorithm() {
        assert!(SignatureAlgorithm::None.to_jwt().is_err());
        assert_eq!(SignatureAlgorithm::ES256.to_jwt().unwrap(), Algorithm::ES256);
    }

    #[test]
    fn test_serde_uses_jose_names() {
        let json = serde_json::to_string(&SignatureAlgorithm::None).unwrap();
        assert_eq!(json, "\"none\"");
        let alg: SignatureAlgorithm = serde_json::from_str("\"PS384\"").unwrap();
        assert_eq!(alg, SignatureAlgorithm::PS384);
    }
}
