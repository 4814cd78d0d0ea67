//! Key material resolution
//!
//! A configured secret string becomes a [`KeyPair`] appropriate for the algorithm
//! family:
//!
//! - **Symmetric**: the secret bytes are base64 re-encoded and the result is used as
//!   the HMAC key. The same bytes fill both halves so signing and verification call
//!   sites stay uniform.
//! - **RSA / RSA-PSS**: the secret is a PEM private key (PKCS#8 or PKCS#1). The public
//!   half is derived from it.
//! - **ECDSA**: the secret is a PEM private key (PKCS#8 or SEC1) on the curve the
//!   algorithm requires (P-256 for ES256, P-384 for ES384).
//!
//! Resolution happens once at startup. The resulting pair is read-only and is
//! shared by every request thread.

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString, SecretVec};
use tracing::debug;

use crate::algorithm::{AlgorithmFamily, SignatureAlgorithm};
use crate::error::{AuthError, AuthResult};

/// Shape of the resolved key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Shared HMAC secret
    Hmac,
    /// RSA key pair
    Rsa,
    /// ECDSA key pair on P-256
    EcP256,
    /// ECDSA key pair on P-384
    EcP384,
}

/// Private and public halves of the signing key
///
/// For [`KeyKind::Hmac`] both halves hold the same derived secret. For asymmetric
/// kinds the private half is a PKCS#8 PEM document and the public half an SPKI PEM
/// document.
pub struct KeyPair {
    kind: KeyKind,
    private: SecretVec<u8>,
    public: Vec<u8>,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("kind", &self.kind)
            .field("private", &"<redacted>")
            .field("public_len", &self.public.len())
            .finish()
    }
}

impl KeyPair {
    /// Resolve key material for `algorithm` from `secret`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] when the algorithm is `none`, when an
    /// asymmetric secret is not a parseable PEM private key, or when the key does not
    /// fit the algorithm (e.g. a P-384 key for ES256).
    pub fn resolve(algorithm: SignatureAlgorithm, secret: &SecretString) -> AuthResult<Self> {
        let family = algorithm.family();
        let pair = match family {
            AlgorithmFamily::None => {
                return Err(AuthError::invalid_key(
                    "algorithm `none` has no key material",
                ));
            }
            AlgorithmFamily::Symmetric => Self::symmetric(secret),
            AlgorithmFamily::Rsa | AlgorithmFamily::RsaPss => Self::rsa(secret)?,
            AlgorithmFamily::Ecdsa if algorithm == SignatureAlgorithm::ES384 => {
                Self::ec_p384(secret)?
            }
            AlgorithmFamily::Ecdsa => Self::ec_p256(secret)?,
        };

        debug!(
            algorithm = %algorithm,
            kind = ?pair.kind,
            asymmetric = family.is_asymmetric(),
            "Resolved key material"
        );
        Ok(pair)
    }

    fn symmetric(secret: &SecretString) -> Self {
        let key = STANDARD
            .encode(secret.expose_secret().as_bytes())
            .into_bytes();
        Self {
            kind: KeyKind::Hmac,
            public: key.clone(),
            private: SecretVec::new(key),
        }
    }

    fn rsa(secret: &SecretString) -> AuthResult<Self> {
        let pem = secret.expose_secret();
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| AuthError::invalid_key(format!("not an RSA private key PEM: {e}")))?;

        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::invalid_key(format!("cannot encode RSA public key: {e}")))?;
        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::invalid_key(format!("cannot encode RSA private key: {e}")))?;

        Ok(Self {
            kind: KeyKind::Rsa,
            private: SecretVec::new(private_pem.as_bytes().to_vec()),
            public: public_pem.into_bytes(),
        })
    }

    fn ec_p256(secret: &SecretString) -> AuthResult<Self> {
        use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};

        let pem = secret.expose_secret();
        let key = p256::SecretKey::from_pkcs8_pem(pem)
            .ok()
            .or_else(|| p256::SecretKey::from_sec1_pem(pem).ok())
            .ok_or_else(|| AuthError::invalid_key("not a P-256 EC private key PEM"))?;

        let private_pem = key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::invalid_key(format!("cannot encode P-256 private key: {e}")))?;
        let public_pem = key
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::invalid_key(format!("cannot encode P-256 public key: {e}")))?;

        Ok(Self {
            kind: KeyKind::EcP256,
            private: SecretVec::new(private_pem.as_bytes().to_vec()),
            public: public_pem.into_bytes(),
        })
    }

    fn ec_p384(secret: &SecretString) -> AuthResult<Self> {
        use p384::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};

        let pem = secret.expose_secret();
        let key = p384::SecretKey::from_pkcs8_pem(pem)
            .ok()
            .or_else(|| p384::SecretKey::from_sec1_pem(pem).ok())
            .ok_or_else(|| AuthError::invalid_key("not a P-384 EC private key PEM"))?;

        let private_pem = key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AuthError::invalid_key(format!("cannot encode P-384 private key: {e}")))?;
        let public_pem = key
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AuthError::invalid_key(format!("cannot encode P-384 public key: {e}")))?;

        Ok(Self {
            kind: KeyKind::EcP384,
            private: SecretVec::new(private_pem.as_bytes().to_vec()),
            public: public_pem.into_bytes(),
        })
    }

    /// Shape of this key
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    /// Private half (secret bytes or PKCS#8 PEM)
    pub fn private_bytes(&self) -> &[u8] {
        self.private.expose_secret()
    }

    /// Public half (secret bytes or SPKI PEM)
    pub fn public_bytes(&self) -> &[u8] {
        &self.public
    }

    /// Signing key for the token backend
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] if the backend rejects the key.
    pub fn encoding_key(&self) -> AuthResult<EncodingKey> {
        let private = self.private.expose_secret();
        match self.kind {
            KeyKind::Hmac => Ok(EncodingKey::from_secret(private)),
            KeyKind::Rsa => EncodingKey::from_rsa_pem(private)
                .map_err(|e| AuthError::invalid_key(format!("RSA signing key rejected: {e}"))),
            KeyKind::EcP256 | KeyKind::EcP384 => EncodingKey::from_ec_pem(private)
                .map_err(|e| AuthError::invalid_key(format!("EC signing key rejected: {e}"))),
        }
    }

    /// Verification key for the token backend
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] if the backend rejects the key.
    pub fn decoding_key(&self) -> AuthResult<DecodingKey> {
        match self.kind {
            KeyKind::Hmac => Ok(DecodingKey::from_secret(&self.public)),
            KeyKind::Rsa => DecodingKey::from_rsa_pem(&self.public)
                .map_err(|e| AuthError::invalid_key(format!("RSA verification key rejected: {e}"))),
            KeyKind::EcP256 | KeyKind::EcP384 => DecodingKey::from_ec_pem(&self.public)
                .map_err(|e| AuthError::invalid_key(format!("EC verification key rejected: {e}"))),
        }
    }
}
