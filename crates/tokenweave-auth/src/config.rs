//! Token settings
//!
//! Settings are plain serde structs. They can be built in code, or loaded from a
//! TOML/YAML/JSON file with environment overrides:
//!
//! ```toml
//! attribute_name = "X-Auth-Token"
//! algorithm = "HS512"
//! expiration = 30
//! expiration_unit = "minutes"
//! secret_file = "/run/secrets/token-key"
//!
//! [cookie]
//! path = "/"
//! http_only = true
//! ```
//!
//! `TOKENWEAVE__ALGORITHM=RS256` overrides `algorithm`, and
//! `TOKENWEAVE__COOKIE__SECURE=true` overrides `cookie.secure`.

use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::algorithm::SignatureAlgorithm;
use crate::error::{AuthError, AuthResult};
use crate::marshal::PrincipalEncoding;

/// Default cookie and header name
pub const DEFAULT_ATTRIBUTE_NAME: &str = "X-Auth-Token";

/// Default environment prefix for overrides
pub const DEFAULT_ENV_PREFIX: &str = "TOKENWEAVE";

const SECRET_SOURCE_RULE: &str = "exactly one of `secret` or `secret_file` must be set";

/// Token issuing and transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Cookie and header name carrying the token
    pub attribute_name: String,
    /// Signing algorithm
    pub algorithm: SignatureAlgorithm,
    /// Token lifetime in `expiration_unit`; negative disables expiry
    pub expiration: i64,
    /// Unit of `expiration`
    pub expiration_unit: TimeUnit,
    /// Inline secret (HMAC secret or PEM private key)
    #[serde(
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub secret: Option<SecretString>,
    /// File holding the secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_file: Option<PathBuf>,
    /// How structured principals are embedded in the token
    pub principal_encoding: PrincipalEncoding,
    /// Cookie attributes
    pub cookie: CookieSettings,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            attribute_name: DEFAULT_ATTRIBUTE_NAME.to_string(),
            algorithm: SignatureAlgorithm::default(),
            expiration: -1,
            expiration_unit: TimeUnit::default(),
            secret: None,
            secret_file: None,
            principal_encoding: PrincipalEncoding::default(),
            cookie: CookieSettings::default(),
        }
    }
}

/// Where the secret comes from
#[derive(Debug, Clone, Copy)]
pub enum SecretSource<'a> {
    /// Inline value
    Inline(&'a SecretString),
    /// File path, read once at startup
    File(&'a Path),
}

impl TokenSettings {
    /// Settings with an inline secret and defaults elsewhere
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(SecretString::new(secret.into())),
            ..Self::default()
        }
    }

    /// Load settings from a file, with `TOKENWEAVE__*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the file is missing, has an unsupported
    /// extension, cannot be parsed, or fails [`validate`](Self::validate).
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        Self::from_file_with_prefix(path, DEFAULT_ENV_PREFIX)
    }

    /// Load settings from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// See [`from_file`](Self::from_file).
    pub fn from_file_with_prefix(path: impl AsRef<Path>, env_prefix: &str) -> AuthResult<Self> {
        use config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(AuthError::configuration(format!(
                "settings file not found: {}",
                path.display()
            )));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => {
                return Err(AuthError::configuration(format!(
                    "unsupported settings format: {}",
                    path.display()
                )));
            }
        };
        let file = path
            .to_str()
            .ok_or_else(|| AuthError::configuration("settings path is not valid UTF-8"))?;

        let settings: Self = Config::builder()
            .add_source(File::new(file, format))
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|e| AuthError::configuration(format!("cannot load settings: {e}")))?;

        settings.validate()?;
        debug!(
            path = %path.display(),
            algorithm = %settings.algorithm,
            attribute = %settings.attribute_name,
            "Loaded token settings"
        );
        Ok(settings)
    }

    /// Check settings for contradictions
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] when the attribute name is empty, when
    /// the lifetime is out of range, or when not exactly one secret source is set.
    pub fn validate(&self) -> AuthResult<()> {
        if self.attribute_name.trim().is_empty() {
            return Err(AuthError::configuration("`attribute_name` must not be empty"));
        }
        if let Some(lifetime) = self.expiry()?
            && Utc::now().checked_add_signed(lifetime).is_none()
        {
            return Err(AuthError::configuration(format!(
                "`expiration` of {} {:?} ends past the latest representable instant",
                self.expiration, self.expiration_unit
            )));
        }
        self.secret_source().map(|_| ())
    }

    /// The single configured secret source
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] when both or neither source is set.
    pub fn secret_source(&self) -> AuthResult<SecretSource<'_>> {
        let inline = self
            .secret
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty());
        let file = self
            .secret_file
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty());

        match (inline, file) {
            (Some(secret), None) => Ok(SecretSource::Inline(secret)),
            (None, Some(path)) => Ok(SecretSource::File(path)),
            _ => Err(AuthError::configuration(SECRET_SOURCE_RULE)),
        }
    }

    /// Secret value, reading the secret file if that is the configured source
    ///
    /// Trailing line breaks in the file are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the source rule is violated, the file
    /// cannot be read, or the file is empty.
    pub fn resolve_secret(&self) -> AuthResult<SecretString> {
        match self.secret_source()? {
            SecretSource::Inline(secret) => Ok(secret.clone()),
            SecretSource::File(path) => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    AuthError::configuration(format!(
                        "cannot read secret file {}: {e}",
                        path.display()
                    ))
                })?;
                let trimmed = contents.trim_end_matches(['\r', '\n']);
                if trimmed.is_empty() {
                    return Err(AuthError::configuration(format!(
                        "secret file {} is empty",
                        path.display()
                    )));
                }
                debug!(path = %path.display(), "Read secret file");
                Ok(SecretString::new(trimmed.to_string()))
            }
        }
    }

    /// Token lifetime, or `None` when expiry is disabled
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `expiration` is out of range.
    pub fn expiry(&self) -> AuthResult<Option<Duration>> {
        self.expiration_unit.duration(self.expiration)
    }
}

/// Unit for the configured token lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Milliseconds
    Milliseconds,
    /// Seconds
    Seconds,
    /// Minutes
    #[default]
    Minutes,
    /// Hours
    Hours,
    /// Days
    Days,
}

impl TimeUnit {
    /// `amount` of this unit; negative amounts mean "no duration"
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if a non-negative `amount` does not fit a
    /// [`Duration`].
    pub fn duration(self, amount: i64) -> AuthResult<Option<Duration>> {
        if amount < 0 {
            return Ok(None);
        }
        let duration = match self {
            Self::Milliseconds => Duration::try_milliseconds(amount),
            Self::Seconds => Duration::try_seconds(amount),
            Self::Minutes => Duration::try_minutes(amount),
            Self::Hours => Duration::try_hours(amount),
            Self::Days => Duration::try_days(amount),
        };
        duration.map(Some).ok_or_else(|| {
            AuthError::configuration(format!(
                "`expiration` of {amount} {self:?} is out of range"
            ))
        })
    }
}

/// Attributes of the token cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// `Max-Age` in seconds; `None` issues a session cookie
    pub max_age: Option<i64>,
    /// `Domain`
    pub domain: Option<String>,
    /// `Path`
    pub path: String,
    /// `Secure`
    pub secure: bool,
    /// `HttpOnly`
    pub http_only: bool,
    /// `SameSite`
    pub same_site: Option<SameSitePolicy>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            max_age: None,
            domain: None,
            path: "/".to_string(),
            secure: false,
            http_only: true,
            same_site: None,
        }
    }
}

/// `SameSite` cookie policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=None`
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => Self::Strict,
            SameSitePolicy::Lax => Self::Lax,
            SameSitePolicy::None => Self::None,
        }
    }
}

fn serialize_optional_secret<S>(
    secret: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(s.map(SecretString::new))
}
