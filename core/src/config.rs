//! Validated client configuration.
//!
//! # Design
//! `ClientSettings` is the loose, all-optional shape configuration arrives
//! in (a TOML/JSON file, environment variables, a form). It is converted
//! into `ClientConfig` exactly once; after that the configuration is
//! immutable and every field is known to be usable, so the client never
//! re-checks it.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// Total attempts per request (initial try plus retries).
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Credential pair issued by the mailcow admin UI.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeys {
    pub read_only: String,
    pub write: String,
}

impl ApiKeys {
    pub fn new(read_only: impl Into<String>, write: impl Into<String>) -> Self {
        Self {
            read_only: read_only.into(),
            write: write.into(),
        }
    }
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeys")
            .field("read_only", &"<redacted>")
            .field("write", &"<redacted>")
            .finish()
    }
}

/// Immutable, validated configuration for `MailcowClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: Url,
    keys: ApiKeys,
    max_attempts: usize,
    backoff: Duration,
    timeout: Option<Duration>,
}

impl ClientConfig {
    /// Validate `base_url` and both keys.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the URL is blank, unparseable or not
    /// http(s), or when either key is blank.
    pub fn new(base_url: &str, keys: ApiKeys) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(base_url)?;
        if keys.read_only.trim().is_empty() {
            return Err(ConfigError::MissingKey("read_only_key"));
        }
        if keys.write.trim().is_empty() {
            return Err(ConfigError::MissingKey("write_key"));
        }
        Ok(Self {
            base_url,
            keys,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::ZERO,
            timeout: None,
        })
    }

    /// Load from `MAILCOW_URL`, `MAILCOW_API_KEY_READ_ONLY`, `MAILCOW_API_KEY`
    /// and the optional `MAILCOW_MAX_ATTEMPTS` / `MAILCOW_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let var = |name: &str| std::env::var(name).ok();
        let settings = ClientSettings {
            base_url: var("MAILCOW_URL"),
            read_only_key: var("MAILCOW_API_KEY_READ_ONLY"),
            write_key: var("MAILCOW_API_KEY"),
            max_attempts: var("MAILCOW_MAX_ATTEMPTS")
                .map(|v| parse_number("max_attempts", &v))
                .transpose()?,
            timeout_secs: var("MAILCOW_TIMEOUT_SECS")
                .map(|v| parse_number("timeout_secs", &v))
                .transpose()?,
        };
        Self::try_from(settings)
    }

    /// Total attempts per request. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Fixed pause between attempts. Zero (the default) retries immediately.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overall per-request timeout handed to the default transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn keys(&self) -> &ApiKeys {
        &self.keys
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Unvalidated configuration as read from a file or the environment.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: Option<String>,
    pub read_only_key: Option<String>,
    pub write_key: Option<String>,
    pub max_attempts: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl TryFrom<ClientSettings> for ClientConfig {
    type Error = ConfigError;

    fn try_from(settings: ClientSettings) -> Result<Self, Self::Error> {
        let base_url = settings.base_url.ok_or(ConfigError::MissingBaseUrl)?;
        let read_only = settings
            .read_only_key
            .ok_or(ConfigError::MissingKey("read_only_key"))?;
        let write = settings.write_key.ok_or(ConfigError::MissingKey("write_key"))?;

        let mut config = ClientConfig::new(&base_url, ApiKeys::new(read_only, write))?;
        if let Some(attempts) = settings.max_attempts {
            if attempts == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "max_attempts",
                    reason: "must be at least 1".to_string(),
                });
            }
            config = config.with_max_attempts(attempts);
        }
        if let Some(secs) = settings.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::MissingBaseUrl);
    }
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}
