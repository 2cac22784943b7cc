//! Process configuration, built once at startup and passed down explicitly.

use crate::{
    account::AccountPolicy,
    error::{Error, Result},
};
use axum::http::HeaderName;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub const DEFAULT_TOKEN_HEADER: &str = "x-jwt-token";
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 15 * 60;

#[derive(Clone, Debug)]
pub struct Config {
    jwt_secret: SecretString,
    token_header: HeaderName,
    token_ttl_seconds: u64,
    account_policy: AccountPolicy,
}

impl Config {
    /// Create a configuration around the token signing secret.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if the secret is missing or blank.
    pub fn new(jwt_secret: Option<SecretString>) -> Result<Self> {
        let jwt_secret = jwt_secret
            .filter(|secret| !secret.expose_secret().trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration("missing token signing secret (BANKD_JWT_SECRET)".to_string())
            })?;

        Ok(Self {
            jwt_secret,
            token_header: HeaderName::from_static(DEFAULT_TOKEN_HEADER),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            account_policy: AccountPolicy::default(),
        })
    }

    /// # Errors
    /// Returns `Error::Configuration` if `name` is not a valid header name.
    pub fn with_token_header(mut self, name: &str) -> Result<Self> {
        self.token_header = HeaderName::try_from(name.trim().to_ascii_lowercase())
            .map_err(|_| Error::Configuration(format!("invalid token header name: {name}")))?;
        Ok(self)
    }

    /// # Errors
    /// Returns `Error::Configuration` for a zero TTL.
    pub fn with_token_ttl_seconds(mut self, seconds: u64) -> Result<Self> {
        if seconds == 0 {
            return Err(Error::Configuration(
                "token TTL must be greater than zero".to_string(),
            ));
        }
        self.token_ttl_seconds = seconds;
        Ok(self)
    }

    /// # Errors
    /// Returns `Error::Configuration` if the hashing cost is out of range.
    pub fn with_account_policy(mut self, policy: AccountPolicy) -> Result<Self> {
        policy.hasher()?;
        self.account_policy = policy;
        Ok(self)
    }

    pub(crate) fn jwt_secret(&self) -> &SecretString {
        &self.jwt_secret
    }

    #[must_use]
    pub fn token_header(&self) -> &HeaderName {
        &self.token_header
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }

    #[must_use]
    pub fn account_policy(&self) -> &AccountPolicy {
        &self.account_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> Option<SecretString> {
        Some(SecretString::from(value.to_string()))
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        assert!(matches!(Config::new(None), Err(Error::Configuration(_))));
        assert!(matches!(
            Config::new(secret("   ")),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let config = Config::new(secret("s3cr3t"))?;

        assert_eq!(config.jwt_secret().expose_secret(), "s3cr3t");
        assert_eq!(config.token_header().as_str(), "x-jwt-token");
        assert_eq!(config.token_ttl(), Duration::from_secs(900));
        assert_eq!(config.account_policy(), &AccountPolicy::default());
        Ok(())
    }

    #[test]
    fn test_overrides() -> Result<()> {
        let config = Config::new(secret("s3cr3t"))?
            .with_token_header("X-Bank-Token")?
            .with_token_ttl_seconds(60)?
            .with_account_policy(AccountPolicy::default().with_min_password_length(12))?;

        assert_eq!(config.token_header().as_str(), "x-bank-token");
        assert_eq!(config.token_ttl(), Duration::from_secs(60));
        assert_eq!(config.account_policy().min_password_length(), 12);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_values() -> Result<()> {
        let config = Config::new(secret("s3cr3t"))?;

        assert!(config.clone().with_token_header("bad header").is_err());
        assert!(config.clone().with_token_ttl_seconds(0).is_err());
        assert!(config
            .with_account_policy(AccountPolicy::default().with_hash_memory_kib(0))
            .is_err());
        Ok(())
    }

    #[test]
    fn test_debug_redacts_secret() -> Result<()> {
        let config = Config::new(secret("s3cr3t"))?;
        assert!(!format!("{config:?}").contains("s3cr3t"));
        Ok(())
    }
}
