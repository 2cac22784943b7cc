//! Signed, time-limited bearer tokens bound to an account number.

use crate::{
    account::Account,
    config::Config,
    error::{Error, Result},
};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "accountNumber")]
    pub account_number: i64,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and validates HS256 tokens with the server-held secret.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: i64,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &TOKEN_ALGORITHM)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let secret = config.jwt_secret().expose_secret().as_bytes();

        // Only HS256 is accepted, whatever the token header claims.
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_seconds: i64::try_from(config.token_ttl().as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Issue a token for the account's number, expiring after the configured TTL.
    ///
    /// # Errors
    /// Returns `Error::Signing` if the token cannot be encoded.
    #[instrument(skip(self, account), fields(number = account.number))]
    pub fn issue_token(&self, account: &Account) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            account_number: account.number,
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
        };

        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(TOKEN_ALGORITHM), claims, &self.encoding_key).map_err(Error::Signing)
    }

    /// Verify signature, algorithm and expiry and return the claims.
    ///
    /// # Errors
    /// Returns `Error::InvalidToken` for any failed check.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("token rejected: {:?}", e.kind());
                Error::InvalidToken(e)
            })?;

        // The decoder only rejects `exp < now`; a token is dead at its expiry instant.
        if claims.exp <= Utc::now().timestamp() {
            debug!("token rejected: expires at the current second");
            return Err(Error::InvalidToken(ErrorKind::ExpiredSignature.into()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::tests::{secret, test_policy};
    use base64ct::{Base64UrlUnpadded, Encoding};
    use secrecy::SecretString;

    fn service(secret_value: &str) -> TokenService {
        let config = Config::new(Some(SecretString::from(secret_value.to_string())))
            .and_then(|c| c.with_token_ttl_seconds(900))
            .unwrap();
        TokenService::new(&config)
    }

    fn account() -> Account {
        let mut account = Account::new("Ada", "Lovelace", &secret("Str0ng#Pass"), &test_policy())
            .unwrap();
        account.number = 100;
        account
    }

    fn kind(result: Result<Claims>) -> ErrorKind {
        match result {
            Err(Error::InvalidToken(e)) => e.into_kind(),
            other => panic!("expected invalid token, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip() -> Result<()> {
        let tokens = service("s3cr3t");
        let token = tokens.issue_token(&account())?;
        let claims = tokens.validate_token(&token)?;

        assert_eq!(claims.account_number, 100);
        assert_eq!(claims.exp - claims.iat, 900);
        Ok(())
    }

    #[test]
    fn test_claim_name_on_the_wire() -> Result<()> {
        let tokens = service("s3cr3t");
        let token = tokens.issue_token(&account())?;
        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&Base64UrlUnpadded::decode_vec(payload).unwrap()).unwrap();

        assert_eq!(json["accountNumber"], 100);
        assert!(json["exp"].is_i64());
        Ok(())
    }

    #[test]
    fn test_expired_token() -> Result<()> {
        let tokens = service("s3cr3t");
        let now = Utc::now().timestamp();
        let token = tokens.sign(&Claims {
            account_number: 100,
            iat: now - 1000,
            exp: now - 100,
        })?;

        assert!(matches!(
            kind(tokens.validate_token(&token)),
            ErrorKind::ExpiredSignature
        ));
        Ok(())
    }

    #[test]
    fn test_token_dead_at_expiry_instant() -> Result<()> {
        let tokens = service("s3cr3t");
        let now = Utc::now().timestamp();
        let token = tokens.sign(&Claims {
            account_number: 100,
            iat: now - 900,
            exp: now,
        })?;

        assert!(matches!(
            kind(tokens.validate_token(&token)),
            ErrorKind::ExpiredSignature
        ));

        let token = tokens.sign(&Claims {
            account_number: 100,
            iat: now,
            exp: now + 60,
        })?;
        assert_eq!(tokens.validate_token(&token)?.account_number, 100);
        Ok(())
    }

    #[test]
    fn test_wrong_secret() -> Result<()> {
        let token = service("s3cr3t").issue_token(&account())?;

        assert!(matches!(
            kind(service("other").validate_token(&token)),
            ErrorKind::InvalidSignature
        ));
        Ok(())
    }

    #[test]
    fn test_rejects_other_hmac_algorithms() -> Result<()> {
        let tokens = service("s3cr3t");
        let now = Utc::now().timestamp();
        let claims = Claims {
            account_number: 100,
            iat: now,
            exp: now + 900,
        };

        for alg in [Algorithm::HS384, Algorithm::HS512] {
            let token = encode(
                &Header::new(alg),
                &claims,
                &EncodingKey::from_secret(b"s3cr3t"),
            )
            .map_err(Error::Signing)?;

            assert!(matches!(
                kind(tokens.validate_token(&token)),
                ErrorKind::InvalidAlgorithm
            ));
        }
        Ok(())
    }

    #[test]
    fn test_rejects_unsigned_token() {
        let tokens = service("s3cr3t");
        let now = Utc::now().timestamp();
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = Base64UrlUnpadded::encode_string(
            format!(r#"{{"accountNumber":100,"iat":{now},"exp":{}}}"#, now + 900).as_bytes(),
        );

        assert!(tokens.validate_token(&format!("{header}.{payload}.")).is_err());
        assert!(tokens.validate_token(&format!("{header}.{payload}")).is_err());
    }

    #[test]
    fn test_rejects_garbage_and_missing_exp() -> Result<()> {
        let tokens = service("s3cr3t");
        assert!(tokens.validate_token("").is_err());
        assert!(tokens.validate_token("not.a.token").is_err());

        #[derive(Serialize)]
        struct NoExpiry {
            #[serde(rename = "accountNumber")]
            account_number: i64,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoExpiry {
                account_number: 100,
            },
            &EncodingKey::from_secret(b"s3cr3t"),
        )
        .map_err(Error::Signing)?;
        assert!(tokens.validate_token(&token).is_err());
        Ok(())
    }

    #[test]
    fn test_debug_hides_keys() {
        let output = format!("{:?}", service("s3cr3t"));
        assert!(!output.contains("s3cr3t"));
        assert!(output.contains("HS256"));
    }
}
