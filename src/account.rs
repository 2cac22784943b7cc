//! Account entity, password policy and password hashing.
//!
//! Passwords are hashed with Argon2id and stored as a PHC string; the
//! plaintext only lives inside a `SecretString` for the duration of
//! [`Account::new`].

use crate::error::{Error, Result};
use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash, PasswordHasher,
    PasswordVerifier, Version,
};
use chrono::{DateTime, SubsecRound, Utc};
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::{fmt, sync::OnceLock};
use tracing::instrument;
use utoipa::ToSchema;

/// Width of the name columns in the account table.
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_ACCOUNT_NUMBER: i64 = 999_999_999;

const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;
const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
const DEFAULT_HASH_ITERATIONS: u32 = 2;
const DEFAULT_HASH_PARALLELISM: u32 = 1;

/// Password policy and Argon2id cost parameters used when creating accounts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountPolicy {
    min_password_length: usize,
    hash_memory_kib: u32,
    hash_iterations: u32,
    hash_parallelism: u32,
}

impl Default for AccountPolicy {
    fn default() -> Self {
        Self {
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
            hash_memory_kib: DEFAULT_HASH_MEMORY_KIB,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
            hash_parallelism: DEFAULT_HASH_PARALLELISM,
        }
    }
}

impl AccountPolicy {
    #[must_use]
    pub fn with_min_password_length(mut self, length: usize) -> Self {
        self.min_password_length = length;
        self
    }

    #[must_use]
    pub fn with_hash_memory_kib(mut self, kib: u32) -> Self {
        self.hash_memory_kib = kib;
        self
    }

    #[must_use]
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_hash_parallelism(mut self, lanes: u32) -> Self {
        self.hash_parallelism = lanes;
        self
    }

    #[must_use]
    pub fn min_password_length(&self) -> usize {
        self.min_password_length
    }

    /// Build the Argon2id hasher for the configured cost.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if the cost parameters are out of range.
    pub fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.hash_memory_kib,
            self.hash_iterations,
            self.hash_parallelism,
            None,
        )
        .map_err(|e| Error::Configuration(format!("invalid Argon2 parameters: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Check a candidate password against the policy.
    ///
    /// # Errors
    /// Returns `Error::Validation` describing the first rule that failed.
    pub fn check_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_password_length {
            return Err(Error::Validation(format!(
                "password must be at least {} characters",
                self.min_password_length
            )));
        }

        if !has_match(&HAS_LETTER, r"[A-Za-z]", password)
            || !has_match(&HAS_DIGIT, r"[0-9]", password)
        {
            return Err(Error::Validation(
                "password must contain at least one letter and one digit".to_string(),
            ));
        }

        Ok(())
    }

    /// Run one Argon2 verification of `candidate` against a hash no account
    /// owns, so a login for an unknown number costs as much as a wrong password.
    /// Never succeeds.
    pub fn verify_unknown_account(&self, candidate: &str) {
        let hash = UNKNOWN_ACCOUNT_HASH.get_or_init(|| {
            let salt = SaltString::generate(&mut OsRng);
            let secret: [u8; 32] = rand::thread_rng().gen();
            self.hasher()
                .ok()?
                .hash_password(&secret, &salt)
                .ok()
                .map(|hash| hash.to_string())
        });

        if let Some(parsed) = hash.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
            let _ = Argon2::default().verify_password(candidate.as_bytes(), &parsed);
        }
    }
}

static HAS_LETTER: OnceLock<Option<Regex>> = OnceLock::new();
static HAS_DIGIT: OnceLock<Option<Regex>> = OnceLock::new();

/// Hash that matches no account, verified when a login names an unknown number.
static UNKNOWN_ACCOUNT_HASH: OnceLock<Option<String>> = OnceLock::new();

/// Compiles `pattern` into `cell` on first use.
fn has_match(cell: &OnceLock<Option<Regex>>, pattern: &str, input: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(input))
}

fn check_name(field: &str, value: &str) -> Result<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(Error::Validation(format!(
            "{field} must be at most {MAX_NAME_LENGTH} characters"
        )));
    }

    Ok(value.to_string())
}

#[derive(Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Storage-assigned id, `0` until the account is persisted.
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub number: i64,
    #[serde(skip)]
    pub(crate) encrypted_password: String,
    /// Balance in minor currency units.
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("number", &self.number)
            .field("encrypted_password", &"[REDACTED]")
            .field("balance", &self.balance)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl Account {
    /// Validate the inputs and build a new, not yet persisted account.
    ///
    /// # Errors
    /// Returns `Error::Validation` for bad names or a weak password and
    /// `Error::Hashing` if the password cannot be hashed.
    #[instrument(skip(password, policy))]
    pub fn new(
        first_name: &str,
        last_name: &str,
        password: &SecretString,
        policy: &AccountPolicy,
    ) -> Result<Self> {
        let first_name = check_name("firstName", first_name)?;
        let last_name = check_name("lastName", last_name)?;
        policy.check_password(password.expose_secret())?;

        let salt = SaltString::generate(&mut OsRng);
        let encrypted_password = policy
            .hasher()?
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map_err(|e| Error::Hashing(e.to_string()))?
            .to_string();

        Ok(Self {
            id: 0,
            first_name,
            last_name,
            number: rand::thread_rng().gen_range(1..=MAX_ACCOUNT_NUMBER),
            encrypted_password,
            balance: 0,
            // Postgres keeps microseconds; truncate so stored rows compare equal.
            created_at: Utc::now().trunc_subsecs(6),
        })
    }

    /// Verify a candidate password against the stored hash.
    ///
    /// The hash string carries its own parameters, so verification does not
    /// depend on the policy in force when the account was created.
    #[must_use]
    pub fn valid_password(&self, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.encrypted_password) else {
            return false;
        };

        Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }

    #[must_use]
    pub fn encrypted_password(&self) -> &str {
        &self.encrypted_password
    }
}
