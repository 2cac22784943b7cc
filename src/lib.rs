//! # Bankd (Account Management API)
//!
//! `bankd` keeps bank accounts in PostgreSQL and exposes them over HTTP.
//!
//! ## Accounts
//!
//! Every account has an internal `id` (assigned by storage) and a public
//! account `number`, drawn at random in `1..=999_999_999`. The number is the
//! login key and the subject of every issued token.
//!
//! - **Passwords:** hashed with Argon2id and stored as a PHC string. The hash is
//!   never serialized into a response.
//! - **Balances:** integer minor units (cents), starting at zero.
//!
//! ## Authentication
//!
//! `POST /login` trades an account number and password for an HS256 JWT carrying
//! an `accountNumber` claim and an expiry. The token travels in a configurable
//! header (`x-jwt-token` by default).
//!
//! ## Authorization
//!
//! `/accounts/:id` is reachable only with a token whose `accountNumber` matches
//! the account behind `:id`. Every refusal is the same `403 permission denied`.

pub mod account;
pub mod bankd;
pub mod cli;
pub mod config;
pub mod error;
pub mod storage;
pub mod token;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
