use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let jwt_secret = matches
        .get_one::<String>("jwt-secret")
        .map(|secret| SecretString::from(secret.as_str()));

    let token_header = matches
        .get_one::<String>("token-header")
        .cloned()
        .context("missing required argument: --token-header")?;

    let seed_password = if matches.get_flag("seed") {
        let password = matches
            .get_one::<String>("seed-password")
            .context("--seed requires --seed-password (BANKD_SEED_PASSWORD)")?;
        Some(SecretString::from(password.as_str()))
    } else {
        None
    };

    Ok(Action::Server(Args {
        port,
        dsn,
        jwt_secret,
        token_header,
        token_ttl_seconds: matches.get_one::<u64>("token-ttl").copied().unwrap_or(900),
        password_min_length: matches
            .get_one::<usize>("password-min-length")
            .copied()
            .unwrap_or(8),
        hash_memory_kib: matches
            .get_one::<u32>("hash-memory-kib")
            .copied()
            .unwrap_or(19456),
        hash_iterations: matches
            .get_one::<u32>("hash-iterations")
            .copied()
            .unwrap_or(2),
        seed_password,
    }))
}
