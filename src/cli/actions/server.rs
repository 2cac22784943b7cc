use crate::{
    account::{Account, AccountPolicy},
    bankd::{self, AppState},
    config::Config,
    storage::{AccountStore, PgStore},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;
use url::Url;

const SEED_FIRST_NAME: &str = "Demo";
const SEED_LAST_NAME: &str = "Account";

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: Option<SecretString>,
    pub token_header: String,
    pub token_ttl_seconds: u64,
    pub password_min_length: usize,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub seed_password: Option<SecretString>,
}

impl Args {
    /// Build the process configuration; a missing secret is fatal here.
    ///
    /// # Errors
    /// Returns an error if any value is out of range.
    pub fn config(&self) -> Result<Config> {
        let policy = AccountPolicy::default()
            .with_min_password_length(self.password_min_length)
            .with_hash_memory_kib(self.hash_memory_kib)
            .with_hash_iterations(self.hash_iterations);

        let config = Config::new(self.jwt_secret.clone())?
            .with_token_header(&self.token_header)?
            .with_token_ttl_seconds(self.token_ttl_seconds)?
            .with_account_policy(policy)?;

        Ok(config)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the database is unreachable,
/// seeding fails, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = args.config().context("Invalid configuration")?;

    let store = PgStore::connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    store
        .init()
        .await
        .context("Failed to create the account table")?;

    if let Some(password) = &args.seed_password {
        let account = seed_account(&store, &config, password).await?;
        info!(number = account.number, "seeded demo account");
    }

    let state = Arc::new(AppState::new(&config, Arc::new(store)));

    bankd::new(args.port, state).await
}

async fn seed_account(
    store: &dyn AccountStore,
    config: &Config,
    password: &SecretString,
) -> Result<Account> {
    let policy = config.account_policy().clone();
    let password = password.clone();

    let account = tokio::task::spawn_blocking(move || {
        Account::new(SEED_FIRST_NAME, SEED_LAST_NAME, &password, &policy)
    })
    .await
    .context("Seeding task failed")?
    .context("Invalid demo account")?;

    store
        .create_account(&account)
        .await
        .context("Failed to store demo account")
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("jwt_secret_set", args.jwt_secret.is_some().to_string()),
        ("token_header", args.token_header.clone()),
        ("token_ttl", format!("{}s", args.token_ttl_seconds)),
        ("password_min_length", args.password_min_length.to_string()),
        ("hash_memory_kib", args.hash_memory_kib.to_string()),
        ("hash_iterations", args.hash_iterations.to_string()),
        ("seed", args.seed_password.is_some().to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} ({})\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        &trimmed[..7]
    } else {
        trimmed
    }
}
