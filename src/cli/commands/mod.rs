use crate::config::DEFAULT_TOKEN_HEADER;
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        BoolishValueParser, ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    Command::new("bankd")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("BANKD_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("BANKD_DSN")
                .required(true),
        )
        .arg(
            Arg::new("jwt-secret")
                .long("jwt-secret")
                .help("Secret used to sign and verify tokens (HS256)")
                .env("BANKD_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("token-header")
                .long("token-header")
                .help("Request header carrying the token")
                .default_value(DEFAULT_TOKEN_HEADER)
                .env("BANKD_TOKEN_HEADER"),
        )
        .arg(
            Arg::new("token-ttl")
                .long("token-ttl")
                .help("Token lifetime in seconds")
                .default_value("900")
                .env("BANKD_TOKEN_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("password-min-length")
                .long("password-min-length")
                .help("Minimum password length in characters")
                .default_value("8")
                .env("BANKD_PASSWORD_MIN_LENGTH")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("hash-memory-kib")
                .long("hash-memory-kib")
                .help("Argon2id memory cost in KiB")
                .default_value("19456")
                .env("BANKD_HASH_MEMORY_KIB")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("hash-iterations")
                .long("hash-iterations")
                .help("Argon2id iteration count")
                .default_value("2")
                .env("BANKD_HASH_ITERATIONS")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Create a demo account at startup")
                .env("BANKD_SEED")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new("seed-password")
                .long("seed-password")
                .help("Password for the demo account created by --seed")
                .env("BANKD_SEED_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("BANKD_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
