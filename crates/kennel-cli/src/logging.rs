//! Logging setup for the CLI.
//!
//! Logs go to stderr so stdout carries only responses.

use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Map a `--log-level` value to a tracing level.
pub fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install the global subscriber. `RUST_LOG`, when set, overrides `level`.
pub fn init(level: &str) {
    let builder = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    match EnvFilter::try_from_default_env() {
        Ok(filter) => builder.with_env_filter(filter).init(),
        Err(_) => builder.init(),
    }
}
