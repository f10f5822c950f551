//! Error types for the bot

use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Chain RPC error: {0}")]
    Chain(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Simulation rejected: {0}")]
    Simulation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Known transient noise (rate limiting, flaky transport) that should be
    /// logged at debug level instead of error.
    pub fn is_noise(&self) -> bool {
        let msg = self.to_string().to_lowercase();
        msg.contains("429")
            || msg.contains("rate limit")
            || msg.contains("too many requests")
            || msg.contains("connection reset")
            || msg.contains("timed out")
            || msg.contains("timeout")
    }
}
