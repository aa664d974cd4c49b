//! Error types for the paper-trading system.
//!
//! Note that most recoverable conditions (insufficient warm-up history,
//! rejected signals, corrupt ledger files) are deliberately *not* errors:
//! they are logged and skipped so that nothing in the core is fatal.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Market feed error: {0}")]
    Feed(String),

    #[error("Invalid candle data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
