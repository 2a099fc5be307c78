//! Error handling and custom error types
//!
//! Provides unified error handling across the proxy using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("API key is not set on the server.")]
    MissingApiKey,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("{}", upstream_message(.label, .status, .message))]
    UpstreamRejected {
        label: &'static str,
        status: u16,
        message: Option<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn upstream_message(label: &str, status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => format!(
            "{} API request failed with status {}: {}",
            label, status, message
        ),
        None => format!("{} API request failed with status {}", label, status),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
