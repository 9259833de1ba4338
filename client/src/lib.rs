mod backoff;
pub mod cache;
pub mod client;
pub mod config;
pub mod gateway;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
pub mod purchase;
pub mod session;
pub mod wallet;

pub use cache::{CacheConfig, GameState, GameStateCache, Refresh};
pub use client::{Client, ConfirmationPolicy, RetryPolicy};
pub use config::{Config, ConfigError, Network};
pub use gateway::{Ledger, Wallet};
pub use purchase::{Notification, Purchaser, Rejected};
pub use session::{Session, SessionConfig};
pub use wallet::LocalWallet;
use lottery_types::TransactionHash;
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid game resource: {0}")]
    Snapshot(#[from] lottery_types::DecodeError),
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("transaction {0} not confirmed before timeout")]
    ConfirmationTimeout(TransactionHash),
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
}

impl Error {
    /// Short, user-facing description of the failure.
    pub fn user_message(&self) -> String {
        match self {
            Error::Reqwest(err) if err.is_timeout() => "network request timed out".to_string(),
            Error::Reqwest(_) => "network error".to_string(),
            Error::Failed(status) | Error::FailedWithBody { status, .. } => {
                if status.is_client_error() {
                    format!("rejected by node ({})", status.as_u16())
                } else {
                    format!("node unavailable ({})", status.as_u16())
                }
            }
            Error::NotFound(_) => "not found on chain".to_string(),
            Error::Json(_) | Error::Snapshot(_) | Error::UnexpectedResponse => {
                "unexpected response from node".to_string()
            }
            Error::Signing(_) => "could not sign transaction".to_string(),
            Error::ConfirmationTimeout(_) => "confirmation timed out".to_string(),
            Error::Url(_) | Error::InvalidScheme(_) => "invalid node URL".to_string(),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
