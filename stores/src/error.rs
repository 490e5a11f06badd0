use engram_core::error::{EngramError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("store rejected request: {0}")]
    Rejected(String),
    #[error("malformed store response: {0}")]
    Decode(String),
    #[error("embedding provider error: {0}")]
    Embedding(String),
}

impl EngramError for StoreError {
    fn error_code(&self) -> ErrorCode {
        match self {
            StoreError::Transport(_) | StoreError::Embedding(_) => ErrorCode::Unavailable,
            StoreError::Rejected(_) | StoreError::Decode(_) => ErrorCode::Internal,
        }
    }
}
