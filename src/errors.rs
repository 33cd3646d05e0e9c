use std::io;

use thiserror::Error;

pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("geocoding provider: {0}")]
    Provider(String),
    #[error("no geocoding results for coordinate")]
    NoResults,
    #[error("resolution cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        ResolveError::Provider(err.to_string())
    }
}

impl ResolveError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Provider(_))
    }
}
