//! Errors raised by the GitHub adapter.

use checkgroup_core::CheckGroupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("invalid repository '{0}', expected owner/name")]
    InvalidRepository(String),

    #[error("invalid api url '{url}': {reason}")]
    InvalidApiUrl { url: String, reason: String },

    #[error("invalid github token")]
    InvalidToken,

    #[error("couldn't build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("github api {operation} request failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("github api {operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode github {operation}: {source}")]
    Decode {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
}

impl GithubError {
    fn operation(&self) -> &str {
        match self {
            Self::Transport { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => operation,
            Self::InvalidRepository(_)
            | Self::InvalidApiUrl { .. }
            | Self::InvalidToken
            | Self::Client(_) => "configure client",
        }
    }
}

impl From<GithubError> for CheckGroupError {
    fn from(err: GithubError) -> Self {
        CheckGroupError::remote(err.operation().to_string(), &err)
    }
}

pub type Result<T> = std::result::Result<T, GithubError>;
