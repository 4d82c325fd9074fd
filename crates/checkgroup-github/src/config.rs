//! Connection settings for the GitHub REST API.

use std::time::Duration;

use crate::error::{GithubError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// `owner/name` coordinate of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(GithubError::InvalidRepository(raw.to_string())),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// GitHub client configuration
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// REST base URL; differs from the public one on GitHub Enterprise Server.
    pub api_url: String,
    pub repository: RepoRef,
    pub token: String,
    pub request_timeout: Duration,
    /// Attempts per request, including the first.
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
}

impl GithubConfig {
    pub fn new(repository: RepoRef, token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            repository,
            token: token.into(),
            request_timeout: Duration::from_secs(30),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_retries(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.retry_max_attempts = max_attempts;
        self.retry_base_delay = base_delay;
        self
    }
}
