//! Error types for check aggregation.

use thiserror::Error;

/// Errors produced by the aggregation engine and its collaborators.
#[derive(Debug, Error)]
pub enum CheckGroupError {
    /// A name or event pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An acceptable-conclusion entry is not a known conclusion label.
    #[error("unknown check conclusion: {0}")]
    UnknownConclusion(String),

    /// Configuration failed validation before any remote call was made.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Two check-runs in one snapshot share an identifier.
    #[error("check-run id {id} appears more than once (names: {first}, {second})")]
    DuplicateCheckRunId {
        id: u64,
        first: String,
        second: String,
    },

    /// A remote collaborator call failed.
    #[error("remote call '{operation}' failed: {detail}")]
    Remote { operation: String, detail: String },

    /// The named check-run does not exist on the ref.
    #[error("couldn't find check run '{name}' on ref {git_ref}")]
    CheckRunNotFound { name: String, git_ref: String },

    /// The host-supplied poll budget ran out before a terminal state.
    #[error("gave up after {ticks} poll(s) / {elapsed_secs}s without a terminal result")]
    PollBudgetExhausted { ticks: u32, elapsed_secs: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckGroupError {
    /// Build a [`CheckGroupError::Remote`] from any displayable cause.
    pub fn remote(operation: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Remote {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, CheckGroupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_id_error_names_both_checks() {
        let err = CheckGroupError::DuplicateCheckRunId {
            id: 7,
            first: "build".to_string(),
            second: "lint".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("build"));
        assert!(msg.contains("lint"));
    }

    #[test]
    fn test_remote_helper_keeps_operation() {
        let err = CheckGroupError::remote("list check runs", "502 Bad Gateway");
        assert_eq!(
            err.to_string(),
            "remote call 'list check runs' failed: 502 Bad Gateway"
        );
    }

    #[test]
    fn test_invalid_pattern_displays_pattern() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = CheckGroupError::InvalidPattern {
            pattern: "(".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("invalid pattern '('"));
    }
}
