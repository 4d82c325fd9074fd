//! Check-run records as observed on a commit reference.

use serde::{Deserialize, Serialize};

use crate::error::CheckGroupError;

/// Lifecycle status of a check-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Queued,
    InProgress,
    Completed,
    /// Any status the host reports that we do not model (`waiting`,
    /// `requested`, `pending`). Never complete.
    #[serde(other)]
    Other,
}

/// Terminal conclusion of a completed check-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckConclusion {
    Success,
    Failure,
    Neutral,
    Cancelled,
    Skipped,
    TimedOut,
    ActionRequired,
    Stale,
    StartupFailure,
    #[serde(other)]
    Unknown,
}

impl CheckConclusion {
    /// Wire label of this conclusion.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Neutral => "neutral",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
            Self::TimedOut => "timed_out",
            Self::ActionRequired => "action_required",
            Self::Stale => "stale",
            Self::StartupFailure => "startup_failure",
            Self::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for CheckConclusion {
    type Err = CheckGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "neutral" => Ok(Self::Neutral),
            "cancelled" => Ok(Self::Cancelled),
            "skipped" => Ok(Self::Skipped),
            "timed_out" => Ok(Self::TimedOut),
            "action_required" => Ok(Self::ActionRequired),
            "stale" => Ok(Self::Stale),
            "startup_failure" => Ok(Self::StartupFailure),
            other => Err(CheckGroupError::UnknownConclusion(other.to_string())),
        }
    }
}

/// Label used for a check-run that has no conclusion yet.
pub const NO_CONCLUSION: &str = "none";

/// Free-text output block attached to a check-run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// One named unit of CI status attached to a commit reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRun {
    /// Host-assigned identifier; a re-run gets a fresh, higher id.
    pub id: u64,
    pub name: String,
    pub status: CheckStatus,
    #[serde(default)]
    pub conclusion: Option<CheckConclusion>,
    #[serde(default)]
    pub output: CheckOutput,
    /// Browser URL of the check; encodes the producing workflow run.
    #[serde(default)]
    pub html_url: Option<String>,
    /// API URL of the check; matched against a job's `check_run_url`.
    #[serde(default)]
    pub url: Option<String>,
}

impl CheckRun {
    /// A queued check-run with empty output.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: CheckStatus::Queued,
            conclusion: None,
            output: CheckOutput::default(),
            html_url: None,
            url: None,
        }
    }

    pub fn in_progress(mut self) -> Self {
        self.status = CheckStatus::InProgress;
        self.conclusion = None;
        self
    }

    pub fn completed(mut self, conclusion: CheckConclusion) -> Self {
        self.status = CheckStatus::Completed;
        self.conclusion = Some(conclusion);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.output.text = Some(text.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.output.summary = Some(summary.into());
        self
    }

    pub fn with_html_url(mut self, html_url: impl Into<String>) -> Self {
        self.html_url = Some(html_url.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Whether the host reports this check as finished.
    pub fn is_completed(&self) -> bool {
        self.status == CheckStatus::Completed
    }

    /// Conclusion label, `"none"` when the check has not concluded.
    pub fn conclusion_label(&self) -> &'static str {
        self.conclusion.map_or(NO_CONCLUSION, CheckConclusion::as_str)
    }

    /// Output text, empty when absent.
    pub fn text(&self) -> &str {
        self.output.text.as_deref().unwrap_or_default()
    }

    /// Output summary, empty when absent.
    pub fn summary(&self) -> &str {
        self.output.summary.as_deref().unwrap_or_default()
    }
}

/// Fields written back onto a check-run.
///
/// The host requires title and summary whenever output is replaced, so both
/// are always sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRunUpdate {
    pub title: String,
    pub summary: String,
    pub text: Option<String>,
}
