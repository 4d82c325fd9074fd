//! Workflow run and job records used for event scoping and reruns.

use serde::{Deserialize, Serialize};

use super::check_run::CheckStatus;

/// The pipeline run that produced one or more check-runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    /// Name of the event that triggered the run (`push`, `pull_request`, ...).
    pub event: String,
}

/// One job inside a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub status: CheckStatus,
    /// API URL of the check-run this job reports into.
    #[serde(default)]
    pub check_run_url: Option<String>,
}

impl WorkflowJob {
    pub fn is_completed(&self) -> bool {
        self.status == CheckStatus::Completed
    }
}
