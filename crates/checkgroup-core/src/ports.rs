//! Injectable remote collaborators.
//!
//! Implement these traits to plug in a real CI host, or use the in-memory
//! fakes in [`crate::fakes`] for tests. The repository coordinate is bound
//! into the implementation, not passed per call.

use async_trait::async_trait;

use crate::domain::{CheckRun, CheckRunUpdate, WorkflowJob, WorkflowRun};
use crate::error::Result;

/// Check-run listing and update.
#[async_trait]
pub trait CheckRunApi: Send + Sync {
    /// All check-runs attached to `git_ref`, across every page.
    async fn list_for_ref(&self, git_ref: &str) -> Result<Vec<CheckRun>>;

    /// Replace the output of one check-run.
    async fn update(&self, check_run_id: u64, update: &CheckRunUpdate) -> Result<()>;
}

/// Workflow run metadata, job listing and job reruns.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun>;

    async fn list_jobs(&self, run_id: u64) -> Result<Vec<WorkflowJob>>;

    async fn rerun_job(&self, job_id: u64) -> Result<()>;
}
