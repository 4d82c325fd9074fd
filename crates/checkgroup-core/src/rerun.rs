//! Restart the job behind a stale aggregator check.
//!
//! The self-reporter stamps each aggregator check with a correlation marker
//! naming the workflow run that wrote it. When an aggregator job finished
//! early (say, before a flag was set), the rerun collaborator finds that
//! check, locates its job inside the run and asks the host to rerun it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::CheckRun;
use crate::error::Result;
use crate::markers::decode_correlation_run_id;
use crate::obs;
use crate::ports::{CheckRunApi, WorkflowApi};

/// What a rerun attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerunOutcome {
    /// No check on the ref carried a marker for this job identifier.
    NoMarker,
    /// Marked checks exist but no job reports into any of them.
    NoMatchingJob,
    /// The matching job is still running.
    StillRunning { run_id: u64, job_id: u64 },
    Triggered { run_id: u64, job_id: u64 },
    /// A remote call failed and was swallowed.
    Skipped,
}

pub struct RerunCollaborator {
    checks: Arc<dyn CheckRunApi>,
    workflows: Arc<dyn WorkflowApi>,
    job_identifier: String,
    strict: bool,
}

impl RerunCollaborator {
    pub fn new(
        checks: Arc<dyn CheckRunApi>,
        workflows: Arc<dyn WorkflowApi>,
        job_identifier: impl Into<String>,
    ) -> Self {
        Self {
            checks,
            workflows,
            job_identifier: job_identifier.into(),
            strict: false,
        }
    }

    /// Propagate remote failures instead of swallowing them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Walk the marked checks on `git_ref` and act on the first one whose
    /// job is found: rerun it if completed, leave it if running.
    ///
    /// Remote failures are expected races (another actor may have rerun the
    /// job already) and are logged at info level, unless strict.
    pub async fn rerun(&self, git_ref: &str) -> Result<RerunOutcome> {
        match self.try_rerun(git_ref).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if !self.strict => {
                info!(error = %e, "rerun skipped");
                Ok(RerunOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    async fn try_rerun(&self, git_ref: &str) -> Result<RerunOutcome> {
        let all = self.checks.list_for_ref(git_ref).await?;
        let mut saw_marker = false;

        for check in &all {
            let Some(run_id) = decode_correlation_run_id(check.text(), &self.job_identifier)
            else {
                continue;
            };
            saw_marker = true;
            if let Some(outcome) = self.rerun_job_for(check, run_id).await? {
                return Ok(outcome);
            }
        }

        if saw_marker {
            debug!(job_identifier = %self.job_identifier, "no job reports into a marked check");
            Ok(RerunOutcome::NoMatchingJob)
        } else {
            debug!(job_identifier = %self.job_identifier, "no correlation marker on ref");
            Ok(RerunOutcome::NoMarker)
        }
    }

    /// `None` when no job of `run_id` reports into `check`.
    async fn rerun_job_for(&self, check: &CheckRun, run_id: u64) -> Result<Option<RerunOutcome>> {
        let jobs = self.workflows.list_jobs(run_id).await?;
        let Some(job) = jobs
            .iter()
            .find(|j| j.check_run_url.is_some() && j.check_run_url == check.url)
        else {
            return Ok(None);
        };

        if !job.is_completed() {
            info!(run_id, job_id = job.id, "job still running, not rerunning");
            return Ok(Some(RerunOutcome::StillRunning {
                run_id,
                job_id: job.id,
            }));
        }

        self.workflows.rerun_job(job.id).await?;
        obs::emit_rerun_triggered(run_id, job.id, &job.name);
        Ok(Some(RerunOutcome::Triggered {
            run_id,
            job_id: job.id,
        }))
    }
}
