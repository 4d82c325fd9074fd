//! In-memory fakes for the remote ports (testing only)
//!
//! [`MemoryCiHost`] satisfies both [`CheckRunApi`] and [`WorkflowApi`] without
//! any network access. Listing can be scripted as a queue of snapshots so a
//! test can walk the engine through several poll ticks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{CheckRun, CheckRunUpdate, WorkflowJob, WorkflowRun};
use crate::error::{CheckGroupError, Result};
use crate::ports::{CheckRunApi, WorkflowApi};

#[derive(Debug, Default)]
struct HostState {
    /// Snapshots served in order; the last one repeats once the queue drains.
    snapshots: VecDeque<Vec<CheckRun>>,
    current: Vec<CheckRun>,
    runs: HashMap<u64, WorkflowRun>,
    jobs: HashMap<u64, Vec<WorkflowJob>>,
    updates: Vec<(u64, CheckRunUpdate)>,
    reruns: Vec<u64>,
    run_lookups: Vec<u64>,
    list_calls: usize,
    fail_list: bool,
    fail_update: bool,
    fail_rerun: bool,
    fail_runs: HashSet<u64>,
}

/// In-memory CI host backed by scripted snapshots.
#[derive(Debug, Default)]
pub struct MemoryCiHost {
    state: Mutex<HostState>,
}

impl MemoryCiHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that always lists the same check-runs.
    pub fn with_checks(checks: Vec<CheckRun>) -> Self {
        let host = Self::new();
        host.state.lock().unwrap().current = checks;
        host
    }

    /// Queue a snapshot to be served by the next unserved `list_for_ref` call.
    pub fn push_snapshot(&self, checks: Vec<CheckRun>) {
        self.state.lock().unwrap().snapshots.push_back(checks);
    }

    pub fn add_run(&self, run: WorkflowRun) {
        self.state.lock().unwrap().runs.insert(run.id, run);
    }

    pub fn add_jobs(&self, run_id: u64, jobs: Vec<WorkflowJob>) {
        self.state.lock().unwrap().jobs.insert(run_id, jobs);
    }

    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_list = true;
    }

    pub fn fail_updates(&self) {
        self.state.lock().unwrap().fail_update = true;
    }

    pub fn fail_reruns(&self) {
        self.state.lock().unwrap().fail_rerun = true;
    }

    pub fn fail_run_lookup(&self, run_id: u64) {
        self.state.lock().unwrap().fail_runs.insert(run_id);
    }

    /// Every update written so far, oldest first.
    pub fn updates(&self) -> Vec<(u64, CheckRunUpdate)> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn reruns(&self) -> Vec<u64> {
        self.state.lock().unwrap().reruns.clone()
    }

    /// Run ids passed to `get_run`, in call order.
    pub fn run_lookups(&self) -> Vec<u64> {
        self.state.lock().unwrap().run_lookups.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

#[async_trait]
impl CheckRunApi for MemoryCiHost {
    async fn list_for_ref(&self, _git_ref: &str) -> Result<Vec<CheckRun>> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_list {
            return Err(CheckGroupError::remote("list check runs", "host unavailable"));
        }
        if let Some(next) = state.snapshots.pop_front() {
            state.current = next;
        }
        Ok(state.current.clone())
    }

    async fn update(&self, check_run_id: u64, update: &CheckRunUpdate) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_update {
            return Err(CheckGroupError::remote("update check run", "forbidden"));
        }
        state.updates.push((check_run_id, update.clone()));
        for check in state.current.iter_mut().filter(|c| c.id == check_run_id) {
            check.output.title = Some(update.title.clone());
            check.output.summary = Some(update.summary.clone());
            check.output.text = update.text.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowApi for MemoryCiHost {
    async fn get_run(&self, run_id: u64) -> Result<WorkflowRun> {
        let mut state = self.state.lock().unwrap();
        state.run_lookups.push(run_id);
        if state.fail_runs.contains(&run_id) {
            return Err(CheckGroupError::remote("get workflow run", "timeout"));
        }
        state
            .runs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| CheckGroupError::remote("get workflow run", format!("run {run_id} not found")))
    }

    async fn list_jobs(&self, run_id: u64) -> Result<Vec<WorkflowJob>> {
        let state = self.state.lock().unwrap();
        state
            .jobs
            .get(&run_id)
            .cloned()
            .ok_or_else(|| CheckGroupError::remote("list jobs", format!("run {run_id} not found")))
    }

    async fn rerun_job(&self, job_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_rerun {
            return Err(CheckGroupError::remote("rerun job", "job is already running"));
        }
        state.reruns.push(job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshots_are_served_in_order_then_repeat() {
        let host = MemoryCiHost::new();
        host.push_snapshot(vec![CheckRun::new(1, "a")]);
        host.push_snapshot(vec![CheckRun::new(1, "a"), CheckRun::new(2, "b")]);

        assert_eq!(host.list_for_ref("main").await.unwrap().len(), 1);
        assert_eq!(host.list_for_ref("main").await.unwrap().len(), 2);
        assert_eq!(host.list_for_ref("main").await.unwrap().len(), 2);
        assert_eq!(host.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_update_is_visible_in_next_listing() {
        let host = MemoryCiHost::with_checks(vec![CheckRun::new(5, "self")]);
        let update = CheckRunUpdate {
            title: "t".to_string(),
            summary: "s".to_string(),
            text: Some("x".to_string()),
        };
        host.update(5, &update).await.unwrap();

        let listed = host.list_for_ref("main").await.unwrap();
        assert_eq!(listed[0].text(), "x");
        assert_eq!(host.updates().len(), 1);
    }
}
