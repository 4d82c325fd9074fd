//! Restrict aggregation to checks produced by runs of selected trigger events.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::CheckRun;
use crate::matcher::PatternSet;
use crate::ports::WorkflowApi;

static RUN_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/runs/(\d+)/job/\d+(?:[?#].*)?$").expect("run url pattern compiles")
});

/// Workflow run id encoded in a check's browser URL
/// (`.../actions/runs/{run_id}/job/{job_id}`).
pub fn parse_run_id(html_url: &str) -> Option<u64> {
    RUN_URL.captures(html_url)?.get(1)?.as_str().parse().ok()
}

/// Outcome of resolving one workflow run's trigger event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunEvent {
    Resolved(String),
    LookupFailed,
}

/// Filters check-runs by the event that triggered their workflow run.
pub struct EventScoper {
    events: PatternSet,
    workflows: Arc<dyn WorkflowApi>,
}

impl EventScoper {
    pub fn new(events: PatternSet, workflows: Arc<dyn WorkflowApi>) -> Self {
        Self { events, workflows }
    }

    /// Whether scoping is configured at all.
    pub fn is_active(&self) -> bool {
        !self.events.is_empty()
    }

    /// Scope test for a single check. Performs at most one remote lookup.
    pub async fn is_in_scope(&self, check: &CheckRun) -> bool {
        self.filter_in_scope(vec![check]).await.len() == 1
    }

    /// Keep the checks whose workflow run was triggered by an allowed event.
    ///
    /// With no event patterns every check passes without any lookup.
    /// Otherwise each distinct run id is resolved once, all lookups run
    /// concurrently, and every lookup finishes before filtering.
    ///
    /// A check is in scope only when its run's event resolved and matched.
    /// A URL that does not encode a run, or a failed lookup, leaves it out.
    pub async fn filter_in_scope<'a>(&self, checks: Vec<&'a CheckRun>) -> Vec<&'a CheckRun> {
        if !self.is_active() {
            return checks;
        }

        let run_ids: Vec<Option<u64>> = checks
            .iter()
            .map(|c| c.html_url.as_deref().and_then(parse_run_id))
            .collect();

        let mut join_set = JoinSet::new();
        let mut requested = std::collections::HashSet::new();
        for run_id in run_ids.iter().flatten().copied() {
            if !requested.insert(run_id) {
                continue;
            }
            let workflows = Arc::clone(&self.workflows);
            join_set.spawn(async move {
                let event = match workflows.get_run(run_id).await {
                    Ok(run) => RunEvent::Resolved(run.event),
                    Err(e) => {
                        warn!(run_id, error = %e, "couldn't resolve workflow run event");
                        RunEvent::LookupFailed
                    }
                };
                (run_id, event)
            });
        }

        let mut events: HashMap<u64, RunEvent> = HashMap::with_capacity(requested.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((run_id, event)) => {
                    events.insert(run_id, event);
                }
                Err(e) => warn!(error = %e, "workflow run lookup task failed"),
            }
        }

        checks
            .into_iter()
            .zip(run_ids)
            .filter(|(check, run_id)| {
                let Some(run_id) = run_id else {
                    debug!(check = %check.name, url = ?check.html_url, "no workflow run in check url, out of scope");
                    return false;
                };
                match events.get(run_id) {
                    Some(RunEvent::Resolved(event)) => {
                        let in_scope = self.events.matches_any(event);
                        debug!(check = %check.name, run_id, %event, in_scope, "event scope");
                        in_scope
                    }
                    Some(RunEvent::LookupFailed) | None => {
                        debug!(check = %check.name, run_id, "run event unknown, out of scope");
                        false
                    }
                }
            })
            .map(|(check, _)| check)
            .collect()
    }
}
