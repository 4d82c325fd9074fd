//! The poll loop that folds required check-runs into one verdict.
//!
//! Each tick fetches a fresh snapshot, narrows it to the required set
//! (latest attempt per name, wanted by the matcher, not the self check, in
//! event scope), classifies it, reports onto the self check and publishes
//! snapshots. [`Aggregator::run`] repeats ticks until a terminal outcome or
//! until the [`PollBudget`](crate::config::PollBudget) runs out.
//!
//! ```text
//! Init -> Polling -> Waiting ---(poll interval)---> Polling
//!                 -> Grace   ---(grace delay)-----> Polling
//!                 -> Succeeded | Failed
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use crate::config::AggregatorConfig;
use crate::domain::CheckRun;
use crate::error::{CheckGroupError, Result};
use crate::markers::is_suppressed;
use crate::obs;
use crate::outputs::OutputSink;
use crate::ports::{CheckRunApi, WorkflowApi};
use crate::reporter::SelfReporter;
use crate::scope::EventScoper;
use crate::supersession::latest_per_name;

/// Resolution state of the self check-run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelfCheck {
    /// Not looked up yet (or no self name configured).
    #[default]
    Unresolved,
    /// Looked up once and not found; never retried.
    Missing,
    Found(u64),
}

impl SelfCheck {
    pub fn id(self) -> Option<u64> {
        match self {
            Self::Found(id) => Some(id),
            Self::Unresolved | Self::Missing => None,
        }
    }
}

/// Mutable state threaded through the ticks of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollState {
    pub self_check: SelfCheck,
    /// Consecutive ticks that saw no incomplete required check.
    pub zero_incomplete_streak: u32,
    pub ticks: u32,
}

impl PollState {
    fn record(&mut self, outcome: &AggregationOutcome) {
        match outcome {
            AggregationOutcome::Waiting { .. } => self.zero_incomplete_streak = 0,
            AggregationOutcome::Grace { .. }
            | AggregationOutcome::Succeeded { .. }
            | AggregationOutcome::Failed { .. } => self.zero_incomplete_streak += 1,
        }
    }
}

/// Verdict of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AggregationOutcome {
    /// Some required checks are still running.
    Waiting {
        incomplete: Vec<String>,
        completed: usize,
        total: usize,
    },
    /// Nothing is incomplete yet, but late checks get one grace delay.
    Grace { total: usize, delay_secs: u64 },
    Succeeded { total: usize },
    Failed {
        unsuccessful: Vec<String>,
        total: usize,
    },
}

impl AggregationOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    /// Short, human-readable status line.
    pub fn status_line(&self) -> String {
        match self {
            Self::Waiting {
                incomplete,
                completed,
                total,
            } => format!("{completed}/{total} waiting for: {}", incomplete.join(", ")),
            Self::Grace { total, delay_secs } => {
                format!("{total}/{total} checks completed, waiting {delay_secs}s for late checks")
            }
            Self::Succeeded { total } => format!("{total}/{total} checks completed successfully"),
            Self::Failed {
                unsuccessful,
                total,
            } => format!(
                "{}/{total} checks failed: {}",
                unsuccessful.len(),
                unsuccessful.join(", ")
            ),
        }
    }
}

/// Literal minimum-count gate of the grace window.
///
/// Holds whenever `required_minimum` is non-zero, so the count comparison
/// only matters for a minimum of zero, where it is always true.
pub fn grace_gate(required_minimum: u32, required_count: usize) -> bool {
    required_minimum != 0 || required_count >= required_minimum as usize
}

/// Classification of one required set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation<'a> {
    pub outcome: AggregationOutcome,
    pub unsuccessful: Vec<&'a CheckRun>,
}

/// Classify `required` without touching any remote state.
///
/// A check carrying a suppression marker for any configured flag counts as
/// complete and is never unsuccessful. The grace window applies on the first
/// tick of a zero-incomplete streak whenever [`grace_gate`] holds; a zero
/// grace delay still costs one immediate re-poll.
pub fn evaluate<'a>(
    required: &[&'a CheckRun],
    config: &AggregatorConfig,
    zero_incomplete_streak: u32,
) -> Evaluation<'a> {
    let suppressed = |check: &CheckRun| is_suppressed(check.text(), &config.flags);

    let incomplete: Vec<&CheckRun> = required
        .iter()
        .copied()
        .filter(|c| !c.is_completed() && !suppressed(c))
        .collect();
    let total = required.len();

    if !incomplete.is_empty() {
        return Evaluation {
            outcome: AggregationOutcome::Waiting {
                incomplete: incomplete.iter().map(|c| c.name.clone()).collect(),
                completed: total - incomplete.len(),
                total,
            },
            unsuccessful: Vec::new(),
        };
    }

    let grace_delay = config.timing.initial_grace_delay;
    if zero_incomplete_streak == 0 && grace_gate(config.required_minimum, total) {
        return Evaluation {
            outcome: AggregationOutcome::Grace {
                total,
                delay_secs: grace_delay.as_secs(),
            },
            unsuccessful: Vec::new(),
        };
    }

    let unsuccessful: Vec<&CheckRun> = required
        .iter()
        .copied()
        .filter(|c| !config.acceptable.accepts(c) && !suppressed(c))
        .collect();

    let outcome = if unsuccessful.is_empty() {
        AggregationOutcome::Succeeded { total }
    } else {
        AggregationOutcome::Failed {
            unsuccessful: unsuccessful.iter().map(|c| c.name.clone()).collect(),
            total,
        }
    };
    Evaluation {
        outcome,
        unsuccessful,
    }
}

/// Machine-readable snapshot published after every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u32,
    pub outcome: AggregationOutcome,
    pub all_checks: Vec<CheckRun>,
    pub required_checks: Vec<CheckRun>,
    pub unsuccessful_checks: Vec<CheckRun>,
    pub generated_at: DateTime<Utc>,
}

/// Polls check-runs on one ref until they settle.
pub struct Aggregator {
    config: AggregatorConfig,
    checks: Arc<dyn CheckRunApi>,
    scoper: EventScoper,
    reporter: SelfReporter,
    outputs: Vec<Arc<dyn OutputSink>>,
}

impl Aggregator {
    pub fn new(
        config: AggregatorConfig,
        checks: Arc<dyn CheckRunApi>,
        workflows: Arc<dyn WorkflowApi>,
    ) -> Self {
        let scoper = EventScoper::new(config.events.clone(), workflows);
        let reporter = SelfReporter::new(Arc::clone(&checks), config.correlation.clone());
        Self {
            config,
            checks,
            scoper,
            reporter,
            outputs: Vec::new(),
        }
    }

    /// Publish every tick's snapshot to `sink` as well.
    pub fn with_output(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.outputs.push(sink);
        self
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Run ticks until a terminal outcome.
    ///
    /// Listing failures and snapshot integrity errors abort immediately.
    /// Exhausting the poll budget yields
    /// [`CheckGroupError::PollBudgetExhausted`].
    pub async fn run(&self) -> Result<TickReport> {
        self.poll_until_settled()
            .instrument(obs::poll_span(&self.config.git_ref))
            .await
    }

    async fn poll_until_settled(&self) -> Result<TickReport> {
        let started = Instant::now();
        let mut state = PollState::default();

        loop {
            let report = self.tick(&mut state).await?;
            if report.outcome.is_terminal() {
                obs::emit_poll_finished(
                    state.ticks,
                    started.elapsed().as_millis() as u64,
                    matches!(report.outcome, AggregationOutcome::Succeeded { .. }),
                );
                return Ok(report);
            }

            if let Some(max_ticks) = self.config.budget.max_ticks {
                if state.ticks >= max_ticks {
                    return Err(budget_exhausted(&state, started));
                }
            }

            let delay = match report.outcome {
                AggregationOutcome::Grace { .. } => self.config.timing.initial_grace_delay,
                _ => self.config.timing.poll_interval,
            };
            tokio::time::sleep(delay).await;

            if let Some(timeout) = self.config.budget.timeout {
                if started.elapsed() >= timeout {
                    return Err(budget_exhausted(&state, started));
                }
            }
        }
    }

    /// One poll tick against a fresh snapshot.
    pub async fn tick(&self, state: &mut PollState) -> Result<TickReport> {
        state.ticks += 1;

        let all = self.checks.list_for_ref(&self.config.git_ref).await?;
        debug!(git_ref = %self.config.git_ref, count = all.len(), "listed check runs");

        self.resolve_self(&all, state);
        let self_id = state.self_check.id();

        let wanted: Vec<&CheckRun> = latest_per_name(&all)?
            .into_iter()
            .filter(|c| Some(c.id) != self_id && self.config.matcher.is_wanted(&c.name))
            .collect();
        let required = self.scoper.filter_in_scope(wanted).await;
        debug!(
            required = ?required.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "required checks"
        );

        let evaluation = evaluate(&required, &self.config, state.zero_incomplete_streak);
        state.record(&evaluation.outcome);

        self.reporter
            .report(self_id, &evaluation.outcome, &required)
            .await;

        let report = TickReport {
            tick: state.ticks,
            outcome: evaluation.outcome,
            all_checks: all.clone(),
            required_checks: required.iter().map(|c| (*c).clone()).collect(),
            unsuccessful_checks: evaluation.unsuccessful.iter().map(|c| (*c).clone()).collect(),
            generated_at: Utc::now(),
        };
        obs::emit_tick_evaluated(&report);

        for sink in &self.outputs {
            if let Err(e) = sink.publish(&report) {
                warn!(error = %e, "couldn't publish tick outputs");
            }
        }

        Ok(report)
    }

    fn resolve_self(&self, all: &[CheckRun], state: &mut PollState) {
        if state.self_check != SelfCheck::Unresolved {
            return;
        }
        let Some(self_name) = self.config.self_name.as_deref() else {
            return;
        };

        state.self_check = match all
            .iter()
            .filter(|c| c.name == self_name)
            .map(|c| c.id)
            .max()
        {
            Some(id) => {
                info!(self_name, id, "resolved self check");
                SelfCheck::Found(id)
            }
            None => {
                warn!(self_name, "couldn't find self check, status updates disabled");
                SelfCheck::Missing
            }
        };
    }
}

fn budget_exhausted(state: &PollState, started: Instant) -> CheckGroupError {
    CheckGroupError::PollBudgetExhausted {
        ticks: state.ticks,
        elapsed_secs: started.elapsed().as_secs(),
    }
}
