//! Aggregator configuration.
//!
//! [`AggregatorSettings`] is the raw, string-typed surface filled from flags
//! or `INPUT_*` environment variables. [`AggregatorSettings::compile`] turns
//! it into an [`AggregatorConfig`] with compiled patterns and parsed
//! conclusions, before any remote call is made.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{CheckConclusion, CheckRun, NO_CONCLUSION};
use crate::error::{CheckGroupError, Result};
use crate::matcher::{CheckMatcher, PatternSet};

/// Default pause between poll ticks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Split a multi-line input into trimmed, non-blank entries.
pub fn parse_multiline(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Conclusions that count as a passing required check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptableConclusions {
    labels: BTreeSet<String>,
}

impl AcceptableConclusions {
    /// Validate labels; `"none"` accepts a check with no conclusion.
    pub fn parse<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let mut set = BTreeSet::new();
        for label in labels {
            let label = label.as_ref();
            if label != NO_CONCLUSION {
                label.parse::<CheckConclusion>()?;
            }
            set.insert(label.to_string());
        }
        Ok(Self { labels: set })
    }

    pub fn accepts(&self, check: &CheckRun) -> bool {
        self.labels.contains(check.conclusion_label())
    }
}

impl Default for AcceptableConclusions {
    fn default() -> Self {
        Self {
            labels: BTreeSet::from([CheckConclusion::Success.as_str().to_string()]),
        }
    }
}

/// Delays used by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// One-shot wait when nothing is incomplete yet, for late-scheduled checks.
    pub initial_grace_delay: Duration,
    /// Wait between ticks while checks are incomplete.
    pub poll_interval: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            initial_grace_delay: Duration::ZERO,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

/// Host-supplied bound on one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollBudget {
    pub max_ticks: Option<u32>,
    pub timeout: Option<Duration>,
}

/// Identifies this pipeline run in the self check's correlation marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    pub job_identifier: String,
    pub run_id: u64,
}

/// Validated configuration for one aggregation invocation.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub git_ref: String,
    pub matcher: CheckMatcher,
    pub events: PatternSet,
    pub self_name: Option<String>,
    pub acceptable: AcceptableConclusions,
    pub flags: Vec<String>,
    pub required_minimum: u32,
    pub timing: PollTiming,
    pub budget: PollBudget,
    pub correlation: Option<Correlation>,
}

impl AggregatorConfig {
    /// Config for `git_ref` with defaults everywhere else.
    pub fn new(git_ref: impl Into<String>, matcher: CheckMatcher) -> Self {
        Self {
            git_ref: git_ref.into(),
            matcher,
            events: PatternSet::default(),
            self_name: None,
            acceptable: AcceptableConclusions::default(),
            flags: Vec::new(),
            required_minimum: 0,
            timing: PollTiming::default(),
            budget: PollBudget::default(),
            correlation: None,
        }
    }
}

/// Raw settings as supplied by the host environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    pub git_ref: String,
    pub checks: Vec<String>,
    pub excluded_checks: Vec<String>,
    pub self_name: Option<String>,
    pub required_status: Vec<String>,
    pub initial_delay_secs: u64,
    pub poll_interval_secs: Option<u64>,
    pub job_identifier: Option<String>,
    pub run_id: Option<u64>,
    pub flags: Vec<String>,
    pub required_minimum: u32,
    pub events: Vec<String>,
    pub max_polls: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl AggregatorSettings {
    pub fn compile(self) -> Result<AggregatorConfig> {
        if self.git_ref.trim().is_empty() {
            return Err(CheckGroupError::InvalidConfig("ref must not be empty".to_string()));
        }
        if self.poll_interval_secs == Some(0) {
            return Err(CheckGroupError::InvalidConfig(
                "poll interval must be at least one second".to_string(),
            ));
        }

        let acceptable = if self.required_status.is_empty() {
            AcceptableConclusions::default()
        } else {
            AcceptableConclusions::parse(&self.required_status)?
        };

        let correlation = match (non_blank(self.job_identifier), self.run_id) {
            (Some(job_identifier), Some(run_id)) => Some(Correlation {
                job_identifier,
                run_id,
            }),
            _ => None,
        };

        Ok(AggregatorConfig {
            git_ref: self.git_ref,
            matcher: CheckMatcher::new(&self.checks, &self.excluded_checks)?,
            events: PatternSet::compile(&self.events)?,
            self_name: non_blank(self.self_name),
            acceptable,
            flags: self.flags,
            required_minimum: self.required_minimum,
            timing: PollTiming {
                initial_grace_delay: Duration::from_secs(self.initial_delay_secs),
                poll_interval: Duration::from_secs(
                    self.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
                ),
            },
            budget: PollBudget {
                max_ticks: self.max_polls,
                timeout: self.timeout_secs.map(Duration::from_secs),
            },
            correlation,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
