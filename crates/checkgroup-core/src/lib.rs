//! checkgroup core library
//!
//! Folds the sibling check-runs on one commit reference into a single
//! verdict and mirrors it onto the caller's own ("self") check-run.
//! Remote services are reached only through the [`ports`] traits.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fakes;
pub mod flag;
pub mod markers;
pub mod matcher;
pub mod obs;
pub mod outputs;
pub mod ports;
pub mod reporter;
pub mod rerun;
pub mod scope;
pub mod supersession;
pub mod telemetry;

pub use config::{
    parse_multiline, AcceptableConclusions, AggregatorConfig, AggregatorSettings, Correlation,
    PollBudget, PollTiming,
};
pub use domain::{
    CheckConclusion, CheckOutput, CheckRun, CheckRunUpdate, CheckStatus, WorkflowJob, WorkflowRun,
};
pub use engine::{AggregationOutcome, Aggregator, PollState, SelfCheck, TickReport};
pub use error::{CheckGroupError, Result};
pub use flag::set_flag;
pub use matcher::{CheckMatcher, PatternSet};
pub use outputs::{MemoryOutputs, OutputSink, StepOutputFile};
pub use ports::{CheckRunApi, WorkflowApi};
pub use rerun::{RerunCollaborator, RerunOutcome};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
