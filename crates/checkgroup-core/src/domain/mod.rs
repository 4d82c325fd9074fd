//! Domain records for check aggregation.
//!
//! - `CheckRun`: one named unit of CI status on a ref
//! - `WorkflowRun` / `WorkflowJob`: the pipeline side used for event scoping and reruns

pub mod check_run;
pub mod workflow;

pub use check_run::{
    CheckConclusion, CheckOutput, CheckRun, CheckRunUpdate, CheckStatus, NO_CONCLUSION,
};
pub use workflow::{WorkflowJob, WorkflowRun};
