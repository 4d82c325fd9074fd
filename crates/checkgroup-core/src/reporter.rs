//! Mirror the aggregate status onto the self check-run.

use std::sync::Arc;

use tracing::info;

use crate::config::Correlation;
use crate::domain::{CheckRun, CheckRunUpdate};
use crate::engine::AggregationOutcome;
use crate::markers::encode_correlation;
use crate::obs;
use crate::ports::CheckRunApi;

/// Upper bound the host accepts for a check-run summary.
pub const MAX_SUMMARY_CHARS: usize = 65_535;

/// Writes status lines onto the self check. Never fails the caller.
pub struct SelfReporter {
    checks: Arc<dyn CheckRunApi>,
    correlation: Option<Correlation>,
}

impl SelfReporter {
    pub fn new(checks: Arc<dyn CheckRunApi>, correlation: Option<Correlation>) -> Self {
        Self {
            checks,
            correlation,
        }
    }

    /// The update written for `outcome` over `required`.
    pub fn render(&self, outcome: &AggregationOutcome, required: &[&CheckRun]) -> CheckRunUpdate {
        let summary: String = required.iter().map(|c| c.summary()).collect();
        CheckRunUpdate {
            title: outcome.status_line(),
            summary: truncate_chars(summary, MAX_SUMMARY_CHARS),
            text: self
                .correlation
                .as_ref()
                .map(|c| encode_correlation(&c.job_identifier, c.run_id)),
        }
    }

    /// Log the status line and, when the self check is known, write it there.
    ///
    /// A failed write is logged and otherwise ignored.
    pub async fn report(
        &self,
        self_check: Option<u64>,
        outcome: &AggregationOutcome,
        required: &[&CheckRun],
    ) {
        let update = self.render(outcome, required);
        info!(status = %update.title, "aggregate status");

        let Some(check_run_id) = self_check else {
            return;
        };
        if let Err(e) = self.checks.update(check_run_id, &update).await {
            obs::emit_self_update_failed(check_run_id, &e);
        }
    }
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max) {
        text.truncate(cut);
    }
    text
}
