//! Structured lifecycle events for the aggregation loop.
//!
//! Every event carries an `event` field so log pipelines can select on it:
//! `poll.tick`, `poll.finished`, `self_check.update_failed`,
//! `rerun.triggered`.

use tracing::{info, warn};

use crate::engine::{AggregationOutcome, TickReport};

/// Span covering one aggregation invocation on `git_ref`.
pub fn poll_span(git_ref: &str) -> tracing::Span {
    tracing::info_span!("checkgroup.poll", git_ref = %git_ref)
}

fn outcome_label(outcome: &AggregationOutcome) -> &'static str {
    match outcome {
        AggregationOutcome::Waiting { .. } => "waiting",
        AggregationOutcome::Grace { .. } => "grace",
        AggregationOutcome::Succeeded { .. } => "succeeded",
        AggregationOutcome::Failed { .. } => "failed",
    }
}

/// Emit event: one tick evaluated.
pub fn emit_tick_evaluated(report: &TickReport) {
    info!(
        event = "poll.tick",
        tick = report.tick,
        outcome = outcome_label(&report.outcome),
        listed = report.all_checks.len(),
        required = report.required_checks.len(),
        unsuccessful = report.unsuccessful_checks.len(),
        status = %report.outcome.status_line(),
    );
}

/// Emit event: the loop reached a terminal outcome.
pub fn emit_poll_finished(ticks: u32, duration_ms: u64, success: bool) {
    info!(
        event = "poll.finished",
        ticks = ticks,
        duration_ms = duration_ms,
        success = success,
    );
}

/// Emit event: writing the self check failed (warning level).
pub fn emit_self_update_failed(check_run_id: u64, error: &dyn std::fmt::Display) {
    warn!(event = "self_check.update_failed", check_run_id, error = %error);
}

/// Emit event: a job rerun was requested.
pub fn emit_rerun_triggered(run_id: u64, job_id: u64, job_name: &str) {
    info!(event = "rerun.triggered", run_id, job_id, job_name = %job_name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use crate::domain::{CheckConclusion, CheckRun};

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&AggregationOutcome::Succeeded { total: 1 }), "succeeded");
        assert_eq!(
            outcome_label(&AggregationOutcome::Grace {
                total: 0,
                delay_secs: 1
            }),
            "grace"
        );
    }

    #[test]
    fn test_tick_event_fields() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Capture(captured.clone()));

        let failed = CheckRun::new(2, "test").completed(CheckConclusion::Failure);
        let report = TickReport {
            tick: 3,
            outcome: AggregationOutcome::Failed {
                unsuccessful: vec!["test".to_string()],
                total: 1,
            },
            all_checks: vec![CheckRun::new(1, "checkgroup"), failed.clone()],
            required_checks: vec![failed.clone()],
            unsuccessful_checks: vec![failed],
            generated_at: chrono::Utc::now(),
        };
        tracing::subscriber::with_default(subscriber, || {
            let _span = poll_span("refs/heads/main").entered();
            emit_tick_evaluated(&report);
        });

        let events = captured.lock().unwrap();
        assert_eq!(events.len(), 1);
        let fields = &events[0];
        assert_eq!(fields["event"], "poll.tick");
        assert_eq!(fields["tick"], "3");
        assert_eq!(fields["outcome"], "failed");
        assert_eq!(fields["listed"], "2");
        assert_eq!(fields["unsuccessful"], "1");
        assert_eq!(fields["status"], "1/1 checks failed: test");
    }

    type Fields = HashMap<String, String>;

    struct Capture(Arc<Mutex<Vec<Fields>>>);

    impl<S: tracing::Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = FieldMap::default();
            event.record(&mut fields);
            self.0.lock().unwrap().push(fields.0);
        }
    }

    #[derive(Default)]
    struct FieldMap(Fields);

    impl Visit for FieldMap {
        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }
}
