//! End-to-end poll loop behaviour against the in-memory CI host.

use std::sync::Arc;
use std::time::Duration;

use checkgroup_core::fakes::MemoryCiHost;
use checkgroup_core::markers::encode_suppression;
use checkgroup_core::{
    AggregationOutcome, Aggregator, AggregatorConfig, AggregatorSettings, CheckConclusion,
    CheckGroupError,
    CheckMatcher, CheckRun, CheckStatus, Correlation, MemoryOutputs, PatternSet, PollState,
    RerunCollaborator, RerunOutcome, SelfCheck, WorkflowJob, WorkflowRun,
};

const REF: &str = "refs/heads/main";

fn config() -> AggregatorConfig {
    AggregatorConfig::new(REF, CheckMatcher::new(&[".*"], &[]).unwrap())
}

fn aggregator(config: AggregatorConfig, host: &Arc<MemoryCiHost>) -> Aggregator {
    Aggregator::new(config, host.clone(), host.clone())
}

fn success(id: u64, name: &str) -> CheckRun {
    CheckRun::new(id, name).completed(CheckConclusion::Success)
}

fn job_url(run_id: u64, job_id: u64) -> String {
    format!("https://github.com/org/repo/actions/runs/{run_id}/job/{job_id}")
}

#[tokio::test(start_paused = true)]
async fn single_successful_check_succeeds() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![success(1, "build")]));

    let report = aggregator(config(), &host).run().await.unwrap();

    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 1 });
    assert_eq!(report.outcome.status_line(), "1/1 checks completed successfully");
    // One grace re-poll even with no delay configured.
    assert_eq!(host.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn default_settings_repoll_before_declaring_empty_success() {
    let host = Arc::new(MemoryCiHost::new());
    host.push_snapshot(Vec::new());
    host.push_snapshot(vec![CheckRun::new(1, "build").completed(CheckConclusion::Failure)]);
    let config = AggregatorSettings {
        git_ref: REF.to_string(),
        checks: vec![".*".to_string()],
        ..AggregatorSettings::default()
    }
    .compile()
    .unwrap();
    let outputs = Arc::new(MemoryOutputs::new());

    let report = aggregator(config, &host)
        .with_output(outputs.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(host.list_calls(), 2);
    assert_eq!(
        outputs.reports()[0].outcome,
        AggregationOutcome::Grace {
            total: 0,
            delay_secs: 0
        }
    );
    assert_eq!(
        report.outcome,
        AggregationOutcome::Failed {
            unsuccessful: vec!["build".to_string()],
            total: 1,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn latest_rerun_decides_the_verdict() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        success(5, "test"),
        CheckRun::new(9, "test").completed(CheckConclusion::Failure),
    ]));

    let report = aggregator(config(), &host).run().await.unwrap();

    assert_eq!(
        report.outcome,
        AggregationOutcome::Failed {
            unsuccessful: vec!["test".to_string()],
            total: 1,
        }
    );
    assert_eq!(report.outcome.status_line(), "1/1 checks failed: test");
    assert_eq!(report.unsuccessful_checks[0].id, 9);
}

#[tokio::test(start_paused = true)]
async fn in_progress_check_waits_one_poll_interval() {
    let host = Arc::new(MemoryCiHost::new());
    host.push_snapshot(vec![success(1, "lint"), CheckRun::new(2, "build").in_progress()]);
    host.push_snapshot(vec![success(1, "lint"), success(2, "build")]);
    let outputs = Arc::new(MemoryOutputs::new());

    let started = tokio::time::Instant::now();
    let report = aggregator(config(), &host)
        .with_output(outputs.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 2 });
    assert_eq!(started.elapsed(), Duration::from_secs(10));

    let reports = outputs.reports();
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].outcome.status_line(), "1/2 waiting for: build");
    assert_eq!(
        reports[1].outcome,
        AggregationOutcome::Grace {
            total: 2,
            delay_secs: 0
        }
    );
}

#[tokio::test(start_paused = true)]
async fn grace_window_picks_up_late_checks() {
    let host = Arc::new(MemoryCiHost::new());
    host.push_snapshot(Vec::new());
    host.push_snapshot(vec![success(3, "late")]);
    let mut config = config();
    config.timing.initial_grace_delay = Duration::from_secs(30);
    let outputs = Arc::new(MemoryOutputs::new());

    let started = tokio::time::Instant::now();
    let report = aggregator(config, &host)
        .with_output(outputs.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(
        outputs.reports()[0].outcome,
        AggregationOutcome::Grace {
            total: 0,
            delay_secs: 30
        }
    );
    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 1 });
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn grace_is_one_shot_until_something_is_incomplete() {
    let host = Arc::new(MemoryCiHost::new());
    host.push_snapshot(Vec::new());
    host.push_snapshot(vec![CheckRun::new(1, "build").in_progress()]);
    host.push_snapshot(vec![success(1, "build")]);
    let mut config = config();
    config.timing.initial_grace_delay = Duration::from_secs(5);
    let outputs = Arc::new(MemoryOutputs::new());

    aggregator(config, &host)
        .with_output(outputs.clone())
        .run()
        .await
        .unwrap();

    let states: Vec<String> = outputs
        .reports()
        .iter()
        .map(|r| r.outcome.status_line())
        .collect();
    assert_eq!(
        states,
        vec![
            "0/0 checks completed, waiting 5s for late checks",
            "0/1 waiting for: build",
            "1/1 checks completed, waiting 5s for late checks",
            "1/1 checks completed successfully",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn event_scope_excludes_pull_request_runs() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        CheckRun::new(1, "pr-build")
            .completed(CheckConclusion::Failure)
            .with_html_url(job_url(10, 1)),
        success(2, "push-build").with_html_url(job_url(11, 2)),
    ]));
    host.add_run(WorkflowRun {
        id: 10,
        event: "pull_request".to_string(),
    });
    host.add_run(WorkflowRun {
        id: 11,
        event: "push".to_string(),
    });
    let mut config = config();
    config.events = PatternSet::compile(&["push"]).unwrap();

    let report = aggregator(config, &host).run().await.unwrap();

    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 1 });
    assert_eq!(report.required_checks[0].name, "push-build");
    assert_eq!(report.all_checks.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn unresolved_run_event_keeps_check_out_of_scope() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        CheckRun::new(1, "pr-build")
            .completed(CheckConclusion::Failure)
            .with_html_url(job_url(10, 1)),
        success(2, "push-build").with_html_url(job_url(11, 2)),
    ]));
    host.fail_run_lookup(10);
    host.add_run(WorkflowRun {
        id: 11,
        event: "push".to_string(),
    });
    let mut config = config();
    config.events = PatternSet::compile(&["push"]).unwrap();

    let report = aggregator(config, &host).run().await.unwrap();

    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 1 });
    assert_eq!(report.required_checks[0].name, "push-build");
}

#[tokio::test(start_paused = true)]
async fn suppressed_failure_does_not_fail_the_aggregate() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        success(1, "build"),
        CheckRun::new(2, "e2e")
            .completed(CheckConclusion::Failure)
            .with_text(format!("retries exhausted\n{}", encode_suppression("flaky"))),
    ]));
    let mut config = config();
    config.flags = vec!["flaky".to_string()];

    let report = aggregator(config, &host).run().await.unwrap();

    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 2 });
    assert!(report.unsuccessful_checks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn self_check_is_excluded_and_updated() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        success(1, "build").with_summary("build ok\n"),
        CheckRun::new(100, "checkgroup").in_progress(),
        CheckRun::new(120, "checkgroup").in_progress(),
    ]));
    let mut config = config();
    config.self_name = Some("checkgroup".to_string());
    config.correlation = Some(Correlation {
        job_identifier: "checkgroup".to_string(),
        run_id: 4242,
    });
    let aggregator = aggregator(config, &host);

    let mut state = PollState::default();
    aggregator.tick(&mut state).await.unwrap();
    let report = aggregator.tick(&mut state).await.unwrap();

    assert_eq!(state.self_check, SelfCheck::Found(120));
    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 1 });
    assert_eq!(host.updates().len(), 2);

    let (id, update) = host.updates().pop().unwrap();
    assert_eq!(id, 120);
    assert_eq!(update.title, "1/1 checks completed successfully");
    assert_eq!(update.summary, "build ok\n");
    assert_eq!(update.text.as_deref(), Some("<!--checkgroup-4242-->"));
}

#[tokio::test(start_paused = true)]
async fn missing_self_check_is_not_fatal() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![success(1, "build")]));
    let mut config = config();
    config.self_name = Some("checkgroup".to_string());
    let aggregator = aggregator(config, &host);

    let mut state = PollState::default();
    aggregator.tick(&mut state).await.unwrap();
    let report = aggregator.tick(&mut state).await.unwrap();

    assert_eq!(state.self_check, SelfCheck::Missing);
    assert!(report.outcome.is_terminal());
    assert!(host.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn self_update_failure_is_degraded_not_fatal() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        success(1, "build"),
        CheckRun::new(2, "checkgroup").in_progress(),
    ]));
    host.fail_updates();
    let mut config = config();
    config.self_name = Some("checkgroup".to_string());

    let report = aggregator(config, &host).run().await.unwrap();
    assert_eq!(report.outcome, AggregationOutcome::Succeeded { total: 1 });
}

#[tokio::test(start_paused = true)]
async fn listing_failure_aborts() {
    let host = Arc::new(MemoryCiHost::new());
    host.fail_listing();

    let err = aggregator(config(), &host).run().await.unwrap_err();
    assert!(matches!(err, CheckGroupError::Remote { .. }));
}

#[tokio::test(start_paused = true)]
async fn duplicate_ids_abort() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        success(7, "build"),
        success(7, "lint"),
    ]));

    let err = aggregator(config(), &host).run().await.unwrap_err();
    assert!(matches!(err, CheckGroupError::DuplicateCheckRunId { id: 7, .. }));
}

#[tokio::test(start_paused = true)]
async fn max_polls_bounds_the_loop() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![CheckRun::new(1, "build").in_progress()]));
    let mut config = config();
    config.budget.max_ticks = Some(3);

    let err = aggregator(config, &host).run().await.unwrap_err();

    assert!(matches!(err, CheckGroupError::PollBudgetExhausted { ticks: 3, .. }));
    assert_eq!(host.list_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_bounds_the_loop() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![CheckRun::new(1, "build").in_progress()]));
    let mut config = config();
    config.budget.timeout = Some(Duration::from_secs(25));

    let err = aggregator(config, &host).run().await.unwrap_err();

    assert!(matches!(
        err,
        CheckGroupError::PollBudgetExhausted {
            ticks: 3,
            elapsed_secs: 30
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn same_snapshot_and_state_give_same_outcome() {
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        success(1, "build"),
        CheckRun::new(2, "test").in_progress(),
    ]));
    let aggregator = aggregator(config(), &host);

    let mut first = PollState::default();
    let mut second = first.clone();
    let a = aggregator.tick(&mut first).await.unwrap();
    let b = aggregator.tick(&mut second).await.unwrap();

    assert_eq!(a.outcome, b.outcome);
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn correlation_marker_drives_rerun() {
    let self_url = "https://api.github.com/repos/org/repo/check-runs/50";
    let host = Arc::new(MemoryCiHost::with_checks(vec![
        success(1, "build"),
        CheckRun::new(50, "checkgroup")
            .in_progress()
            .with_url(self_url),
    ]));
    host.add_jobs(
        4242,
        vec![WorkflowJob {
            id: 9001,
            name: "checkgroup".to_string(),
            status: CheckStatus::Completed,
            check_run_url: Some(self_url.to_string()),
        }],
    );
    let mut config = config();
    config.self_name = Some("checkgroup".to_string());
    config.correlation = Some(Correlation {
        job_identifier: "checkgroup".to_string(),
        run_id: 4242,
    });

    aggregator(config, &host).run().await.unwrap();
    let outcome = RerunCollaborator::new(host.clone(), host.clone(), "checkgroup")
        .rerun(REF)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RerunOutcome::Triggered {
            run_id: 4242,
            job_id: 9001
        }
    );
    assert_eq!(host.reruns(), vec![9001]);
}
