//! checkgroup - fold sibling CI checks into one status
//!
//! ## Commands
//!
//! - `wait`: poll the checks on a ref until they settle, mirroring progress
//!   onto the caller's own check-run
//! - `flag`: mark the caller's own check-run as suppressed under a flag
//! - `rerun`: rerun the aggregator job that wrote a correlation marker
//!
//! Every option can also come from the environment, using the `INPUT_*`
//! names GitHub Actions sets for action inputs.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, Level};

use checkgroup_core::config::DEFAULT_POLL_INTERVAL_SECS;
use checkgroup_core::{
    parse_multiline, set_flag, AggregationOutcome, Aggregator, AggregatorConfig,
    AggregatorSettings, CheckRunApi, OutputSink, RerunCollaborator, StepOutputFile, WorkflowApi,
};
use checkgroup_github::{GithubClient, GithubConfig, RepoRef, DEFAULT_API_URL};

#[derive(Parser)]
#[command(name = "checkgroup")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Aggregate sibling CI check-runs into one status", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for the required checks on a ref and report the combined result
    Wait(WaitArgs),

    /// Suppress the caller's own check under a flag
    Flag(FlagArgs),

    /// Rerun the aggregator job behind a correlation marker
    Rerun(RerunArgs),
}

/// Where and as whom to talk to GitHub.
#[derive(Args, Debug, Clone)]
struct GithubArgs {
    /// API token
    #[arg(long, env = "INPUT_GITHUBTOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Repository as owner/name
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Commit SHA, branch or tag whose checks are read
    #[arg(long = "ref", env = "INPUT_REF")]
    git_ref: String,
}

impl GithubArgs {
    fn client(&self) -> Result<Arc<GithubClient>> {
        let token = match &self.github_token {
            Some(token) => token.clone(),
            None => std::env::var("GITHUB_TOKEN")
                .context("no token given; set --github-token or GITHUB_TOKEN")?,
        };
        let repository = RepoRef::parse(&self.repository)?;
        let config = GithubConfig::new(repository, token).with_api_url(self.api_url.clone());
        let client = GithubClient::new(config).context("Failed to create GitHub client")?;
        Ok(Arc::new(client))
    }
}

#[derive(Args, Debug, Clone)]
struct WaitArgs {
    #[command(flatten)]
    github: GithubArgs,

    /// Check-name patterns to require, one per line (anchored regexes)
    #[arg(long, env = "INPUT_CHECKS", default_value = ".*")]
    checks: String,

    /// Check-name patterns to ignore, one per line; beats `--checks`
    #[arg(long, env = "INPUT_EXCLUDEDCHECKS", default_value = "")]
    excluded_checks: String,

    /// Name of this job's own check-run
    #[arg(long = "self", env = "INPUT_SELF")]
    self_name: Option<String>,

    /// Acceptable conclusions, one per line (`none` for no conclusion)
    #[arg(long, env = "INPUT_REQUIREDSTATUS", default_value = "success")]
    required_status: String,

    /// Grace delay when no required check is incomplete on the first look
    #[arg(long, env = "INPUT_INITIALDELAYSECONDS", default_value_t = 0)]
    initial_delay_seconds: u64,

    /// Pause between polls while checks are running
    #[arg(long, env = "INPUT_POLLINTERVALSECONDS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval_seconds: u64,

    /// Prefix of the correlation marker written onto the self check
    #[arg(long, env = "INPUT_JOBIDENTIFIER")]
    job_identifier: Option<String>,

    /// Id of the workflow run executing this command
    #[arg(long, env = "GITHUB_RUN_ID")]
    run_id: Option<u64>,

    /// Suppression flags to honour, one per line
    #[arg(long, env = "INPUT_FLAGS", default_value = "")]
    flags: String,

    /// Minimum number of required checks for the grace window
    #[arg(long, env = "INPUT_REQUIREDMINIMUM", default_value_t = 0)]
    required_minimum: u32,

    /// Trigger-event patterns, one per line; only checks from matching runs count
    #[arg(long, env = "INPUT_EVENTS", default_value = "")]
    events: String,

    /// Give up after this many polls
    #[arg(long, env = "INPUT_MAXPOLLS")]
    max_polls: Option<u32>,

    /// Give up after this many seconds
    #[arg(long, env = "INPUT_TIMEOUTSECONDS")]
    timeout_seconds: Option<u64>,
}

impl WaitArgs {
    fn settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            git_ref: self.github.git_ref.clone(),
            checks: parse_multiline(&self.checks),
            excluded_checks: parse_multiline(&self.excluded_checks),
            self_name: self.self_name.clone(),
            required_status: parse_multiline(&self.required_status),
            initial_delay_secs: self.initial_delay_seconds,
            poll_interval_secs: Some(self.poll_interval_seconds),
            job_identifier: self.job_identifier.clone(),
            run_id: self.run_id,
            flags: parse_multiline(&self.flags),
            required_minimum: self.required_minimum,
            events: parse_multiline(&self.events),
            max_polls: self.max_polls,
            timeout_secs: self.timeout_seconds,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct FlagArgs {
    #[command(flatten)]
    github: GithubArgs,

    /// Name of the check-run to flag
    #[arg(long = "self", env = "INPUT_SELF")]
    self_name: String,

    /// Flag to set
    #[arg(long, env = "INPUT_FLAG")]
    flag: String,
}

#[derive(Args, Debug, Clone)]
struct RerunArgs {
    #[command(flatten)]
    github: GithubArgs,

    /// Prefix of the correlation marker to look for
    #[arg(long, env = "INPUT_JOBIDENTIFIER")]
    job_identifier: String,

    /// Fail on remote errors instead of ignoring them
    #[arg(long, env = "INPUT_STRICT")]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    checkgroup_core::telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Wait(args) => {
            let config = args
                .settings()
                .compile()
                .context("Invalid wait configuration")?;
            let client = args.github.client()?;
            let outputs = StepOutputFile::from_env().map(|sink| Arc::new(sink) as Arc<dyn OutputSink>);
            let status = cmd_wait(config, client.clone(), client, outputs).await?;
            println!("{status}");
            Ok(())
        }
        Commands::Flag(args) => {
            let client = args.github.client()?;
            cmd_flag(
                client.as_ref(),
                &args.github.git_ref,
                &args.self_name,
                &args.flag,
            )
            .await
        }
        Commands::Rerun(args) => {
            let client = args.github.client()?;
            cmd_rerun(
                client.clone(),
                client,
                &args.github.git_ref,
                &args.job_identifier,
                args.strict,
            )
            .await
        }
    }
}

/// Poll until terminal. Returns the success status line; a failed
/// aggregate is an error carrying the failure line.
async fn cmd_wait(
    config: AggregatorConfig,
    checks: Arc<dyn CheckRunApi>,
    workflows: Arc<dyn WorkflowApi>,
    outputs: Option<Arc<dyn OutputSink>>,
) -> Result<String> {
    let mut aggregator = Aggregator::new(config, checks, workflows);
    if let Some(sink) = outputs {
        aggregator = aggregator.with_output(sink);
    }

    let report = aggregator
        .run()
        .await
        .context("Check aggregation did not finish")?;
    match report.outcome {
        AggregationOutcome::Failed { .. } => anyhow::bail!(report.outcome.status_line()),
        outcome => Ok(outcome.status_line()),
    }
}

async fn cmd_flag(checks: &dyn CheckRunApi, git_ref: &str, self_name: &str, flag: &str) -> Result<()> {
    let id = set_flag(checks, git_ref, self_name, flag)
        .await
        .with_context(|| format!("Couldn't flag self check: {self_name}"))?;
    println!("Flagged check run {id} with '{flag}'");
    Ok(())
}

async fn cmd_rerun(
    checks: Arc<dyn CheckRunApi>,
    workflows: Arc<dyn WorkflowApi>,
    git_ref: &str,
    job_identifier: &str,
    strict: bool,
) -> Result<()> {
    let outcome = RerunCollaborator::new(checks, workflows, job_identifier)
        .strict(strict)
        .rerun(git_ref)
        .await
        .context("Rerun failed")?;
    info!(?outcome, "rerun finished");
    Ok(())
}
