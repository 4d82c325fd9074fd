//! reqwest-backed implementation of the check-run and workflow ports.

use std::time::Duration;

use async_trait::async_trait;
use checkgroup_core::{
    CheckRun, CheckRunApi, CheckRunUpdate, WorkflowApi, WorkflowJob, WorkflowRun,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{GithubConfig, RepoRef};
use crate::error::{GithubError, Result};

const PER_PAGE: usize = 100;
const API_VERSION: &str = "2022-11-28";
/// Header carrying the zero-based attempt number of a request.
pub const RETRY_ATTEMPT_HEADER: &str = "x-checkgroup-retry-attempt";
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 800;

#[derive(Deserialize)]
struct CheckRunsPage {
    check_runs: Vec<CheckRun>,
}

#[derive(Deserialize)]
struct JobsPage {
    jobs: Vec<WorkflowJob>,
}

/// GitHub REST client bound to one repository.
#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: Url,
    repo: RepoRef,
    retry_max_attempts: u32,
    retry_base_delay: Duration,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("checkgroup/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| GithubError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout.max(Duration::from_millis(1)))
            .build()
            .map_err(GithubError::Client)?;

        let api_url = Url::parse(config.api_url.trim()).map_err(|e| GithubError::InvalidApiUrl {
            url: config.api_url.clone(),
            reason: e.to_string(),
        })?;
        if api_url.cannot_be_a_base() {
            return Err(GithubError::InvalidApiUrl {
                url: config.api_url,
                reason: "not a base url".to_string(),
            });
        }

        Ok(Self {
            http,
            api_url,
            repo: config.repository,
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay: config.retry_base_delay,
        })
    }

    pub fn repository(&self) -> &RepoRef {
        &self.repo
    }

    /// `{api_url}/repos/{owner}/{name}/{segments...}`, each segment escaped.
    fn repo_url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()])
                .extend(segments);
        }
        url
    }

    pub async fn list_check_runs(&self, git_ref: &str) -> Result<Vec<CheckRun>> {
        let url = self.repo_url(&["commits", git_ref, "check-runs"]);
        self.get_all_pages("list check runs", &url, &[("filter", "all")], |page: CheckRunsPage| {
            page.check_runs
        })
        .await
    }

    pub async fn update_check_run(&self, check_run_id: u64, update: &CheckRunUpdate) -> Result<()> {
        let url = self.repo_url(&["check-runs", &check_run_id.to_string()]);
        let mut output = json!({ "title": update.title, "summary": update.summary });
        if let Some(text) = &update.text {
            output["text"] = json!(text);
        }
        let body = json!({ "output": output });
        self.send("update check run", || self.http.patch(url.clone()).json(&body))
            .await?;
        Ok(())
    }

    pub async fn get_workflow_run(&self, run_id: u64) -> Result<WorkflowRun> {
        let url = self.repo_url(&["actions", "runs", &run_id.to_string()]);
        self.request_json("get workflow run", || self.http.get(url.clone()))
            .await
    }

    pub async fn list_workflow_jobs(&self, run_id: u64) -> Result<Vec<WorkflowJob>> {
        let url = self.repo_url(&["actions", "runs", &run_id.to_string(), "jobs"]);
        self.get_all_pages("list workflow jobs", &url, &[], |page: JobsPage| page.jobs)
            .await
    }

    pub async fn rerun_workflow_job(&self, job_id: u64) -> Result<()> {
        let url = self.repo_url(&["actions", "jobs", &job_id.to_string(), "rerun"]);
        self.send("rerun workflow job", || self.http.post(url.clone()))
            .await?;
        Ok(())
    }

    async fn get_all_pages<W, T, F>(
        &self,
        operation: &str,
        url: &Url,
        query: &[(&str, &str)],
        items: F,
    ) -> Result<Vec<T>>
    where
        W: DeserializeOwned,
        F: Fn(W) -> Vec<T>,
    {
        let per_page = PER_PAGE.to_string();
        let mut page = 1_u32;
        let mut rows = Vec::new();
        loop {
            let page_number = page.to_string();
            let chunk: W = self
                .request_json(operation, || {
                    self.http.get(url.clone()).query(query).query(&[
                        ("per_page", per_page.as_str()),
                        ("page", page_number.as_str()),
                    ])
                })
                .await?;
            let chunk = items(chunk);
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PER_PAGE {
                break;
            }
            page = page.saturating_add(1);
        }
        debug!(operation, count = rows.len(), pages = page, "fetched all pages");
        Ok(rows)
    }

    async fn request_json<T, F>(&self, operation: &str, request_builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> RequestBuilder,
    {
        let response = self.send(operation, request_builder).await?;
        response.json::<T>().await.map_err(|source| GithubError::Decode {
            operation: operation.to_string(),
            source,
        })
    }

    /// Send with bounded retries on rate limits, server errors and
    /// transport failures.
    async fn send<F>(&self, operation: &str, mut request_builder: F) -> Result<Response>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0_u32;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header(RETRY_ATTEMPT_HEADER, (attempt - 1).to_string())
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_status(status) {
                        let delay = retry_delay(self.retry_base_delay, attempt, retry_after);
                        warn!(operation, status, attempt, ?delay, "retrying github request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(GithubError::Status {
                        operation: operation.to_string(),
                        status,
                        body: truncate_for_error(&body, MAX_ERROR_BODY_CHARS),
                    });
                }
                Err(source) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport(&source) {
                        let delay = retry_delay(self.retry_base_delay, attempt, None);
                        warn!(operation, attempt, error = %source, "retrying github request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(GithubError::Transport {
                        operation: operation.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

fn is_retryable_transport(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Exponential backoff from `base`, or the server's `Retry-After`, capped.
fn retry_delay(base: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    let delay = retry_after.unwrap_or_else(|| {
        let exponent = attempt.saturating_sub(1).min(16);
        base.saturating_mul(1_u32 << exponent)
    });
    delay.min(MAX_RETRY_DELAY)
}

fn truncate_for_error(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[async_trait]
impl CheckRunApi for GithubClient {
    async fn list_for_ref(&self, git_ref: &str) -> checkgroup_core::Result<Vec<CheckRun>> {
        Ok(self.list_check_runs(git_ref).await?)
    }

    async fn update(&self, check_run_id: u64, update: &CheckRunUpdate) -> checkgroup_core::Result<()> {
        Ok(self.update_check_run(check_run_id, update).await?)
    }
}

#[async_trait]
impl WorkflowApi for GithubClient {
    async fn get_run(&self, run_id: u64) -> checkgroup_core::Result<WorkflowRun> {
        Ok(self.get_workflow_run(run_id).await?)
    }

    async fn list_jobs(&self, run_id: u64) -> checkgroup_core::Result<Vec<WorkflowJob>> {
        Ok(self.list_workflow_jobs(run_id).await?)
    }

    async fn rerun_job(&self, job_id: u64) -> checkgroup_core::Result<()> {
        Ok(self.rerun_workflow_job(job_id).await?)
    }
}
