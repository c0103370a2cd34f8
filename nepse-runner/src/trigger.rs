//! Dispatch of the GitHub Actions workflows that refresh the published data.
//!
//! Each workflow may be dispatched at most once per cooldown window. The
//! window is measured from the workflow's most recent run as reported by
//! the API, so no local state is kept. If the run history cannot be read
//! the dispatch goes ahead.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{HttpConfig, TriggerConfig};
use crate::source::http_client;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("API token not set (expected in ${env})")]
    MissingToken { env: String },

    #[error(
        "workflow '{job}' last ran {elapsed_hours:.1}h ago, retry in {}h {}m",
        .retry_after.num_hours(),
        .retry_after.num_minutes() % 60
    )]
    RateLimited {
        job: String,
        elapsed_hours: f64,
        retry_after: Duration,
    },

    #[error("dispatch of '{job}' rejected with HTTP {status}: {body}")]
    Rejected { job: String, status: u16, body: String },

    #[error("request for '{job}' failed: {reason}")]
    Network { job: String, reason: String },

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// The most recent run is still inside the cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownActive {
    pub elapsed: Duration,
    pub retry_after: Duration,
}

/// Decide whether a job last run at `last_run` may be dispatched at `now`.
///
/// A job with no recorded run is always allowed. A run timestamp in the
/// future counts as zero elapsed time.
pub fn check_cooldown(
    last_run: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> Result<(), CooldownActive> {
    let Some(last) = last_run else {
        return Ok(());
    };
    let elapsed = now.signed_duration_since(last).max(Duration::zero());
    if elapsed < cooldown {
        Err(CooldownActive {
            elapsed,
            retry_after: cooldown - elapsed,
        })
    } else {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RunsResponse {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    created_at: DateTime<Utc>,
}

/// Client for the workflow dispatch endpoints of one repository.
pub struct WorkflowTrigger {
    client: reqwest::blocking::Client,
    config: TriggerConfig,
    token: String,
}

impl WorkflowTrigger {
    pub fn new(client: reqwest::blocking::Client, config: TriggerConfig, token: impl Into<String>) -> Self {
        Self {
            client,
            config,
            token: token.into(),
        }
    }

    /// Build a trigger whose token is read from `config.token_env`.
    pub fn from_config(config: &TriggerConfig, http: &HttpConfig) -> Result<Self, TriggerError> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| TriggerError::MissingToken {
                env: config.token_env.clone(),
            })?;
        let client = http_client(http).map_err(|e| TriggerError::Client(e.to_string()))?;
        Ok(Self::new(client, config.clone(), token))
    }

    fn workflow_url(&self, workflow: &str) -> String {
        format!(
            "{}/repos/{}/{}/actions/workflows/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            workflow
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Creation time of the workflow's most recent run.
    pub fn last_run(&self, workflow: &str) -> Result<Option<DateTime<Utc>>, TriggerError> {
        let url = format!("{}/runs?per_page=1", self.workflow_url(workflow));
        let network = |e: reqwest::Error| TriggerError::Network {
            job: workflow.to_string(),
            reason: e.to_string(),
        };

        let resp = self.request(reqwest::Method::GET, &url).send().map_err(network)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TriggerError::Rejected {
                job: workflow.to_string(),
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }
        let runs: RunsResponse = resp.json().map_err(network)?;
        Ok(runs.workflow_runs.into_iter().next().map(|r| r.created_at))
    }

    /// Dispatch `workflow` unless it ran within the cooldown window.
    pub fn trigger(&self, workflow: &str, now: DateTime<Utc>) -> Result<(), TriggerError> {
        let cooldown = Duration::hours(self.config.cooldown_hours);

        match self.last_run(workflow) {
            Ok(last_run) => {
                check_cooldown(last_run, now, cooldown).map_err(|c| TriggerError::RateLimited {
                    job: workflow.to_string(),
                    elapsed_hours: c.elapsed.num_seconds() as f64 / 3600.0,
                    retry_after: c.retry_after,
                })?;
            }
            Err(e) => warn!(workflow, error = %e, "cannot read run history, dispatching anyway"),
        }

        let url = format!("{}/dispatches", self.workflow_url(workflow));
        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&serde_json::json!({ "ref": self.config.git_ref }))
            .send()
            .map_err(|e| TriggerError::Network {
                job: workflow.to_string(),
                reason: e.to_string(),
            })?;

        if resp.status() != reqwest::StatusCode::NO_CONTENT {
            return Err(TriggerError::Rejected {
                job: workflow.to_string(),
                status: resp.status().as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }

        info!(workflow, git_ref = %self.config.git_ref, "workflow dispatched");
        Ok(())
    }

    /// Dispatch each workflow in turn; one outcome per workflow.
    pub fn trigger_all(
        &self,
        workflows: &[String],
        now: DateTime<Utc>,
    ) -> Vec<(String, Result<(), TriggerError>)> {
        workflows
            .iter()
            .map(|w| (w.clone(), self.trigger(w, now)))
            .collect()
    }
}
