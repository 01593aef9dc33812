//! GitLab CI history source.
//!
//! Unlike GitHub Actions, logs hang off individual jobs: listing a
//! pipeline's jobs and picking the test job is part of the log fetch.

use crate::error::Result;
use crate::provider::{CiHistorySource, RunRef};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_GITLAB_URL: &str = "https://gitlab.com";

/// GitLab CI pipeline client.
pub struct GitLabCi {
    /// Project ID or URL-encoded `namespace%2Fproject`.
    project_id: String,
    token: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct Pipeline {
    id: u64,
    sha: String,
    #[serde(rename = "ref")]
    git_ref: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: u64,
    name: String,
}

impl GitLabCi {
    pub fn new(project_id: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("flakefinder/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            project_id: project_id.to_string(),
            token: token.to_string(),
            base_url: format!("{DEFAULT_GITLAB_URL}/api/v4"),
            client,
        }
    }

    /// Point the client at a self-hosted GitLab instance.
    pub fn with_instance_url(mut self, url: &str) -> Self {
        self.base_url = format!("{}/api/v4", url.trim_end_matches('/'));
        self
    }

    fn pipelines_url(&self) -> String {
        format!("{}/projects/{}/pipelines", self.base_url, self.project_id)
    }

    fn jobs_url(&self, pipeline_id: &str) -> String {
        format!(
            "{}/projects/{}/pipelines/{}/jobs",
            self.base_url, self.project_id, pipeline_id
        )
    }

    fn trace_url(&self, job_id: u64) -> String {
        format!(
            "{}/projects/{}/jobs/{}/trace",
            self.base_url, self.project_id, job_id
        )
    }

    async fn try_list_pipelines(&self, lookback_days: i64, git_ref: &str) -> Result<Vec<RunRef>> {
        let since = (Utc::now() - Duration::days(lookback_days)).to_rfc3339();

        let pipelines: Vec<Pipeline> = self
            .client
            .get(self.pipelines_url())
            .header("PRIVATE-TOKEN", &self.token)
            .query(&[
                ("per_page", "100"),
                ("ref", git_ref),
                ("updated_after", &since),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(pipelines
            .into_iter()
            .map(|p| RunRef {
                run_id: p.id.to_string(),
                run_number: p.id,
                commit_sha: p.sha,
                branch: p.git_ref,
                created_at: p.created_at,
            })
            .collect())
    }

    async fn try_fetch_jobs(&self, pipeline_id: &str) -> Result<Vec<Job>> {
        let jobs = self
            .client
            .get(self.jobs_url(pipeline_id))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(jobs)
    }

    async fn try_fetch_trace(&self, job_id: u64) -> Result<String> {
        let text = self
            .client
            .get(self.trace_url(job_id))
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(text)
    }
}

/// Pick the job whose name looks like the test job.
fn find_test_job(jobs: &[Job]) -> Option<&Job> {
    jobs.iter().find(|j| j.name.to_lowercase().contains("test"))
}

#[async_trait]
impl CiHistorySource for GitLabCi {
    fn name(&self) -> &'static str {
        "gitlab-ci"
    }

    async fn list_runs(&self, lookback_days: i64, git_ref: &str) -> Vec<RunRef> {
        match self.try_list_pipelines(lookback_days, git_ref).await {
            Ok(pipelines) => pipelines,
            Err(e) => {
                warn!(project = %self.project_id, error = %e, "Failed to fetch pipelines");
                Vec::new()
            }
        }
    }

    async fn fetch_log(&self, run: &RunRef) -> Option<String> {
        let jobs = match self.try_fetch_jobs(&run.run_id).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!(pipeline_id = %run.run_id, error = %e, "Failed to fetch jobs");
                return None;
            }
        };

        let Some(test_job) = find_test_job(&jobs) else {
            debug!(pipeline_id = %run.run_id, "No test job in pipeline");
            return None;
        };

        match self.try_fetch_trace(test_job.id).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(job_id = test_job.id, error = %e, "Failed to fetch job trace");
                None
            }
        }
    }
}
