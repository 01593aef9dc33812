//! GitHub Actions history source.

use crate::error::Result;
use crate::provider::{CiHistorySource, RunRef};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// GitHub Actions workflow-run client.
pub struct GitHubActions {
    /// Repository in `owner/repo` form.
    repo: String,
    token: String,
    /// Workflow name filter (case-insensitive substring); empty matches all.
    workflow: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunsPage {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    run_number: u64,
    #[serde(default)]
    name: String,
    head_sha: String,
    head_branch: String,
    created_at: DateTime<Utc>,
}

impl GitHubActions {
    pub fn new(repo: &str, token: &str, workflow: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("flakefinder/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            repo: repo.to_string(),
            token: token.to_string(),
            workflow: workflow.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    /// Point the client at a non-default API host (GitHub Enterprise).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn runs_url(&self) -> String {
        format!("{}/repos/{}/actions/runs", self.base_url, self.repo)
    }

    fn logs_url(&self, run_id: &str) -> String {
        format!(
            "{}/repos/{}/actions/runs/{}/logs",
            self.base_url, self.repo, run_id
        )
    }

    fn matches_workflow(&self, run_name: &str) -> bool {
        self.workflow.is_empty()
            || run_name
                .to_lowercase()
                .contains(&self.workflow.to_lowercase())
    }

    async fn try_list_runs(&self, lookback_days: i64, branch: &str) -> Result<Vec<RunRef>> {
        let since = (Utc::now() - Duration::days(lookback_days)).to_rfc3339();

        let page: WorkflowRunsPage = self
            .client
            .get(self.runs_url())
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .query(&[
                ("per_page", "100"),
                ("branch", branch),
                ("created", &format!(">={since}")),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(page
            .workflow_runs
            .into_iter()
            .filter(|run| self.matches_workflow(&run.name))
            .map(|run| RunRef {
                run_id: run.id.to_string(),
                run_number: run.run_number,
                commit_sha: run.head_sha,
                branch: run.head_branch,
                created_at: run.created_at,
            })
            .collect())
    }

    async fn try_fetch_log(&self, run_id: &str) -> Result<String> {
        let text = self
            .client
            .get(self.logs_url(run_id))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(text)
    }
}

#[async_trait]
impl CiHistorySource for GitHubActions {
    fn name(&self) -> &'static str {
        "github-actions"
    }

    async fn list_runs(&self, lookback_days: i64, git_ref: &str) -> Vec<RunRef> {
        match self.try_list_runs(lookback_days, git_ref).await {
            Ok(runs) => runs,
            Err(e) => {
                warn!(repo = %self.repo, error = %e, "Failed to fetch workflow runs");
                Vec::new()
            }
        }
    }

    async fn fetch_log(&self, run: &RunRef) -> Option<String> {
        match self.try_fetch_log(&run.run_id).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "Failed to fetch run logs");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let gh = GitHubActions::new("acme/widgets", "tok", "tests");
        assert_eq!(
            gh.runs_url(),
            "https://api.github.com/repos/acme/widgets/actions/runs"
        );
        assert_eq!(
            gh.logs_url("42"),
            "https://api.github.com/repos/acme/widgets/actions/runs/42/logs"
        );
    }

    #[test]
    fn test_custom_base_url() {
        let gh = GitHubActions::new("acme/widgets", "tok", "")
            .with_base_url("https://ghe.example.com/api/v3/");
        assert_eq!(
            gh.runs_url(),
            "https://ghe.example.com/api/v3/repos/acme/widgets/actions/runs"
        );
    }

    #[test]
    fn test_workflow_filter_case_insensitive() {
        let gh = GitHubActions::new("acme/widgets", "tok", "tests");
        assert!(gh.matches_workflow("Tests"));
        assert!(gh.matches_workflow("nightly-tests.yml"));
        assert!(!gh.matches_workflow("deploy"));
    }

    #[test]
    fn test_empty_workflow_matches_all() {
        let gh = GitHubActions::new("acme/widgets", "tok", "");
        assert!(gh.matches_workflow("anything"));
    }

    #[test]
    fn test_workflow_runs_payload_decodes() {
        let json = r#"{
            "total_count": 1,
            "workflow_runs": [{
                "id": 987654,
                "run_number": 12,
                "name": "tests",
                "head_sha": "deadbeef",
                "head_branch": "main",
                "created_at": "2024-03-01T10:30:00Z"
            }]
        }"#;

        let page: WorkflowRunsPage = serde_json::from_str(json).expect("decode");
        assert_eq!(page.workflow_runs.len(), 1);
        assert_eq!(page.workflow_runs[0].id, 987654);
        assert_eq!(page.workflow_runs[0].head_branch, "main");
    }

    #[test]
    fn test_empty_payload_decodes() {
        let page: WorkflowRunsPage = serde_json::from_str("{}").expect("decode");
        assert!(page.workflow_runs.is_empty());
    }
}
