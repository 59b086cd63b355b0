pub mod error;
pub mod types;

use std::time::Duration;

pub use error::{GithubError, Result};
pub use types::PullRequest;

const BASE_URL: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
}

impl GithubClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the client at a different API root. Used by tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("vulnwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client construction only fails on invalid TLS config");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// List pull requests of a repository, newest first.
    /// `state` is one of "open", "closed", "all".
    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<PullRequest>> {
        let url = format!("{}/repos/{owner}/{repo}/pulls", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .query(&[
                ("state", state),
                ("sort", "created"),
                ("direction", "desc"),
                ("page", &page.to_string()),
                ("per_page", &per_page.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GithubError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(resp.json().await?)
    }
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}
