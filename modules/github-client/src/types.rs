use serde::Deserialize;

/// One pull request as returned by `GET /repos/{owner}/{repo}/pulls`.
/// Only the fields the reference search reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub title: String,
    pub body: Option<String>,
    pub html_url: String,
}
