//! Tick-scoped pull-request cache for reference enrichment.
//!
//! The watcher constructs a fresh cache at the start of every tick and drops
//! it at the end, so the pull-request listing is fetched at most once per
//! tick. A failed fetch is not cached; the next CVE-bearing record in the
//! same tick simply retries.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use github_client::{GithubClient, PullRequest};

/// Repository searched for CVE-referencing pull requests.
pub const ENRICHMENT_REPO: (&str, &str) = ("projectdiscovery", "nuclei-templates");

const PR_PAGE_SIZE: usize = 100;

/// The one query the engine issues against the pull-request service.
#[async_trait]
pub trait PullRequestLister: Send + Sync {
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<PullRequest>>;
}

#[async_trait]
impl PullRequestLister for GithubClient {
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<PullRequest>> {
        Ok(GithubClient::list_pull_requests(self, owner, repo, state, page, per_page).await?)
    }
}

#[derive(Default)]
pub struct ReferenceCache {
    prs: Option<Vec<PullRequest>>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self { prs: None }
    }

    /// URLs of pull requests whose title or body mentions `cve` as a whole
    /// word. Populates the cache on first use.
    pub async fn links_for(
        &mut self,
        lister: &dyn PullRequestLister,
        cve: &str,
    ) -> Result<Vec<String>> {
        let prs = match self.prs.as_ref() {
            Some(prs) => prs,
            None => {
                let (owner, repo) = ENRICHMENT_REPO;
                let fetched = lister
                    .list_pull_requests(owner, repo, "all", 1, PR_PAGE_SIZE)
                    .await?;
                info!(count = fetched.len(), "Cached pull requests for reference search");
                &*self.prs.insert(fetched)
            }
        };

        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(cve)))?;
        Ok(prs
            .iter()
            .filter(|pr| {
                pattern.is_match(&pr.title)
                    || pr.body.as_deref().is_some_and(|body| pattern.is_match(body))
            })
            .map(|pr| pr.html_url.clone())
            .collect())
    }
}
