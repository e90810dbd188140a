//! Commit-to-pull-request lookup against the GitHub REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::event::{BaseBranch, HeadBranch};

const GITHUB_API_BASE: &str = "https://api.github.com";

/// A pull request as returned by
/// `GET /repos/{owner}/{repo}/commits/{sha}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssociatedPullRequest {
    pub number: u64,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub base: BaseBranch,
    pub head: HeadBranch,
}

/// Resolves a commit SHA to the pull requests it belongs to.
///
/// The deployment-status path is the only consumer. Behind a trait so tests
/// can substitute a canned response without touching the network.
#[async_trait]
pub trait CommitPullRequestLookup: Send + Sync {
    async fn pull_requests_for_commit(&self, sha: &str) -> Result<Vec<AssociatedPullRequest>>;
}

/// GitHub REST API client scoped to one repository.
pub struct GithubApiClient {
    http: reqwest::Client,
    token: Option<String>,
    repository: String,
}

impl GithubApiClient {
    /// `repository` is the "owner/name" full name; the token may be absent for
    /// pull-request triggers, which never perform a lookup.
    pub fn new(token: Option<String>, repository: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            http,
            token,
            repository,
        })
    }
}

#[async_trait]
impl CommitPullRequestLookup for GithubApiClient {
    async fn pull_requests_for_commit(&self, sha: &str) -> Result<Vec<AssociatedPullRequest>> {
        let url = format!(
            "{GITHUB_API_BASE}/repos/{}/commits/{}/pulls",
            self.repository, sha
        );

        let mut request = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let pull_requests = request
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<AssociatedPullRequest>>()
            .await?;
        Ok(pull_requests)
    }
}
