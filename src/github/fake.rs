//! In-memory `RepositorySource` for unit tests.

use super::source::RepositorySource;
use super::types::{Branch, Commit, PullRequest, PullRequestState, Release, RepoRef};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// A repository with a single linear history, newest commit first.
#[derive(Debug, Default)]
pub struct FakeSource {
    /// `None` makes `default_branch` fail.
    pub default_branch: Option<String>,
    pub branches: Vec<Branch>,
    pub history: Vec<Commit>,
    /// Branch name to head SHA.
    pub refs: HashMap<String, String>,
    /// Tag name to commit SHA.
    pub tags: HashMap<String, String>,
    pub releases: Vec<Release>,
    pub closed_prs: Vec<PullRequest>,
    pub open_prs: Vec<PullRequest>,
    /// `None` makes `generate_release_notes` fail.
    pub notes: Option<String>,
    pub fail_commit_pages_from: Option<u32>,
    pub fail_closed_pr_pages_from: Option<u32>,
    pub fail_open_prs: bool,
    pub fail_release_pages_from: Option<u32>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    /// A repository on `main` whose history is `shas`, newest first.
    pub fn with_history(shas: &[&str]) -> Self {
        let history: Vec<Commit> = shas.iter().map(|sha| commit(sha)).collect();
        let mut refs = HashMap::new();
        if let Some(head) = history.first() {
            refs.insert("main".to_string(), head.sha.clone());
        }
        Self {
            default_branch: Some("main".to_string()),
            history,
            refs,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn resolve(&self, revision: &str) -> String {
        self.refs
            .get(revision)
            .or_else(|| self.tags.get(revision))
            .cloned()
            .unwrap_or_else(|| revision.to_string())
    }
}

/// Like GitHub, never returns more than 100 items per page.
fn paged<T: Clone>(items: &[T], per_page: u8, page: u32) -> Vec<T> {
    let per_page = usize::from(per_page.min(100));
    let start = (page as usize).saturating_sub(1) * per_page;
    items.iter().skip(start).take(per_page).cloned().collect()
}

#[async_trait]
impl RepositorySource for FakeSource {
    async fn list_branches(&self, _repo: &RepoRef) -> anyhow::Result<Vec<Branch>> {
        self.record("branches".to_string());
        Ok(self.branches.clone())
    }

    async fn default_branch(&self, _repo: &RepoRef) -> anyhow::Result<String> {
        self.record("default_branch".to_string());
        self.default_branch
            .clone()
            .ok_or_else(|| anyhow!("Not Found"))
    }

    async fn list_commits(
        &self,
        _repo: &RepoRef,
        revision: &str,
        per_page: u8,
        page: u32,
    ) -> anyhow::Result<Vec<Commit>> {
        self.record(format!("commits:{}:{}:{}", revision, per_page, page));
        if self.fail_commit_pages_from.is_some_and(|from| page >= from) {
            return Err(anyhow!("API rate limit exceeded"));
        }

        if self.history.is_empty() {
            return Ok(vec![]);
        }
        let sha = self.resolve(revision);
        let start = self
            .history
            .iter()
            .position(|c| c.sha == sha)
            .ok_or_else(|| anyhow!("No commit found for SHA: {}", revision))?;
        Ok(paged(&self.history[start..], per_page, page))
    }

    async fn list_releases(
        &self,
        _repo: &RepoRef,
        per_page: u8,
        page: u32,
    ) -> anyhow::Result<Vec<Release>> {
        self.record(format!("releases:{}", page));
        if self.fail_release_pages_from.is_some_and(|from| page >= from) {
            return Err(anyhow!("API rate limit exceeded"));
        }
        Ok(paged(&self.releases, per_page, page))
    }

    async fn resolve_tag(&self, _repo: &RepoRef, tag: &str) -> anyhow::Result<String> {
        self.record(format!("resolve_tag:{}", tag));
        self.tags
            .get(tag)
            .cloned()
            .ok_or_else(|| anyhow!("Not Found"))
    }

    async fn get_commit(&self, _repo: &RepoRef, reference: &str) -> anyhow::Result<Commit> {
        self.record(format!("get_commit:{}", reference));
        let sha = self.resolve(reference);
        self.history
            .iter()
            .find(|c| c.sha == sha)
            .cloned()
            .ok_or_else(|| anyhow!("No commit found for SHA: {}", reference))
    }

    async fn list_pull_requests(
        &self,
        _repo: &RepoRef,
        state: PullRequestState,
        per_page: u8,
        page: u32,
    ) -> anyhow::Result<Vec<PullRequest>> {
        self.record(format!("pulls:{}:{}", state.as_str(), page));
        match state {
            PullRequestState::Closed => {
                if self.fail_closed_pr_pages_from.is_some_and(|from| page >= from) {
                    return Err(anyhow!("API rate limit exceeded"));
                }
                Ok(paged(&self.closed_prs, per_page, page))
            }
            PullRequestState::Open => {
                if self.fail_open_prs {
                    return Err(anyhow!("API rate limit exceeded"));
                }
                Ok(paged(&self.open_prs, per_page, page))
            }
        }
    }

    async fn generate_release_notes(
        &self,
        _repo: &RepoRef,
        target: &str,
        previous_tag: Option<&str>,
    ) -> anyhow::Result<String> {
        self.record(format!(
            "generate:{}:{}",
            target,
            previous_tag.unwrap_or("-")
        ));
        self.notes
            .clone()
            .ok_or_else(|| anyhow!("Validation Failed"))
    }
}

pub fn repo() -> RepoRef {
    RepoRef::new("acme", "widgets")
}

/// A fixed point in time `hours` after an arbitrary epoch.
pub fn at(hours: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + hours * 3600, 0).unwrap()
}

pub fn commit(sha: &str) -> Commit {
    Commit {
        sha: sha.to_string(),
        message: format!("Commit {}", sha),
        author_name: "Ada".to_string(),
        author_date: None,
    }
}

pub fn shas(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{}", prefix, i)).collect()
}

pub fn release(tag: &str, published_hours: i64, stable: bool) -> Release {
    Release {
        tag_name: tag.to_string(),
        name: tag.to_string(),
        published_at: Some(at(published_hours)),
        prerelease: !stable,
        draft: false,
        body: String::new(),
    }
}

pub fn merged_pr(number: u64, base: &str, merged_hours: i64) -> PullRequest {
    PullRequest {
        merged_at: Some(at(merged_hours)),
        updated_at: at(merged_hours),
        ..open_pr(number, base)
    }
}

pub fn open_pr(number: u64, base: &str) -> PullRequest {
    PullRequest {
        number,
        title: format!("PR {}", number),
        author_login: "octocat".to_string(),
        author_name: "octocat".to_string(),
        created_at: at(0),
        updated_at: at(0),
        html_url: format!("https://github.com/acme/widgets/pull/{}", number),
        merged_at: None,
        base_ref: base.to_string(),
        labels: vec![],
        deployed_version: None,
    }
}
