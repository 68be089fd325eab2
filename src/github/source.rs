//! Repository data source trait
//!
//! Everything the analyzer needs from the remote side goes through
//! `RepositorySource`. `GitHubClient` talks to the GitHub REST API; tests
//! substitute an in-memory implementation.

use super::types::{Branch, Commit, PullRequest, PullRequestState, Release, RepoRef};
use async_trait::async_trait;

/// Read-only access to a hosted repository.
///
/// Paged methods take a 1-based `page` and return an empty list once the
/// listing is exhausted. Implementations must be `Send + Sync` so one
/// instance can serve concurrent analyses.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// List the repository's branches.
    async fn list_branches(&self, repo: &RepoRef) -> anyhow::Result<Vec<Branch>>;

    /// Name of the repository's default branch.
    async fn default_branch(&self, repo: &RepoRef) -> anyhow::Result<String>;

    /// Commits reachable from `revision` (SHA, branch or tag), newest first.
    async fn list_commits(
        &self,
        repo: &RepoRef,
        revision: &str,
        per_page: u8,
        page: u32,
    ) -> anyhow::Result<Vec<Commit>>;

    /// One page of releases, in the order the host lists them.
    async fn list_releases(
        &self,
        repo: &RepoRef,
        per_page: u8,
        page: u32,
    ) -> anyhow::Result<Vec<Release>>;

    /// Resolve a tag name to the SHA of the commit it ultimately points at.
    ///
    /// Annotated tags point at a tag object first; implementations must
    /// dereference until they reach a commit.
    async fn resolve_tag(&self, repo: &RepoRef, tag: &str) -> anyhow::Result<String>;

    /// Fetch a single commit by SHA or ref name.
    async fn get_commit(&self, repo: &RepoRef, reference: &str) -> anyhow::Result<Commit>;

    /// One page of pull requests in `state`, most recently updated first.
    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        state: PullRequestState,
        per_page: u8,
        page: u32,
    ) -> anyhow::Result<Vec<PullRequest>>;

    /// Generate release-note markdown for `target`, optionally relative to
    /// `previous_tag`.
    async fn generate_release_notes(
        &self,
        repo: &RepoRef,
        target: &str,
        previous_tag: Option<&str>,
    ) -> anyhow::Result<String>;
}
