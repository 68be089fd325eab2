pub mod client;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::GitHubClient;
pub use source::RepositorySource;
pub use types::{Branch, Commit, Label, PullRequest, PullRequestState, Release, RepoRef};
