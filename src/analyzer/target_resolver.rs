use tracing::{debug, info, warn};

use super::error::AnalysisError;
use crate::config::AnalysisLimits;
use crate::github::{RepoRef, RepositorySource};

/// Where history walking starts and which branch PRs must target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// SHA or ref name to walk history from.
    pub revision: String,
    pub effective_branch: String,
}

pub struct TargetResolver<'a, S: RepositorySource + ?Sized> {
    source: &'a S,
    limits: &'a AnalysisLimits,
}

impl<'a, S: RepositorySource + ?Sized> TargetResolver<'a, S> {
    pub fn new(source: &'a S, limits: &'a AnalysisLimits) -> Self {
        Self { source, limits }
    }

    pub async fn resolve(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        tag: Option<&str>,
    ) -> Result<Target, AnalysisError> {
        match (tag, branch) {
            (Some(tag), Some(branch)) => Ok(Target {
                revision: self.revision_for_tag(repo, tag).await,
                effective_branch: branch.to_string(),
            }),
            (Some(tag), None) => {
                let (revision, default_branch) = tokio::join!(
                    self.revision_for_tag(repo, tag),
                    self.default_branch(repo)
                );
                Ok(Target {
                    revision,
                    effective_branch: default_branch?,
                })
            }
            (None, Some(branch)) => Ok(Target {
                revision: branch.to_string(),
                effective_branch: branch.to_string(),
            }),
            (None, None) => {
                let default_branch = self.default_branch(repo).await?;
                Ok(Target {
                    revision: default_branch.clone(),
                    effective_branch: default_branch,
                })
            }
        }
    }

    async fn default_branch(&self, repo: &RepoRef) -> Result<String, AnalysisError> {
        self.source
            .default_branch(repo)
            .await
            .map_err(|source| AnalysisError::DefaultBranch {
                repo: repo.to_string(),
                source,
            })
    }

    /// The commit just before the tagged one, so the analysis shows what
    /// went into the release rather than starting at the release itself.
    async fn revision_for_tag(&self, repo: &RepoRef, tag: &str) -> String {
        let tagged_sha = match self.source.resolve_tag(repo, tag).await {
            Ok(sha) => sha,
            Err(e) => {
                warn!("Could not resolve tag {}, using it as a ref: {:#}", tag, e);
                return tag.to_string();
            }
        };
        debug!("Tag {} points at {}", tag, tagged_sha);

        let commits = match self
            .source
            .list_commits(repo, &tagged_sha, self.limits.tag_lookahead, 1)
            .await
        {
            Ok(commits) => commits,
            Err(e) => {
                warn!("Could not list commits before tag {}: {:#}", tag, e);
                return tagged_sha;
            }
        };

        match commits.iter().position(|c| c.sha == tagged_sha) {
            Some(idx) if idx + 1 < commits.len() => {
                let parent = commits[idx + 1].sha.clone();
                info!("Using commit {} before tagged commit {}", parent, tagged_sha);
                parent
            }
            _ => {
                info!("Using tagged commit {} (no earlier commit found)", tagged_sha);
                tagged_sha
            }
        }
    }
}
