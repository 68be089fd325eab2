use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::AnalysisError;
use super::release_index::ReleaseIndex;
use crate::config::AnalysisLimits;
use crate::github::{Commit, Release, RepoRef, RepositorySource};

/// Progress of a paged scan. Every scan starts in `Scanning` and ends in
/// exactly one of the other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Scanning,
    /// Hit the stable-release (or merge date) boundary.
    BoundaryFound,
    /// Stopped at a count or page limit.
    CapReached,
    /// Ran out of data, or a later page failed.
    Exhausted,
}

/// Commits from the target back to (and including) the deployment boundary.
#[derive(Debug, Clone)]
pub struct CommitWindow {
    pub commits: Vec<Commit>,
    pub last_stable_release: Option<Release>,
    pub stop: ScanState,
}

pub struct HistoryWalker<'a, S: RepositorySource + ?Sized> {
    source: &'a S,
    limits: &'a AnalysisLimits,
}

impl<'a, S: RepositorySource + ?Sized> HistoryWalker<'a, S> {
    pub fn new(source: &'a S, limits: &'a AnalysisLimits) -> Self {
        Self { source, limits }
    }

    pub async fn walk(
        &self,
        repo: &RepoRef,
        revision: &str,
        index: &ReleaseIndex,
    ) -> Result<CommitWindow, AnalysisError> {
        let mut window = CommitWindow {
            commits: Vec::new(),
            last_stable_release: None,
            stop: ScanState::Scanning,
        };
        let page_size = self.limits.commit_page_size;
        let mut page = 1u32;

        info!("Walking commit history from {}", revision);

        while window.stop == ScanState::Scanning {
            let commits = match self.source.list_commits(repo, revision, page_size, page).await {
                Ok(commits) => commits,
                Err(source) if page == 1 => {
                    return Err(AnalysisError::InitialCommits {
                        revision: revision.to_string(),
                        source,
                    });
                }
                Err(e) => {
                    warn!("Stopping history walk at page {}: {:#}", page, e);
                    window.stop = ScanState::Exhausted;
                    break;
                }
            };

            if commits.is_empty() {
                if page == 1 {
                    return Err(AnalysisError::EmptyHistory {
                        revision: revision.to_string(),
                    });
                }
                window.stop = ScanState::Exhausted;
                break;
            }
            let short_page = commits.len() < usize::from(page_size);

            for commit in commits {
                let boundary = index.stable_at(&commit.sha).cloned();
                window.commits.push(commit);

                if let Some(release) = boundary {
                    debug!("Found stable release {} in history", release.tag_name);
                    window.last_stable_release = Some(release);
                    window.stop = ScanState::BoundaryFound;
                    break;
                }
                if window.commits.len() >= self.limits.max_commits {
                    window.stop = ScanState::CapReached;
                    break;
                }
            }

            if window.stop == ScanState::Scanning && short_page {
                window.stop = ScanState::Exhausted;
            }
            page += 1;
        }

        match &window.last_stable_release {
            Some(release) => info!(
                "Walked {} commits back to {}",
                window.commits.len(),
                release.tag_name
            ),
            None => info!(
                "No stable release within {} commits ({:?})",
                window.commits.len(),
                window.stop
            ),
        }
        Ok(window)
    }
}
