use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::history_walker::ScanState;
use crate::config::AnalysisLimits;
use crate::github::{PullRequest, PullRequestState, Release, RepoRef, RepositorySource};

#[derive(Debug, Clone)]
pub struct MergedPullRequests {
    pub pull_requests: Vec<PullRequest>,
    pub stop: ScanState,
}

#[derive(Debug, Clone)]
pub struct CollectedPullRequests {
    pub merged: MergedPullRequests,
    pub open: Vec<PullRequest>,
}

pub struct PullRequestCollector<'a, S: RepositorySource + ?Sized> {
    source: &'a S,
    limits: &'a AnalysisLimits,
}

impl<'a, S: RepositorySource + ?Sized> PullRequestCollector<'a, S> {
    pub fn new(source: &'a S, limits: &'a AnalysisLimits) -> Self {
        Self { source, limits }
    }

    /// Merged PRs since the boundary, plus open PRs unless this is a tag
    /// view. Never fails: paging errors end the scan early.
    pub async fn collect(
        &self,
        repo: &RepoRef,
        effective_branch: &str,
        last_stable_release: Option<&Release>,
        is_tag_view: bool,
    ) -> CollectedPullRequests {
        let merged = self
            .collect_merged(repo, effective_branch, last_stable_release)
            .await;
        let open = if is_tag_view {
            Vec::new()
        } else {
            self.collect_open(repo, effective_branch).await
        };

        info!(
            "Found {} merged and {} open PRs targeting {}",
            merged.pull_requests.len(),
            open.len(),
            effective_branch
        );
        CollectedPullRequests { merged, open }
    }

    /// Scan closed PRs, most recently updated first, keeping those merged
    /// into `effective_branch`.
    ///
    /// The first qualifying PR merged at or before the boundary release
    /// ends the scan. Update order only approximates merge order, so this
    /// is a heuristic cutoff.
    pub async fn collect_merged(
        &self,
        repo: &RepoRef,
        effective_branch: &str,
        last_stable_release: Option<&Release>,
    ) -> MergedPullRequests {
        let cutoff = last_stable_release.and_then(|r| r.published_at);
        let page_size = self.limits.pr_page_size;
        let mut merged = MergedPullRequests {
            pull_requests: Vec::new(),
            stop: ScanState::Scanning,
        };
        let mut seen = HashSet::new();
        let mut page = 1u32;

        debug!("Scanning merged PRs since {:?}", cutoff);

        while merged.stop == ScanState::Scanning {
            if page > self.limits.max_closed_pr_pages {
                merged.stop = ScanState::CapReached;
                break;
            }

            let prs = match self
                .source
                .list_pull_requests(repo, PullRequestState::Closed, page_size, page)
                .await
            {
                Ok(prs) => prs,
                Err(e) => {
                    warn!("Stopping merged PR scan at page {}: {:#}", page, e);
                    merged.stop = ScanState::Exhausted;
                    break;
                }
            };
            let short_page = prs.len() < usize::from(page_size);

            for pr in prs {
                if !pr.is_merged() || pr.base_ref != effective_branch {
                    continue;
                }
                if cutoff.is_some_and(|cutoff| pr.merged_at <= Some(cutoff)) {
                    debug!("PR #{} merged before the boundary release", pr.number);
                    merged.stop = ScanState::BoundaryFound;
                    break;
                }
                if !seen.insert(pr.number) {
                    continue;
                }

                merged.pull_requests.push(pr);
                if merged.pull_requests.len() >= self.limits.max_merged_prs {
                    merged.stop = ScanState::CapReached;
                    break;
                }
            }

            if merged.stop == ScanState::Scanning && short_page {
                merged.stop = ScanState::Exhausted;
            }
            page += 1;
        }

        merged
    }

    /// Open PRs targeting `effective_branch`, from a single page.
    pub async fn collect_open(&self, repo: &RepoRef, effective_branch: &str) -> Vec<PullRequest> {
        match self
            .source
            .list_pull_requests(repo, PullRequestState::Open, self.limits.open_pr_limit, 1)
            .await
        {
            Ok(prs) => prs
                .into_iter()
                .filter(|pr| pr.base_ref == effective_branch)
                .collect(),
            Err(e) => {
                warn!("Could not list open PRs: {:#}", e);
                Vec::new()
            }
        }
    }
}
