use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::AnalysisLimits;
use crate::github::{Release, RepoRef, RepositorySource};

/// Fetch every release, page by page.
///
/// A failed page ends the listing; whatever was gathered is kept.
pub async fn fetch_releases<S>(source: &S, repo: &RepoRef, limits: &AnalysisLimits) -> Vec<Release>
where
    S: RepositorySource + ?Sized,
{
    let mut releases = Vec::new();

    for page in 1..=limits.max_release_pages {
        match source
            .list_releases(repo, limits.release_page_size, page)
            .await
        {
            Ok(items) => {
                let short_page = items.len() < usize::from(limits.release_page_size);
                releases.extend(items);
                if short_page {
                    break;
                }
            }
            Err(e) => {
                warn!("Could not list releases for {} (page {}): {:#}", repo, page, e);
                break;
            }
        }
    }

    releases
}

/// Commit SHA to the release tagged on it.
#[derive(Debug, Clone, Default)]
pub struct ReleaseIndex {
    by_sha: HashMap<String, Release>,
}

impl ReleaseIndex {
    /// Resolve each release's tag and index it by commit.
    ///
    /// Releases whose tag cannot be resolved are skipped.
    pub async fn build<S>(source: &S, repo: &RepoRef, releases: &[Release]) -> Self
    where
        S: RepositorySource + ?Sized,
    {
        let mut index = ReleaseIndex::default();

        for release in releases {
            match source.resolve_tag(repo, &release.tag_name).await {
                Ok(sha) => {
                    debug!("Mapped release {} to commit {}", release.tag_name, sha);
                    index.insert(sha, release.clone());
                }
                Err(e) => {
                    warn!("Could not get commit for tag {}: {:#}", release.tag_name, e);
                }
            }
        }

        index
    }

    /// Last write wins when two releases share a commit.
    pub fn insert(&mut self, sha: String, release: Release) {
        if let Some(previous) = self.by_sha.insert(sha.clone(), release) {
            debug!(
                "Release {} replaced in index for commit {}",
                previous.tag_name, sha
            );
        }
    }

    pub fn get(&self, sha: &str) -> Option<&Release> {
        self.by_sha.get(sha)
    }

    /// The release on `sha`, if it is stable.
    pub fn stable_at(&self, sha: &str) -> Option<&Release> {
        self.get(sha).filter(|r| r.is_stable())
    }

    pub fn len(&self) -> usize {
        self.by_sha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sha.is_empty()
    }
}
