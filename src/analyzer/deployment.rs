use tracing::debug;

use super::release_index::ReleaseIndex;
use crate::github::{Commit, PullRequest, Release};

/// Set `deployed_version` on each merged PR to the earliest stable release
/// in the window published after the PR merged.
///
/// Publication time stands in for ancestry here: a hotfix tagged on an
/// older commit after a newer release can be reported as the deployment.
pub fn annotate_deployments(
    pull_requests: Vec<PullRequest>,
    window: &[Commit],
    index: &ReleaseIndex,
) -> Vec<PullRequest> {
    let releases: Vec<&Release> = window
        .iter()
        .filter_map(|commit| index.stable_at(&commit.sha))
        .collect();

    pull_requests
        .into_iter()
        .map(|mut pr| {
            pr.deployed_version = first_release_after_merge(&pr, &releases)
                .map(|release| release.tag_name.clone());
            if let Some(version) = &pr.deployed_version {
                debug!("PR #{} shipped in {}", pr.number, version);
            }
            pr
        })
        .collect()
}

fn first_release_after_merge<'r>(pr: &PullRequest, releases: &[&'r Release]) -> Option<&'r Release> {
    let merged_at = pr.merged_at?;

    releases
        .iter()
        .copied()
        .filter_map(|release| release.published_at.map(|published| (published, release)))
        .filter(|(published, _)| *published > merged_at)
        .min_by_key(|(published, _)| *published)
        .map(|(_, release)| release)
}
