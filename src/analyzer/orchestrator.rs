use serde::{Deserialize, Serialize};
use tracing::info;

use super::deployment::annotate_deployments;
use super::error::AnalysisError;
use super::history_walker::{HistoryWalker, ScanState};
use super::notes_parser::{parse_release_notes, ParsedReleaseNotes};
use super::pr_collector::PullRequestCollector;
use super::release_index::{fetch_releases, ReleaseIndex};
use super::release_notes::{NotesView, ReleaseNotesResolver};
use super::target_resolver::TargetResolver;
use crate::config::AnalysisLimits;
use crate::github::{Commit, PullRequest, Release, RepoRef, RepositorySource};

/// Shown as the current version when the repository has no stable release.
pub const NO_RELEASES: &str = "no releases";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub repo: RepoRef,
    pub branch: Option<String>,
    pub tag: Option<String>,
}

impl AnalysisRequest {
    pub fn new(repo: RepoRef) -> Self {
        Self {
            repo,
            branch: None,
            tag: None,
        }
    }

    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    /// The tag, or the effective branch.
    pub name: String,
    pub commit_sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub current: String,
    pub previous_stable: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub repository: RepoRef,
    pub target_ref: TargetRef,
    pub tag_view: bool,
    pub effective_branch: String,
    pub recent_commits: Vec<Commit>,
    pub commits_scanned: usize,
    pub window_stop: ScanState,
    pub unreleased_pull_requests: Vec<PullRequest>,
    pub open_pull_requests: Vec<PullRequest>,
    pub version_info: VersionInfo,
    pub recent_releases: Vec<Release>,
    pub parsed_release_notes: Option<ParsedReleaseNotes>,
}

pub struct ReleaseAnalyzer<S: RepositorySource> {
    source: S,
    limits: AnalysisLimits,
}

impl<S: RepositorySource> ReleaseAnalyzer<S> {
    /// Page sizes in `limits` are clamped to what the API returns.
    pub fn new(source: S, limits: AnalysisLimits) -> Self {
        Self {
            source,
            limits: limits.clamped(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let repo = &request.repo;
        let tag = request.tag.as_deref();
        info!("Analyzing {} (branch: {:?}, tag: {:?})", repo, request.branch, tag);

        // Target resolution and the release index share no data.
        let resolver = TargetResolver::new(&self.source, &self.limits);
        let (target, (releases, index)) = tokio::join!(
            resolver.resolve(repo, request.branch.as_deref(), tag),
            self.index_releases(repo)
        );
        let target = target?;
        if index.is_empty() {
            info!("No release of {} could be mapped to a commit", repo);
        }
        info!(
            "Target {} on branch {}; {} releases, {} indexed",
            target.revision,
            target.effective_branch,
            releases.len(),
            index.len()
        );

        let window = HistoryWalker::new(&self.source, &self.limits)
            .walk(repo, &target.revision, &index)
            .await?;
        let last_stable = window.last_stable_release.as_ref();

        let collected = PullRequestCollector::new(&self.source, &self.limits)
            .collect(repo, &target.effective_branch, last_stable, tag.is_some())
            .await;

        let unreleased = annotate_deployments(
            collected.merged.pull_requests,
            &window.commits,
            &index,
        );

        let view = match tag {
            Some(tag) => NotesView::Tag(tag),
            None => NotesView::Branch {
                branch: &target.effective_branch,
                previous_tag: last_stable.map(|r| r.tag_name.as_str()),
            },
        };
        let notes = ReleaseNotesResolver::new(&self.source)
            .resolve(repo, view, &releases, &unreleased)
            .await;
        let parsed_release_notes =
            (!notes.is_empty()).then(|| parse_release_notes(&notes, &unreleased));

        let previous_stable = last_stable.map(|r| r.tag_name.clone());
        let version_info = VersionInfo {
            current: tag
                .map(str::to_string)
                .or_else(|| previous_stable.clone())
                .unwrap_or_else(|| NO_RELEASES.to_string()),
            previous_stable,
        };

        // The walker never returns an empty window.
        let commit_sha = window
            .commits
            .first()
            .map(|c| c.sha.clone())
            .unwrap_or_else(|| target.revision.clone());

        info!(
            "Analysis of {} complete: {} unreleased, {} open PRs",
            repo,
            unreleased.len(),
            collected.open.len()
        );

        Ok(AnalysisResult {
            repository: repo.clone(),
            target_ref: TargetRef {
                name: tag
                    .map(str::to_string)
                    .unwrap_or_else(|| target.effective_branch.clone()),
                commit_sha,
            },
            tag_view: tag.is_some(),
            effective_branch: target.effective_branch,
            recent_commits: window
                .commits
                .iter()
                .take(self.limits.recent_commits)
                .cloned()
                .collect(),
            commits_scanned: window.commits.len(),
            window_stop: window.stop,
            unreleased_pull_requests: unreleased,
            open_pull_requests: collected.open,
            version_info,
            recent_releases: releases
                .into_iter()
                .take(self.limits.recent_releases)
                .collect(),
            parsed_release_notes,
        })
    }

    async fn index_releases(&self, repo: &RepoRef) -> (Vec<Release>, ReleaseIndex) {
        let releases = fetch_releases(&self.source, repo, &self.limits).await;
        let index = ReleaseIndex::build(&self.source, repo, &releases).await;
        (releases, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::{merged_pr, open_pr, release, repo, shas, FakeSource};
    use pretty_assertions::assert_eq;

    /// `main` at c0 .. c5 (newest first) with v1.0.0 on c3 and an rc on c1.
    fn released_repo() -> FakeSource {
        let mut source = FakeSource::with_history(&["c0", "c1", "c2", "c3", "c4", "c5"]);
        source.releases = vec![
            release("v1.1.0-rc.1", 30, false),
            release("v1.0.0", 20, true),
            release("v0.9.0", 10, true),
        ];
        source.tags.insert("v1.1.0-rc.1".to_string(), "c1".to_string());
        source.tags.insert("v1.0.0".to_string(), "c3".to_string());
        source.tags.insert("v0.9.0".to_string(), "c5".to_string());
        source.closed_prs = vec![
            merged_pr(21, "main", 40),
            merged_pr(20, "main", 25),
            merged_pr(19, "develop", 24),
            merged_pr(18, "main", 15),
            merged_pr(17, "main", 5),
        ];
        source.open_prs = vec![open_pr(30, "main"), open_pr(31, "develop")];
        source.notes = Some(
            "## What's Changed\n### Features\n* Widgets in https://github.com/acme/widgets/pull/21\n"
                .to_string(),
        );
        source
    }

    fn numbers(prs: &[PullRequest]) -> Vec<u64> {
        prs.iter().map(|pr| pr.number).collect()
    }

    #[tokio::test]
    async fn test_branch_view() {
        let analyzer = ReleaseAnalyzer::new(released_repo(), AnalysisLimits::default());

        let result = analyzer.analyze(&AnalysisRequest::new(repo())).await.unwrap();

        assert_eq!(
            result.target_ref,
            TargetRef {
                name: "main".to_string(),
                commit_sha: "c0".to_string(),
            }
        );
        assert!(!result.tag_view);
        assert_eq!(result.commits_scanned, 4);
        assert_eq!(result.window_stop, ScanState::BoundaryFound);
        assert_eq!(
            result.version_info,
            VersionInfo {
                current: "v1.0.0".to_string(),
                previous_stable: Some("v1.0.0".to_string()),
            }
        );
        assert_eq!(numbers(&result.unreleased_pull_requests), vec![21, 20]);
        assert!(result
            .unreleased_pull_requests
            .iter()
            .all(|pr| pr.deployed_version.is_none()));
        assert_eq!(numbers(&result.open_pull_requests), vec![30]);
        assert_eq!(result.recent_releases.len(), 3);

        let notes = result.parsed_release_notes.unwrap();
        assert_eq!(notes.sections.len(), 1);
        assert_eq!(notes.sections[0].title, "Features");
        assert_eq!(numbers(&notes.sections[0].pull_requests), vec![21]);
        assert_eq!(numbers(&notes.unmentioned_pull_requests), vec![20]);
        assert!(analyzer
            .source()
            .calls()
            .contains(&"generate:main:v1.0.0".to_string()));
    }

    #[tokio::test]
    async fn test_tag_view() {
        let mut source = released_repo();
        source.releases[1].body = "### Fixes\n* #18\n".to_string();
        let analyzer = ReleaseAnalyzer::new(source, AnalysisLimits::default());

        let result = analyzer
            .analyze(&AnalysisRequest::new(repo()).tag("v1.0.0"))
            .await
            .unwrap();

        // Starts at c4, the commit before the tag, and walks back to v0.9.0.
        assert_eq!(result.target_ref.name, "v1.0.0");
        assert_eq!(result.target_ref.commit_sha, "c4");
        assert!(result.tag_view);
        assert_eq!(result.commits_scanned, 2);
        assert_eq!(
            result.version_info,
            VersionInfo {
                current: "v1.0.0".to_string(),
                previous_stable: Some("v0.9.0".to_string()),
            }
        );
        assert_eq!(numbers(&result.unreleased_pull_requests), vec![21, 20, 18]);
        assert!(result.open_pull_requests.is_empty());

        // v1.0.0 is not in the window, so nothing is reported as deployed.
        assert!(result
            .unreleased_pull_requests
            .iter()
            .all(|pr| pr.deployed_version.is_none()));

        let notes = result.parsed_release_notes.unwrap();
        assert_eq!(numbers(&notes.sections[0].pull_requests), vec![18]);
        assert_eq!(analyzer.source().count_calls("generate"), 0);
        assert_eq!(analyzer.source().count_calls("pulls:open"), 0);
    }

    #[tokio::test]
    async fn test_repository_without_releases() {
        let history = shas("c", 1100);
        let refs: Vec<&str> = history.iter().map(String::as_str).collect();
        let mut source = FakeSource::with_history(&refs);
        source.closed_prs = vec![merged_pr(1, "main", 1)];
        let analyzer = ReleaseAnalyzer::new(source, AnalysisLimits::default());

        let result = analyzer.analyze(&AnalysisRequest::new(repo())).await.unwrap();

        assert_eq!(result.version_info.current, NO_RELEASES);
        assert!(result.version_info.previous_stable.is_none());
        assert_eq!(result.commits_scanned, 1000);
        assert_eq!(result.window_stop, ScanState::CapReached);
        assert_eq!(result.recent_commits.len(), 10);
        assert_eq!(result.recent_commits[0].sha, "c0");
        // Notes generation failed (no notes configured), which is not fatal.
        assert!(result.parsed_release_notes.is_none());
        assert_eq!(analyzer.source().count_calls("generate:main:-"), 1);
    }

    #[tokio::test]
    async fn test_oversized_commit_page_still_reaches_boundary() {
        let history = shas("c", 250);
        let refs: Vec<&str> = history.iter().map(String::as_str).collect();
        let mut source = FakeSource::with_history(&refs);
        source.releases = vec![release("v1.0.0", 10, true)];
        source.tags.insert("v1.0.0".to_string(), "c150".to_string());
        let limits = AnalysisLimits {
            commit_page_size: 200,
            ..AnalysisLimits::default()
        };
        let analyzer = ReleaseAnalyzer::new(source, limits);

        let result = analyzer.analyze(&AnalysisRequest::new(repo())).await.unwrap();

        assert_eq!(result.commits_scanned, 151);
        assert_eq!(result.window_stop, ScanState::BoundaryFound);
        assert_eq!(
            result.version_info.previous_stable.as_deref(),
            Some("v1.0.0")
        );
        assert_eq!(analyzer.source().count_calls("commits:main:100:"), 2);
    }

    #[tokio::test]
    async fn test_fatal_errors_abort() {
        let mut source = released_repo();
        source.default_branch = None;
        let analyzer = ReleaseAnalyzer::new(source, AnalysisLimits::default());
        let err = analyzer.analyze(&AnalysisRequest::new(repo())).await.unwrap_err();
        assert!(matches!(err, AnalysisError::DefaultBranch { .. }));

        let mut source = released_repo();
        source.fail_commit_pages_from = Some(1);
        let analyzer = ReleaseAnalyzer::new(source, AnalysisLimits::default());
        let err = analyzer
            .analyze(&AnalysisRequest::new(repo()).branch("main"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InitialCommits { .. }));
    }

    #[tokio::test]
    async fn test_degraded_steps_still_produce_result() {
        let mut source = released_repo();
        source.fail_release_pages_from = Some(1);
        source.fail_closed_pr_pages_from = Some(1);
        source.fail_open_prs = true;
        let analyzer = ReleaseAnalyzer::new(source, AnalysisLimits::default());

        let result = analyzer.analyze(&AnalysisRequest::new(repo())).await.unwrap();

        assert_eq!(result.version_info.current, NO_RELEASES);
        assert_eq!(result.commits_scanned, 6);
        assert!(result.unreleased_pull_requests.is_empty());
        assert!(result.open_pull_requests.is_empty());
        assert!(result.parsed_release_notes.is_none());
    }

    #[tokio::test]
    async fn test_analysis_is_repeatable() {
        let analyzer = ReleaseAnalyzer::new(released_repo(), AnalysisLimits::default());
        let request = AnalysisRequest::new(repo()).branch("main");

        let first = analyzer.analyze(&request).await.unwrap();
        let second = analyzer.analyze(&request).await.unwrap();

        assert_eq!(first, second);
    }
}
