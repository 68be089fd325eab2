use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::analyzer::report::OutputFormat;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GithubConfig,
    pub limits: AnalysisLimits,
    pub output: OutputConfig,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// API base URL, for GitHub Enterprise. Public GitHub when unset.
    pub api_url: Option<String>,
}

/// Bounds on how much history and how many pull requests one analysis
/// will look at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisLimits {
    pub max_commits: usize,
    pub commit_page_size: u8,
    /// Commits fetched after a tag to find the commit before it.
    pub tag_lookahead: u8,
    pub max_merged_prs: usize,
    pub max_closed_pr_pages: u32,
    pub pr_page_size: u8,
    pub open_pr_limit: u8,
    pub max_release_pages: u32,
    pub release_page_size: u8,
    pub recent_commits: usize,
    pub recent_releases: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        AnalysisLimits {
            max_commits: 1000,
            commit_page_size: 100,
            tag_lookahead: 50,
            max_merged_prs: 500,
            max_closed_pr_pages: 100,
            pr_page_size: 100,
            open_pr_limit: 100,
            max_release_pages: 10,
            release_page_size: 100,
            recent_commits: 10,
            recent_releases: 5,
        }
    }
}

impl AnalysisLimits {
    /// Largest `per_page` the GitHub API honours.
    pub const MAX_PAGE_SIZE: u8 = 100;

    fn page_sizes(&self) -> [(&'static str, u8); 5] {
        [
            ("commit_page_size", self.commit_page_size),
            ("tag_lookahead", self.tag_lookahead),
            ("pr_page_size", self.pr_page_size),
            ("open_pr_limit", self.open_pr_limit),
            ("release_page_size", self.release_page_size),
        ]
    }

    /// Scans end on the first page shorter than requested, so every page
    /// size must be one the API will actually return.
    pub fn validate(&self) -> Result<()> {
        for (name, size) in self.page_sizes() {
            if !(1..=Self::MAX_PAGE_SIZE).contains(&size) {
                bail!(
                    "limits.{} must be between 1 and {}, got {}",
                    name,
                    Self::MAX_PAGE_SIZE,
                    size
                );
            }
        }
        Ok(())
    }

    /// Page sizes forced into `1..=MAX_PAGE_SIZE`.
    pub fn clamped(self) -> Self {
        for (name, size) in self.page_sizes() {
            let bounded = size.clamp(1, Self::MAX_PAGE_SIZE);
            if bounded != size {
                warn!("limits.{} = {} is out of range, using {}", name, size, bounded);
            }
        }

        let clamp = |size: u8| size.clamp(1, Self::MAX_PAGE_SIZE);
        AnalysisLimits {
            commit_page_size: clamp(self.commit_page_size),
            tag_lookahead: clamp(self.tag_lookahead),
            pr_page_size: clamp(self.pr_page_size),
            open_pr_limit: clamp(self.open_pr_limit),
            release_page_size: clamp(self.release_page_size),
            ..self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub template: Option<PathBuf>,
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: OutputFormat::Markdown,
            template: None,
            log_level: "warn".to_string(),
        }
    }
}
