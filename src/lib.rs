//! Report what a GitHub branch or tag contains since its last stable release:
//! the commit window, merged and open pull requests, the release each merged
//! PR shipped in, and the PRs grouped by release-note section.

pub mod analyzer;
pub mod config;
pub mod github;

pub use analyzer::{
    parse_release_notes, AnalysisError, AnalysisRequest, AnalysisResult, OutputFormat,
    ReleaseAnalyzer, ReportGenerator,
};
pub use config::Config;
pub use github::{GitHubClient, RepoRef, RepositorySource};
