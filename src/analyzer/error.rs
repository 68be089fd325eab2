use thiserror::Error;

/// Failures that abort an analysis. Everything else degrades to partial data.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("could not determine the default branch of {repo}")]
    DefaultBranch {
        repo: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not fetch commits for {revision}")]
    InitialCommits {
        revision: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("no commits are reachable from {revision}")]
    EmptyHistory { revision: String },
}
