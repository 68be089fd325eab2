pub mod deployment;
pub mod error;
pub mod history_walker;
pub mod notes_parser;
pub mod orchestrator;
pub mod pr_collector;
pub mod release_index;
pub mod release_notes;
pub mod report;
pub mod target_resolver;

pub use error::AnalysisError;
pub use history_walker::ScanState;
pub use notes_parser::{parse_release_notes, ParsedReleaseNotes, ReleaseNotesSection};
pub use orchestrator::{
    AnalysisRequest, AnalysisResult, ReleaseAnalyzer, TargetRef, VersionInfo, NO_RELEASES,
};
pub use report::{OutputFormat, ReportGenerator};
