use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::github::PullRequest;

/// A `###` section of release notes and the PRs its lines reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNotesSection {
    pub title: String,
    pub pull_requests: Vec<PullRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReleaseNotes {
    pub sections: Vec<ReleaseNotesSection>,
    /// PRs never referenced anywhere in the notes.
    pub unmentioned_pull_requests: Vec<PullRequest>,
}

fn heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^### (.+)$").expect("heading pattern is valid"))
}

/// Matches `https://host/owner/repo/pull/123` and `#123`.
fn pr_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:https?://[^\s)\]]+?/pull/|#)(\d+)").expect("PR reference pattern is valid")
    })
}

/// Group `pull_requests` under the `###` headings of `markdown` that
/// reference them.
///
/// A PR referenced under several headings appears in each of those
/// sections. Headings that reference none of the given PRs are dropped,
/// and text before the first heading is ignored.
pub fn parse_release_notes(markdown: &str, pull_requests: &[PullRequest]) -> ParsedReleaseNotes {
    let mut sections = Vec::new();
    let mut mentioned: HashSet<u64> = HashSet::new();
    let mut current: Option<ReleaseNotesSection> = None;

    for line in markdown.lines() {
        if let Some(caps) = heading_regex().captures(line) {
            flush(&mut sections, current.take());
            current = Some(ReleaseNotesSection {
                title: caps[1].trim().to_string(),
                pull_requests: Vec::new(),
            });
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };

        for caps in pr_reference_regex().captures_iter(line) {
            let Ok(number) = caps[1].parse::<u64>() else {
                continue;
            };
            mentioned.insert(number);

            if section.pull_requests.iter().any(|pr| pr.number == number) {
                continue;
            }
            if let Some(pr) = pull_requests.iter().find(|pr| pr.number == number) {
                section.pull_requests.push(pr.clone());
            }
        }
    }
    flush(&mut sections, current);

    let unmentioned_pull_requests = pull_requests
        .iter()
        .filter(|pr| !mentioned.contains(&pr.number))
        .cloned()
        .collect();

    ParsedReleaseNotes {
        sections,
        unmentioned_pull_requests,
    }
}

fn flush(sections: &mut Vec<ReleaseNotesSection>, section: Option<ReleaseNotesSection>) {
    if let Some(section) = section.filter(|s| !s.pull_requests.is_empty()) {
        sections.push(section);
    }
}
