use tracing::{info, warn};

use crate::github::{PullRequest, Release, RepoRef, RepositorySource};

/// What the analysis is looking at, as far as release notes are concerned.
#[derive(Debug, Clone, Copy)]
pub enum NotesView<'a> {
    /// Notes are the body of the release for this tag.
    Tag(&'a str),
    /// Notes are generated for the branch since `previous_tag`.
    Branch {
        branch: &'a str,
        previous_tag: Option<&'a str>,
    },
}

pub struct ReleaseNotesResolver<'a, S: RepositorySource + ?Sized> {
    source: &'a S,
}

impl<'a, S: RepositorySource + ?Sized> ReleaseNotesResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Release-note markdown for the view, or an empty string when there is
    /// none. Generation failures are logged, not returned.
    pub async fn resolve(
        &self,
        repo: &RepoRef,
        view: NotesView<'_>,
        releases: &[Release],
        merged: &[PullRequest],
    ) -> String {
        match view {
            NotesView::Tag(tag) => match releases.iter().find(|r| r.tag_name == tag) {
                Some(release) if !release.body.is_empty() => {
                    info!("Using release notes from release {}", tag);
                    release.body.clone()
                }
                _ => String::new(),
            },
            NotesView::Branch {
                branch,
                previous_tag,
            } => {
                if merged.is_empty() {
                    return String::new();
                }

                info!(
                    "Generating release notes for {} since {}",
                    branch,
                    previous_tag.unwrap_or("the beginning")
                );
                match self
                    .source
                    .generate_release_notes(repo, branch, previous_tag)
                    .await
                {
                    Ok(notes) => notes,
                    Err(e) => {
                        warn!("Could not generate release notes: {:#}", e);
                        String::new()
                    }
                }
            }
        }
    }
}
