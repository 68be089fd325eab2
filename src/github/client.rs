use anyhow::{bail, Result};
use async_trait::async_trait;
use octocrab::models;
use octocrab::params;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::source::RepositorySource;
use super::types::{Branch, Commit, Label, PullRequest, PullRequestState, Release, RepoRef};

const BRANCH_PAGE_SIZE: u8 = 100;
const MAX_BRANCH_PAGES: u32 = 10;
const MAX_TAG_DEREFERENCES: usize = 5;

/// `RepositorySource` backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    pub fn new(token: Option<String>, api_url: Option<&str>) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }
        if let Some(url) = api_url {
            builder = builder.base_uri(url)?;
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl RepositorySource for GitHubClient {
    async fn list_branches(&self, repo: &RepoRef) -> Result<Vec<Branch>> {
        let mut branches = Vec::new();

        for page in 1..=MAX_BRANCH_PAGES {
            let items = self
                .client
                .repos(&repo.owner, &repo.name)
                .list_branches()
                .per_page(BRANCH_PAGE_SIZE)
                .page(page)
                .send()
                .await?
                .items;
            let short_page = items.len() < usize::from(BRANCH_PAGE_SIZE);

            branches.extend(items.into_iter().map(|b| Branch {
                name: b.name,
                commit_sha: b.commit.sha,
                protected: b.protected,
            }));

            if short_page {
                break;
            }
        }

        debug!("Fetched {} branches for {}", branches.len(), repo);
        Ok(branches)
    }

    async fn default_branch(&self, repo: &RepoRef) -> Result<String> {
        let repository = self.client.repos(&repo.owner, &repo.name).get().await?;

        match repository.default_branch {
            Some(branch) => Ok(branch),
            None => bail!("Repository {} reports no default branch", repo),
        }
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        revision: &str,
        per_page: u8,
        page: u32,
    ) -> Result<Vec<Commit>> {
        let commits = self
            .client
            .repos(&repo.owner, &repo.name)
            .list_commits()
            .sha(revision)
            .per_page(per_page)
            .page(page)
            .send()
            .await?;

        debug!(
            "Fetched {} commits from {} @ {} (page {})",
            commits.items.len(),
            repo,
            revision,
            page
        );
        Ok(commits.items.into_iter().map(convert_commit).collect())
    }

    async fn list_releases(&self, repo: &RepoRef, per_page: u8, page: u32) -> Result<Vec<Release>> {
        let releases = self
            .client
            .repos(&repo.owner, &repo.name)
            .releases()
            .list()
            .per_page(per_page)
            .page(page)
            .send()
            .await?;

        Ok(releases.items.into_iter().map(convert_release).collect())
    }

    async fn resolve_tag(&self, repo: &RepoRef, tag: &str) -> Result<String> {
        let reference = self
            .client
            .repos(&repo.owner, &repo.name)
            .get_ref(&params::repos::Reference::Tag(tag.to_string()))
            .await?;

        let mut object = reference.object;
        for _ in 0..MAX_TAG_DEREFERENCES {
            match object {
                models::repos::Object::Commit { sha, .. } => return Ok(sha),
                models::repos::Object::Tag { sha, .. } => {
                    debug!("Dereferencing annotated tag {} ({})", tag, sha);
                    // `GitTag` does not expose the tagged object, so read it raw
                    let route = format!("/repos/{}/{}/git/tags/{}", repo.owner, repo.name, sha);
                    let annotated: AnnotatedTag = self.client.get(route, None::<&()>).await?;
                    object = annotated.object;
                }
                _ => bail!("Tag {} does not point at a commit", tag),
            }
        }

        bail!(
            "Tag {} is nested more than {} levels deep",
            tag,
            MAX_TAG_DEREFERENCES
        )
    }

    async fn get_commit(&self, repo: &RepoRef, reference: &str) -> Result<Commit> {
        let commit = self
            .client
            .commits(&repo.owner, &repo.name)
            .get(reference)
            .await?;

        Ok(convert_commit(commit))
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoRef,
        state: PullRequestState,
        per_page: u8,
        page: u32,
    ) -> Result<Vec<PullRequest>> {
        let api_state = match state {
            PullRequestState::Open => params::State::Open,
            PullRequestState::Closed => params::State::Closed,
        };
        let pulls = self
            .client
            .pulls(&repo.owner, &repo.name)
            .list()
            .state(api_state)
            .sort(params::pulls::Sort::Updated)
            .direction(params::Direction::Descending)
            .per_page(per_page)
            .page(page)
            .send()
            .await?;

        debug!(
            "Fetched {} {} PRs for {} (page {})",
            pulls.items.len(),
            state.as_str(),
            repo,
            page
        );
        Ok(pulls.items.into_iter().map(convert_pull_request).collect())
    }

    async fn generate_release_notes(
        &self,
        repo: &RepoRef,
        target: &str,
        previous_tag: Option<&str>,
    ) -> Result<String> {
        // The API wants a tag name even for a preview; it does not create it.
        let request = GenerateNotesRequest {
            tag_name: format!("preview-{}", target),
            target_commitish: target,
            previous_tag_name: previous_tag,
        };
        let route = format!(
            "/repos/{}/{}/releases/generate-notes",
            repo.owner, repo.name
        );
        let notes: GeneratedNotes = self.client.post(route, Some(&request)).await?;

        Ok(notes.body)
    }
}

#[derive(Serialize)]
struct GenerateNotesRequest<'a> {
    tag_name: String,
    target_commitish: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_tag_name: Option<&'a str>,
}

#[derive(Deserialize)]
struct GeneratedNotes {
    body: String,
}

#[derive(Deserialize)]
struct AnnotatedTag {
    object: models::repos::Object,
}

fn convert_commit(commit: models::repos::RepoCommit) -> Commit {
    let (author_name, author_date) = match commit.commit.author {
        Some(author) => (author.user.name, author.date),
        None => ("Unknown".to_string(), None),
    };

    Commit {
        sha: commit.sha,
        message: commit.commit.message,
        author_name,
        author_date,
    }
}

fn convert_release(release: models::repos::Release) -> Release {
    Release {
        name: release
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| release.tag_name.clone()),
        tag_name: release.tag_name,
        published_at: release.published_at,
        prerelease: release.prerelease,
        draft: release.draft,
        body: release.body.unwrap_or_default(),
    }
}

fn convert_pull_request(pr: models::pulls::PullRequest) -> PullRequest {
    let author_login = pr
        .user
        .map(|u| u.login)
        .unwrap_or_else(|| "unknown".to_string());

    PullRequest {
        number: pr.number,
        title: pr.title.unwrap_or_default(),
        author_name: author_login.clone(),
        author_login,
        created_at: pr.created_at.unwrap_or_else(chrono::Utc::now),
        updated_at: pr
            .updated_at
            .or(pr.created_at)
            .unwrap_or_else(chrono::Utc::now),
        html_url: pr.html_url.map(|u| u.to_string()).unwrap_or_default(),
        merged_at: pr.merged_at,
        base_ref: pr.base.ref_field,
        labels: pr
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| Label {
                name: l.name,
                color: l.color,
            })
            .collect(),
        deployed_version: None,
    }
}
