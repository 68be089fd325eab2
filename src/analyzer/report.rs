use anyhow::Result;
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

use super::history_walker::ScanState;
use super::orchestrator::AnalysisResult;
use crate::github::{PullRequest, Release};

const DEFAULT_TEMPLATE: &str = include_str!("../../templates/report.md.hbs");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Json,
    Html,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            "html" => Ok(OutputFormat::Html),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

pub struct ReportGenerator {
    template_engine: Handlebars<'static>,
    format: OutputFormat,
}

impl ReportGenerator {
    pub fn new(format: OutputFormat, template_path: Option<&Path>) -> Result<Self> {
        let mut template_engine = Handlebars::new();
        template_engine.register_escape_fn(handlebars::no_escape);

        match template_path {
            Some(path) => {
                let template = std::fs::read_to_string(path)?;
                template_engine.register_template_string("report", template)?;
            }
            None => template_engine.register_template_string("report", DEFAULT_TEMPLATE)?,
        }

        Ok(Self {
            template_engine,
            format,
        })
    }

    pub fn generate(&self, result: &AnalysisResult) -> Result<String> {
        match self.format {
            OutputFormat::Markdown => self.generate_markdown(result),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
            OutputFormat::Html => self.generate_html(result),
        }
    }

    fn generate_markdown(&self, result: &AnalysisResult) -> Result<String> {
        Ok(self.template_engine.render("report", &template_data(result))?)
    }

    fn generate_html(&self, result: &AnalysisResult) -> Result<String> {
        let markdown = self.generate_markdown(result)?;
        let parser = pulldown_cmark::Parser::new(&markdown);
        let mut html = String::new();
        pulldown_cmark::html::push_html(&mut html, parser);

        Ok(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{} @ {}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif; max-width: 900px; margin: 0 auto; padding: 20px; }}
        h1, h2, h3 {{ border-bottom: 1px solid #e1e4e8; padding-bottom: 0.3em; }}
        code {{ background: #f6f8fa; padding: 2px 4px; border-radius: 3px; }}
    </style>
</head>
<body>
    {}
</body>
</html>"#,
            result.repository, result.target_ref.name, html
        ))
    }
}

fn template_data(result: &AnalysisResult) -> Value {
    let (sections, unmentioned) = match &result.parsed_release_notes {
        Some(notes) => (
            notes
                .sections
                .iter()
                .map(|s| json!({ "title": s.title, "prs": pr_lines(&s.pull_requests) }))
                .collect(),
            pr_lines(&notes.unmentioned_pull_requests),
        ),
        None => (Vec::new(), Vec::new()),
    };

    json!({
        "repository": result.repository.to_string(),
        "target": {
            "name": result.target_ref.name,
            "short_sha": result.target_ref.commit_sha.get(..7).unwrap_or(&result.target_ref.commit_sha),
        },
        "tag_view": result.tag_view,
        "version": {
            "current": result.version_info.current,
            "previous_stable": result.version_info.previous_stable,
        },
        "commits_scanned": result.commits_scanned,
        "window_note": window_note(result),
        "unreleased_count": result.unreleased_pull_requests.len(),
        "unreleased": pr_lines(&result.unreleased_pull_requests),
        "sections": sections,
        "unmentioned": unmentioned,
        "open_count": result.open_pull_requests.len(),
        "open": pr_lines(&result.open_pull_requests),
        "recent_commits": result.recent_commits.iter().map(|c| json!({
            "sha": c.short_sha(),
            "summary": c.summary(),
            "author": c.author_name,
        })).collect::<Vec<_>>(),
        "releases": result.recent_releases.iter().map(release_entry).collect::<Vec<_>>(),
    })
}

fn window_note(result: &AnalysisResult) -> String {
    match (result.window_stop, &result.version_info.previous_stable) {
        (ScanState::BoundaryFound, Some(tag)) => format!("back to `{}`", tag),
        (ScanState::CapReached, _) => "history limit reached".to_string(),
        _ => "start of history reached".to_string(),
    }
}

fn pr_lines(prs: &[PullRequest]) -> Vec<Value> {
    prs.iter().map(|pr| json!({ "line": pr_line(pr) })).collect()
}

fn pr_line(pr: &PullRequest) -> String {
    let mut line = format!("[#{}]({}) {} (@{})", pr.number, pr.html_url, pr.title, pr.author_login);
    if !pr.labels.is_empty() {
        let labels: Vec<&str> = pr.labels.iter().map(|l| l.name.as_str()).collect();
        line.push_str(&format!(" [{}]", labels.join(", ")));
    }
    match (&pr.deployed_version, pr.merged_at) {
        (Some(version), _) => line.push_str(&format!(", shipped in `{}`", version)),
        (None, Some(merged_at)) => {
            line.push_str(&format!(", merged {}", merged_at.format("%Y-%m-%d")))
        }
        (None, None) => {}
    }
    line
}

fn release_entry(release: &Release) -> Value {
    let kind = if release.draft {
        "draft"
    } else if release.prerelease {
        "prerelease"
    } else {
        ""
    };
    json!({
        "tag": release.tag_name,
        "date": release
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unpublished".to_string()),
        "kind": kind,
    })
}
