use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use release_radar::analyzer::{AnalysisRequest, OutputFormat, ReleaseAnalyzer, ReportGenerator};
use release_radar::config::Config;
use release_radar::github::{GitHubClient, PullRequest, RepoRef, RepositorySource};
use release_radar::parse_release_notes;

#[derive(Parser)]
#[command(name = "release-radar")]
#[command(about = "Report what changed on a GitHub branch or tag since the last stable release")]
struct Cli {
    /// GitHub token (can also be set via GITHUB_TOKEN env var)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Config file (defaults to ./release-radar.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GitHub API base URL, for GitHub Enterprise
    #[arg(long, env = "GITHUB_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a branch or tag against its last stable release
    Analyze {
        /// Repository as owner/name
        repo: RepoRef,

        /// Branch to analyze (defaults to the repository's default branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// Tag to analyze instead of a branch head
        #[arg(short, long)]
        tag: Option<String>,

        /// Output format (markdown, json, html)
        #[arg(short = 'f', long)]
        format: Option<OutputFormat>,

        /// Output file path (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List branches, marking the default one
    Branches {
        /// Repository as owner/name
        repo: RepoRef,
    },

    /// List recent releases
    Releases {
        /// Repository as owner/name
        repo: RepoRef,

        #[arg(long, default_value = "10")]
        limit: u8,
    },

    /// Group pull requests by the sections of saved release notes
    ParseNotes {
        /// Markdown release notes
        #[arg(long)]
        notes: PathBuf,

        /// JSON array of pull requests
        #[arg(long)]
        prs: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.output.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let api_url = cli.api_url.as_deref().or(config.github.api_url.as_deref());

    match cli.command {
        Commands::Analyze {
            repo,
            branch,
            tag,
            format,
            output,
        } => {
            let client = GitHubClient::new(cli.token, api_url)?;
            let analyzer = ReleaseAnalyzer::new(client, config.limits.clone());

            let request = AnalysisRequest {
                repo,
                branch,
                tag,
            };
            let result = analyzer.analyze(&request).await?;

            let format = format.unwrap_or(config.output.format);
            let generator = ReportGenerator::new(format, config.output.template.as_deref())?;
            let content = generator.generate(&result)?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content)
                    .with_context(|| format!("Failed to write {}", output_path.display()))?;
                println!("Report written to {}", output_path.display());
            } else {
                println!("{}", content);
            }
        }
        Commands::Branches { repo } => {
            let client = GitHubClient::new(cli.token, api_url)?;
            let (branches, default_branch) =
                tokio::join!(client.list_branches(&repo), client.default_branch(&repo));
            let branches = branches?;
            let default_branch = default_branch.ok();

            println!("Branches of {}:", repo);
            for branch in branches {
                let marker = if default_branch.as_deref() == Some(branch.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                let protected = if branch.protected { " (protected)" } else { "" };
                println!(
                    "{} {} {}{}",
                    marker,
                    branch.name,
                    branch.short_sha(),
                    protected
                );
            }
        }
        Commands::Releases { repo, limit } => {
            let client = GitHubClient::new(cli.token, api_url)?;
            let releases = client.list_releases(&repo, limit, 1).await?;

            println!("Recent releases of {} (limit: {}):", repo, limit);
            if releases.is_empty() {
                println!("  No releases found");
            }
            for release in releases {
                let kind = if release.draft {
                    "draft"
                } else if release.prerelease {
                    "prerelease"
                } else {
                    "stable"
                };
                let published = release
                    .published_at
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "unpublished".to_string());
                println!("  - {} [{}] {}", release.tag_name, kind, published);
            }
        }
        Commands::ParseNotes { notes, prs } => {
            let markdown = std::fs::read_to_string(&notes)
                .with_context(|| format!("Failed to read {}", notes.display()))?;
            let content = std::fs::read_to_string(&prs)
                .with_context(|| format!("Failed to read {}", prs.display()))?;
            let pull_requests: Vec<PullRequest> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid pull request list in {}", prs.display()))?;

            let parsed = parse_release_notes(&markdown, &pull_requests);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
    }

    Ok(())
}
