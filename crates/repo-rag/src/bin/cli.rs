//! repo-rag command-line interface
//!
//! Runs the same ingestion, sync and query operations as the HTTP API
//! without starting a server.

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repo_rag::{
    index::IngestSummary,
    ingestion::clone_repo,
    AppState, RagConfig, RagServer, SyncReport,
};

#[derive(Parser)]
#[command(name = "repo-rag", version)]
#[command(about = "Retrieval-augmented Q&A over repository documentation", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "REPO_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Sync a GitHub repository into the index
    Ingest {
        /// Repository URL
        repo_url: String,
        /// Branch to sync
        #[arg(short, long, default_value = "main")]
        branch: String,
    },
    /// Re-sync the last ingested repository
    Sync,
    /// Index every allowed file under a directory
    IngestDir {
        /// Directory to walk
        dir: PathBuf,
    },
    /// Index a single file
    IngestFile {
        /// File to index
        path: PathBuf,
    },
    /// Shallow-clone a repository, optionally indexing the checkout
    Clone {
        /// Repository URL
        repo_url: String,
        /// Branch to clone
        #[arg(short, long, default_value = "main")]
        branch: String,
        /// Parent directory for the checkout (default: the data directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Index the checkout after cloning
        #[arg(long)]
        ingest: bool,
    },
    /// Ask a question
    Query {
        /// Question text
        text: String,
        /// Number of chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// List indexed documents
    Documents,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repo_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = RagConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let server = RagServer::new(config).await?;
            println!("{} http://{}", style("Listening on").green(), server.address());
            server.start().await?;
        }
        Commands::Ingest { repo_url, branch } => {
            let state = AppState::new(config).await?;
            let spinner = spinner(format!("Syncing {} ({})", repo_url, branch));
            let report = state.ingest_repo(&repo_url, &branch).await;
            spinner.finish_and_clear();
            print_report(&report?);
        }
        Commands::Sync => {
            let state = AppState::new(config).await?;
            let spinner = spinner("Syncing last ingested repository".to_string());
            let report = state.sync_saved_repo().await;
            spinner.finish_and_clear();
            print_report(&report?);
        }
        Commands::IngestDir { dir } => {
            let state = AppState::new(config).await?;
            ingest_path(&state, &dir).await?;
        }
        Commands::IngestFile { path } => {
            let state = AppState::new(config).await?;
            ingest_path(&state, &path).await?;
        }
        Commands::Clone {
            repo_url,
            branch,
            dir,
            ingest,
        } => {
            let save_dir = dir.unwrap_or_else(|| config.data.data_dir.clone());
            let spinner = spinner(format!("Cloning {}", repo_url));
            let checkout = {
                let (url, branch, save_dir) = (repo_url.clone(), branch.clone(), save_dir.clone());
                tokio::task::spawn_blocking(move || clone_repo(&url, &branch, &save_dir)).await?
            };
            spinner.finish_and_clear();
            let checkout = checkout?;
            println!("{} {}", style("Cloned into").green(), checkout.display());

            if ingest {
                let state = AppState::new(config).await?;
                ingest_path(&state, &checkout).await?;
            }
        }
        Commands::Query { text, k } => {
            let state = AppState::new(config).await?;
            let spinner = spinner("Thinking".to_string());
            let answer = state.query(&text, k).await;
            spinner.finish_and_clear();
            let answer = answer?;

            println!("{}\n", answer.answer);
            if !answer.sources.is_empty() {
                println!("{}", style("Sources:").bold());
                for source in &answer.sources {
                    println!("  - {}", source);
                }
            }
        }
        Commands::Documents => {
            let state = AppState::new(config).await?;
            let documents = state.store().list_documents();
            for doc in &documents {
                println!(
                    "{:<60} {:>4} chunks  {}",
                    doc.doc_id,
                    doc.chunks,
                    doc.ingested_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!("{} documents", style(documents.len()).bold());
        }
    }

    Ok(())
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

async fn ingest_path(state: &AppState, path: &Path) -> anyhow::Result<()> {
    let bar = spinner(format!("Indexing {}", path.display()));
    let summary = state.ingest_path(path).await;
    bar.finish_and_clear();
    print_summary(&summary?);
    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    println!(
        "{} {} added, {} updated, {} unchanged, {} failed ({} chunks)",
        style("Indexed:").green().bold(),
        summary.added,
        summary.updated,
        summary.unchanged,
        summary.failed,
        summary.chunks
    );
}

fn print_report(report: &SyncReport) {
    if report.up_to_date {
        println!(
            "{} {} is already at {}",
            style("Up to date:").green().bold(),
            report.repo,
            report.commit
        );
        return;
    }

    println!(
        "{} {} at {} ({} changed, {} deleted, {} skipped)",
        style("Synced").green().bold(),
        report.repo,
        report.commit,
        report.files_changed,
        report.files_deleted,
        report.files_skipped
    );
    print_summary(&report.summary);
}
