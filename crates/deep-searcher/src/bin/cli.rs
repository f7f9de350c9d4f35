//! deep-searcher command line
//!
//! Run with: cargo run -p deep-searcher --features cli --bin deep-searcher -- query "..."

use clap::{Parser, Subcommand};
use console::style;
use deep_searcher::{DeepSearcher, ProviderConfig, QueryOutcome, QueryWarning};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "deep-searcher", version, about = "Iterative retrieval-augmented question answering", long_about = None)]
struct Cli {
    /// YAML or TOML provider configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a question against the loaded collections
    Query {
        question: String,

        #[arg(long, help = "Maximum retrieve-reflect rounds. Defaults to the configured value")]
        max_iter: Option<usize>,

        #[arg(long, help = "Print the retrieved chunks after the answer")]
        show_sources: bool,
    },
    /// Load local files/directories or web pages into a collection
    Load {
        /// Paths, or URLs when they start with http:// or https://
        #[arg(required = true)]
        sources: Vec<String>,

        #[arg(long)]
        collection_name: Option<String>,

        #[arg(long)]
        collection_description: Option<String>,

        #[arg(long, help = "Drop and recreate the collection if it exists")]
        force_new_collection: bool,
    },
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")?
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn print_outcome(outcome: &QueryOutcome, show_sources: bool) {
    println!("{}\n", style("Answer").bold().green());
    println!("{}\n", outcome.answer);

    for warning in &outcome.warnings {
        let text = match warning {
            QueryWarning::PartialRetrieval { iteration, reason } => {
                format!("retrieval round {} failed: {}", iteration, reason)
            }
            QueryWarning::EmbeddingDegraded { query, reason } => {
                format!("sub-query \"{}\" skipped: {}", query, reason)
            }
            QueryWarning::TokenBudgetExceeded { consumed, budget } => {
                format!("token budget exceeded ({} > {})", consumed, budget)
            }
        };
        println!("{} {}", style("warning:").yellow(), text);
    }

    if show_sources {
        println!("{}", style("Sources").bold());
        for result in &outcome.results {
            println!("  [{:.3}] {}", result.score, style(&result.reference).cyan());
        }
        println!();
    }

    println!(
        "{}",
        style(format!(
            "{} rounds, {} chunks, {} tokens",
            outcome.iterations,
            outcome.results.len(),
            outcome.consumed_tokens
        ))
        .dim()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deep_searcher=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ProviderConfig::from_file(path)?,
        None => ProviderConfig::default(),
    };
    let searcher = DeepSearcher::from_config(config)?;

    match cli.command {
        Commands::Query {
            question,
            max_iter,
            show_sources,
        } => {
            let pb = spinner("Searching...")?;
            let outcome = searcher.query(&question, max_iter).await;
            pb.finish_and_clear();
            print_outcome(&outcome?, show_sources);
        }
        Commands::Load {
            sources,
            collection_name,
            collection_description,
            force_new_collection,
        } => {
            let (urls, paths): (Vec<String>, Vec<String>) = sources
                .into_iter()
                .partition(|s| s.starts_with("http://") || s.starts_with("https://"));
            let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();

            let mut reports = Vec::new();
            if !paths.is_empty() {
                let pb = spinner(&format!("Loading {} paths...", paths.len()))?;
                let report = searcher
                    .load_from_local_files(
                        &paths,
                        collection_name.as_deref(),
                        collection_description.as_deref(),
                        force_new_collection,
                    )
                    .await;
                pb.finish_and_clear();
                reports.push(report?);
            }
            if !urls.is_empty() {
                let pb = spinner(&format!("Crawling {} URLs...", urls.len()))?;
                // A collection just created from local files must not be dropped again
                let force = force_new_collection && paths.is_empty();
                let report = searcher
                    .load_from_website(
                        &urls,
                        collection_name.as_deref(),
                        collection_description.as_deref(),
                        force,
                    )
                    .await;
                pb.finish_and_clear();
                reports.push(report?);
            }

            for report in reports {
                println!(
                    "{} {} documents, {} chunks, {} inserted, {} skipped into '{}'",
                    style("✓").green(),
                    report.documents,
                    report.chunks,
                    report.inserted,
                    report.skipped,
                    report.collection
                );
                for source in &report.failed_sources {
                    println!("  {} {}", style("failed:").red(), source);
                }
            }
        }
    }

    Ok(())
}
