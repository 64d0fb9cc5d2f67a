//! `recs` command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod errors;
mod output;

use errors::exit_code_for;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "recs")]
#[command(about = "Self-learning TV and film recommendation engine")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full-text search over the catalog
    Search {
        query: String,
        #[arg(default_value_t = 10)]
        limit: usize,
    },
    /// Ingest a JSON export of catalog items (file path, or '-' for stdin)
    Ingest {
        source: String,
        /// Cap on ingested rows
        limit: Option<usize>,
    },
    /// Recommendations for a user
    Recommend {
        user_id: String,
        /// Defaults to the configured rec_default_limit
        limit: Option<usize>,
    },
    /// Items similar to a catalog entry
    Similar {
        content_id: String,
        #[arg(default_value_t = 10)]
        limit: usize,
    },
    /// Engine statistics
    Stats,
    /// Run one optimization cycle now
    Optimize,
    /// Seed the initial recommendation patterns
    Seed,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests are not usage errors.
            if e.use_stderr() {
                eprint!("{e}");
                return ExitCode::from(1);
            }
            print!("{e}");
            return ExitCode::SUCCESS;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RECS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let engine = match config::load_and_build(cli.config.as_deref()).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Commands::Search { query, limit } => {
            commands::search::run(&engine, &query, limit, cli.format).await
        }
        Commands::Ingest { source, limit } => {
            commands::ingest::run(&engine, &source, limit, cli.format).await
        }
        Commands::Recommend { user_id, limit } => {
            let limit = limit.unwrap_or(engine.config().rec_default_limit);
            commands::recommend::run(&engine, &user_id, limit, cli.format).await
        }
        Commands::Similar { content_id, limit } => {
            commands::similar::run(&engine, &content_id, limit, cli.format).await
        }
        Commands::Stats => commands::stats::run(&engine, cli.format).await,
        Commands::Optimize => commands::optimize::run(&engine, cli.format).await,
        Commands::Seed => commands::seed::run(&engine, cli.format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}
