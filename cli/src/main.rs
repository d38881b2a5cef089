use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;

use actorscope::logging::init_logging;
use actorscope::render::{actors_table, consistency_table, latency_table};
use actorscope::request::load_request;
use actorscope::{PairRequest, PathRequest, Session};
use actorscope_core::{Analysis, CancellationToken, Config, ConsistencyCheckEntry, ConsistencyRun};

#[derive(Parser)]
#[command(name = "actorscope")]
#[command(about = "Latency and consistency discovery over recorded actor traces", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "actorscope.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure end-to-end and per-phase latency along a causal path
    Latency {
        /// JSON event-log snapshot
        #[arg(long)]
        log: PathBuf,
        /// Path file (TOML or JSON) naming nodes and edges
        #[arg(long)]
        path: PathBuf,
        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score loop consistency between actor pairs
    Consistency {
        /// JSON event-log snapshot
        #[arg(long)]
        log: PathBuf,
        /// Pair file (TOML or JSON) naming actors and selectors
        #[arg(long)]
        pairs: Option<PathBuf>,
        /// Add an unconfigured entry for every communicating pair
        #[arg(long)]
        discover: bool,
        /// Output the entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// List actors with the messages they process and send
    Actors {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration
    Config,
}

#[derive(Serialize)]
struct ConsistencyOutput<'a> {
    entries: &'a [ConsistencyCheckEntry],
    run: Option<ConsistencyRun>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        Config::default()
    };
    config.validate()?;

    init_logging(&config.logging);
    if !cli.config.exists() {
        tracing::debug!(path = ?cli.config, "config file not found, using defaults");
    }

    match cli.command {
        Commands::Latency { log, path, json } => {
            let session = Session::open(config, &log)?;
            let request: PathRequest = load_request(&path)?;

            match session.latency(&request, cancel_on_ctrl_c()).await? {
                Analysis::Completed(report) if json => {
                    println!("{}", serde_json::to_string_pretty(&report.snapshot())?);
                }
                Analysis::Completed(report) => {
                    print!("{}", latency_table(session.log(), &report));
                }
                Analysis::Cancelled => {
                    eprintln!("Latency discovery cancelled");
                }
            }
        }
        Commands::Consistency {
            log,
            pairs,
            discover,
            json,
        } => {
            if pairs.is_none() && !discover {
                anyhow::bail!("Pass --pairs, --discover, or both");
            }

            let session = Session::open(config, &log)?;
            let request: PairRequest = match &pairs {
                Some(path) => load_request(path)?,
                None => PairRequest::default(),
            };

            let (entries, outcome) = session
                .consistency(&request, discover, cancel_on_ctrl_c())
                .await?;
            let run = outcome.completed();

            if json {
                let output = ConsistencyOutput {
                    entries: &entries,
                    run,
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                print!(
                    "{}",
                    consistency_table(session.log(), &entries, run.as_ref())
                );
            }
        }
        Commands::Actors { log, json } => {
            let session = Session::open(config, &log)?;
            let actors = session.actors();

            if json {
                println!("{}", serde_json::to_string_pretty(&actors)?);
            } else {
                print!("{}", actors_table(&actors));
            }
        }
        Commands::Config => {
            print!("{}", Config::default_toml()?);
        }
    }

    Ok(())
}

/// A token that is cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling analysis");
            handle.cancel();
        }
    });
    token
}
