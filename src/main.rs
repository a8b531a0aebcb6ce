//! Log stream pipeline.
//!
//! # Architecture Overview
//!
//! ```text
//!   produce (one per simulated application)            consume (N per group)
//!  ┌──────────────────────────────┐                ┌───────────────────────────────┐
//!  │ tick → Generator → LogEntry  │                │ join group → pull records     │
//!  │   → codec::encode            │   ┌────────┐   │   → partition worker          │
//!  │   → send(key = application) ─┼──▶│ broker │──▶│   → decode → render → stdout  │
//!  │   → (partition, offset)      │   │ topic  │   │   → mark processed            │
//!  └──────────────────────────────┘   └────────┘   └───────────────────────────────┘
//! ```
//!
//! `demo` runs both roles in one process over an in-process broker.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use log_stream::config::resolve_config;
use log_stream::lifecycle::{start_consumer, start_demo, start_producer};

#[derive(Parser)]
#[command(name = "log-stream")]
#[command(about = "Publish synthetic application logs and render them from a consumer group", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish entries for one simulated application
    Produce {
        /// Application to simulate (random pick from the configuration otherwise)
        #[arg(short, long)]
        app: Option<String>,
    },
    /// Join the consumer group and render entries to stdout
    Consume {
        /// Consumer group to join
        #[arg(short, long)]
        group: Option<String>,

        /// Disable ANSI colours
        #[arg(long)]
        no_color: bool,
    },
    /// Run producers and a subscriber in one process on an in-process broker
    Demo {
        /// Number of simulated applications
        #[arg(long, default_value_t = 2)]
        apps: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;

    let outcome = match cli.command {
        Commands::Produce { app } => start_producer(config, app).await.map(|report| {
            tracing::info!(published = report.published, failed = report.failed, "Producer exited");
        }),
        Commands::Consume { group, no_color } => {
            start_consumer(config, group, no_color).await.map(|report| {
                tracing::info!(rendered = report.rendered, malformed = report.malformed, "Consumer exited");
            })
        }
        Commands::Demo { apps } => start_demo(config, apps).await.map(|report| {
            tracing::info!(
                producers = report.producers.len(),
                rendered = report.subscriber.rendered,
                "Demo exited"
            );
        }),
    };

    if let Err(e) = &outcome {
        tracing::error!(error = %e, fatal = e.is_fatal(), "Startup failed");
    }
    outcome.map_err(Into::into)
}
