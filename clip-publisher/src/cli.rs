//! CLI glue for clip-publisher: argument parsing, collaborator wiring and the
//! user-visible run summary.
//!
//! All selection, ledger and commit logic lives in `clip-publisher-core`. This
//! module only builds the concrete clients from config and secrets, hands them
//! to [`run_once`], and reports the outcome.
//!
//! ## Exit status
//! Only process-level failures (unreadable config, missing credentials,
//! unreachable bucket listing) return an error. Individual item failures are
//! part of a successful run's report.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clip_publisher_core::orchestrator::ItemOutcome;
use clip_publisher_core::{run_once, FileStore, Ledger};

use crate::load_config::{load_config, HttpSection, Secrets};
use crate::openai::OpenAiGenerator;
use crate::storage::StorageClient;
use crate::youtube::YouTubePublisher;

/// CLI for clip-publisher: publish unpublished clips from a bucket, once per invocation.
#[derive(Parser)]
#[clap(
    name = "clip-publisher",
    version,
    about = "Publish not-yet-published media clips from object storage to a video platform"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one publish cycle using the given config file
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Print the published records held by the ledger
    Ledger {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

pub fn build_http_client(section: &HttpSection) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(section.timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run { config } => {
            let config = load_config(config)?;
            let secrets = Secrets::from_env()?;
            tracing::info!(command = "run", "Starting publish run");

            let http = build_http_client(&config.http)?;
            let storage =
                StorageClient::new(http.clone(), &config.storage, secrets.gcs_access_token)?;
            let generator =
                OpenAiGenerator::new(http.clone(), &config.metadata, secrets.openai_api_key);
            let publisher =
                YouTubePublisher::new(http, &config.publish, secrets.youtube_access_token);

            let run_config = config.run_config();
            run_config.trace_loaded();
            let mut ledger = Ledger::load(FileStore::new(&config.ledger.path));

            let report = run_once(
                &run_config,
                &storage,
                &storage,
                &generator,
                &publisher,
                &mut ledger,
            )
            .await
            .map_err(|e| {
                tracing::error!(command = "run", error = %e, "Run failed");
                anyhow::Error::new(e)
            })?;

            println!("Run complete.\n{report}");
            for outcome in &report.outcomes {
                match outcome {
                    ItemOutcome::Published {
                        item_id,
                        platform_id,
                        persisted,
                    } => {
                        let note = if *persisted { "" } else { " (ledger write failed)" };
                        println!("  published {item_id} => {platform_id}{note}");
                    }
                    ItemOutcome::Skipped { item_id, stage, reason } => {
                        println!("  skipped   {item_id} at {stage}: {reason}");
                    }
                }
            }
            tracing::info!(command = "run", %report, "Run complete");
            Ok(())
        }
        Commands::Ledger { config } => {
            let config = load_config(config)?;
            let ledger = Ledger::load(FileStore::new(&config.ledger.path));
            let mut published = 0usize;
            for record in ledger.records().filter(|r| r.published) {
                published += 1;
                println!(
                    "{}\t{}\t{}",
                    record.item_id,
                    record.platform_id.as_deref().unwrap_or("-"),
                    record.committed_at.as_deref().unwrap_or("-"),
                );
            }
            println!("{published} published item(s) in {}", config.ledger.path.display());
            Ok(())
        }
    }
}
