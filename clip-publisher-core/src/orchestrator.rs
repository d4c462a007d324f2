//! One complete publish run: select → fetch → generate → publish → commit → cleanup.
//!
//! # Flow
//! 1. List candidates once and pick the work list with the [`crate::selector`].
//! 2. For each selected item, strictly in sequence:
//!    - FETCH the object to a local file,
//!    - resolve metadata (generator output or fallback, never fatal),
//!    - PUBLISH the file,
//!    - COMMIT to the ledger, only after the publisher confirmed an id,
//!    - remove the local file, whatever happened.
//! 3. Stop when `budget` items were committed or the work list runs out.
//!
//! # Error Handling
//! Item-level failures are logged and recorded in the [`RunReport`]; they never
//! abort the run and leave no ledger entry, so the item is retried next run.
//! Only a failed candidate listing ends the run with an error.
//!
//! The ledger is held by `&mut` for the whole run: one run, one writer.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::contract::{CandidateSource, ContentFetcher, ListError, MetadataGenerator, Publisher};
use crate::ledger::{DurableStore, Ledger, PublicationRecord};
use crate::metadata::PublicationMetadata;
use crate::selector;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("could not list candidates: {0}")]
    Listing(#[from] ListError),
}

/// Step at which an item was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Fetch,
    Publish,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Fetch => write!(f, "fetch"),
            RunStage::Publish => write!(f, "publish"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Published {
        item_id: String,
        platform_id: String,
        /// False when the ledger commit only reached memory.
        persisted: bool,
    },
    Skipped {
        item_id: String,
        stage: RunStage,
        reason: String,
    },
}

impl ItemOutcome {
    pub fn item_id(&self) -> &str {
        match self {
            ItemOutcome::Published { item_id, .. } | ItemOutcome::Skipped { item_id, .. } => {
                item_id
            }
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, ItemOutcome::Published { .. })
    }
}

/// Summary of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Candidates offered by the source.
    pub candidates: usize,
    /// Items in the work list after ledger filtering, shuffling and capping.
    pub selected: usize,
    pub outcomes: Vec<ItemOutcome>,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            candidates: 0,
            selected: 0,
            outcomes: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_published()).count()
    }

    pub fn skipped(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Commits that were published but could not be written to the store.
    pub fn persistence_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Published { persisted: false, .. }))
            .count()
    }

    pub fn published_ids(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_published())
            .map(ItemOutcome::item_id)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {}: candidates={} selected={} attempted={} succeeded={} skipped={}",
            self.run_id,
            self.candidates,
            self.selected,
            self.attempted(),
            self.succeeded(),
            self.skipped()
        )?;
        if self.persistence_failures() > 0 {
            write!(f, " unpersisted={}", self.persistence_failures())?;
        }
        Ok(())
    }
}

/// Drives one run against the given collaborators and ledger.
pub async fn run_once<C, F, G, P, S>(
    config: &RunConfig,
    source: &C,
    fetcher: &F,
    generator: &G,
    publisher: &P,
    ledger: &mut Ledger<S>,
) -> Result<RunReport, RunError>
where
    C: CandidateSource,
    F: ContentFetcher,
    G: MetadataGenerator,
    P: Publisher,
    S: DurableStore,
{
    let run_id = Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id);

    async move {
        let mut report = RunReport::new(run_id);
        info!(budget = config.budget, backfill = config.backfill_failures, "[RUN] Starting");

        let candidates = source.list_candidates().await.map_err(|e| {
            error!(error = %e, "[RUN][ERROR] Candidate listing failed");
            RunError::Listing(e)
        })?;
        report.candidates = candidates.len();

        let work = {
            let mut rng = rand::thread_rng();
            if config.backfill_failures {
                selector::shuffled_eligible(&candidates, ledger, &mut rng)
            } else {
                selector::select(&candidates, ledger, config.budget, &mut rng)
            }
        };
        report.selected = work.len();
        info!(candidates = report.candidates, selected = report.selected, "[RUN] Work list ready");

        for item_id in work {
            if report.succeeded() >= config.budget {
                info!(budget = config.budget, "[RUN] Budget reached");
                break;
            }
            let outcome = process_item(&item_id, config, fetcher, generator, publisher, ledger)
                .instrument(info_span!("item", item_id = %item_id))
                .await;
            report.outcomes.push(outcome);
        }

        if report.succeeded() == 0 {
            info!(attempted = report.attempted(), "[RUN] No new items published");
        } else {
            info!(
                succeeded = report.succeeded(),
                skipped = report.skipped(),
                unpersisted = report.persistence_failures(),
                "[RUN] Finished"
            );
        }
        Ok(report)
    }
    .instrument(span)
    .await
}

async fn process_item<F, G, P, S>(
    item_id: &str,
    config: &RunConfig,
    fetcher: &F,
    generator: &G,
    publisher: &P,
    ledger: &mut Ledger<S>,
) -> ItemOutcome
where
    F: ContentFetcher,
    G: MetadataGenerator,
    P: Publisher,
    S: DurableStore,
{
    let skipped = |stage: RunStage, reason: String| ItemOutcome::Skipped {
        item_id: item_id.to_string(),
        stage,
        reason,
    };

    let artifact = match fetcher.fetch(item_id).await {
        Ok(path) => {
            info!(path = %path.display(), "[RUN][FETCH] Fetched");
            LocalArtifact::new(path)
        }
        Err(e) => {
            error!(error = %e, "[RUN][FETCH][ERROR] Fetch failed, skipping item");
            if let Some(partial) = e.partial_artifact() {
                LocalArtifact::new(partial.to_path_buf()).remove();
            }
            return skipped(RunStage::Fetch, e.to_string());
        }
    };

    let generated = generator.generate(item_id).await;
    let metadata = PublicationMetadata::resolve(item_id, generated, &config.metadata);
    debug!(title = %metadata.title, tags = ?metadata.tags, "[RUN][GENERATE] Metadata resolved");

    let platform_id = match publisher
        .publish(artifact.path(), &metadata.title, &metadata.description, &metadata.tags)
        .await
    {
        Ok(id) if !id.trim().is_empty() => id,
        Ok(_) => {
            error!("[RUN][PUBLISH][ERROR] Publisher returned an empty identifier, skipping item");
            artifact.remove();
            return skipped(RunStage::Publish, "publisher returned an empty identifier".to_string());
        }
        Err(e) => {
            error!(error = %e, "[RUN][PUBLISH][ERROR] Publish failed, skipping item");
            artifact.remove();
            return skipped(RunStage::Publish, e.to_string());
        }
    };
    info!(platform_id = %platform_id, "[RUN][PUBLISH] Published");

    let persisted = ledger
        .commit(PublicationRecord::published(item_id, platform_id.clone()))
        .is_ok();
    artifact.remove();

    ItemOutcome::Published {
        item_id: item_id.to_string(),
        platform_id,
        persisted,
    }
}

/// A fetched file that is deleted when the item is done with it, on every path.
struct LocalArtifact {
    path: PathBuf,
    removed: bool,
}

impl LocalArtifact {
    fn new(path: PathBuf) -> Self {
        Self { path, removed: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn remove(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "[RUN][CLEANUP] Removed local artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "[RUN][CLEANUP] Could not remove local artifact"
                );
            }
        }
    }
}

impl Drop for LocalArtifact {
    fn drop(&mut self) {
        self.cleanup();
    }
}
