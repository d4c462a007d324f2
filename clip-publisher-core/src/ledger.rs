//! Persistent record of which items have been published.
//!
//! The ledger is the single source of truth for "already done". It is loaded
//! once per run, consulted by the selector, and written through to its
//! [`DurableStore`] after every successful publish so that a crash never loses
//! a committed fact.
//!
//! # Document format
//! One JSON object keyed by item id:
//!
//! ```json
//! {
//!   "clips/otter.mp4": {
//!     "published": true,
//!     "platform_id": "dQw4w9WgXcQ",
//!     "committed_at": "2026-10-19T10:00:03Z"
//!   }
//! }
//! ```
//!
//! Unknown fields are ignored and the legacy names `uploaded`, `video_id` and
//! `uploaded_at` are accepted on read.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ledger store {path} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger store {path} could not be written: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ledger could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Byte-level persistence for the ledger document.
///
/// `atomic_write` must either replace the whole document or leave the previous
/// one untouched; readers never observe a partial write.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait DurableStore: Send + Sync {
    /// Current document bytes, or `None` when nothing has been written yet.
    fn read(&self) -> Result<Option<Vec<u8>>, PersistenceError>;

    fn atomic_write(&self, bytes: &[u8]) -> Result<(), PersistenceError>;
}

/// A ledger document stored as a single file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DurableStore for FileStore {
    fn read(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn atomic_write(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        let write_err = |source: std::io::Error| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        // The temp file must live on the same filesystem as the target for the rename to be atomic.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "[LEDGER] Document replaced");
        Ok(())
    }
}

/// What the ledger knows about one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// Key of the record; carried by the enclosing map in the document.
    #[serde(skip)]
    pub item_id: String,
    #[serde(default, alias = "uploaded")]
    pub published: bool,
    #[serde(default, alias = "video_id", skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    #[serde(default, alias = "uploaded_at", skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<String>,
}

impl PublicationRecord {
    /// A confirmed publication, timestamped now.
    pub fn published(item_id: impl Into<String>, platform_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            published: true,
            platform_id: Some(platform_id.into()),
            committed_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// In-memory view of the ledger document plus the store it writes through to.
pub struct Ledger<S: DurableStore> {
    store: S,
    records: BTreeMap<String, PublicationRecord>,
}

impl<S: DurableStore> Ledger<S> {
    /// Loads the ledger from `store`.
    ///
    /// Never fails: an absent, unreadable or unparseable document yields an
    /// empty ledger and a logged warning.
    pub fn load(store: S) -> Self {
        let records = match store.read() {
            Ok(Some(bytes)) => match decode(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        error = %e,
                        "[LEDGER] Document is corrupt, starting from an empty ledger"
                    );
                    BTreeMap::new()
                }
            },
            Ok(None) => {
                info!("[LEDGER] No ledger document yet, starting empty");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "[LEDGER] Document could not be read, starting from an empty ledger"
                );
                BTreeMap::new()
            }
        };

        info!(
            records = records.len(),
            published = records.values().filter(|r| r.published).count(),
            "[LEDGER] Loaded"
        );
        Self { store, records }
    }

    pub fn is_published(&self, item_id: &str) -> bool {
        self.records.get(item_id).is_some_and(|r| r.published)
    }

    pub fn get(&self, item_id: &str) -> Option<&PublicationRecord> {
        self.records.get(item_id)
    }

    /// All records, ordered by item id.
    pub fn records(&self) -> impl Iterator<Item = &PublicationRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Upserts `record` and persists the full mapping.
    ///
    /// Published records are write-once: committing over one is a no-op. The
    /// in-memory mapping is updated before the write, so on
    /// [`PersistenceError`] the current run still sees the item as done while
    /// the document on disk lags behind until the next successful commit.
    pub fn commit(&mut self, record: PublicationRecord) -> Result<(), PersistenceError> {
        if self.is_published(&record.item_id) {
            warn!(
                item_id = %record.item_id,
                "[LEDGER] Item already published, keeping existing record"
            );
            return Ok(());
        }

        self.merge_from_store();
        if self.is_published(&record.item_id) {
            warn!(
                item_id = %record.item_id,
                "[LEDGER] Item was published by another writer, keeping existing record"
            );
            return Ok(());
        }

        let item_id = record.item_id.clone();
        self.records.insert(item_id.clone(), record);

        let bytes = serde_json::to_vec_pretty(&self.records)?;
        match self.store.atomic_write(&bytes) {
            Ok(()) => {
                info!(item_id = %item_id, records = self.records.len(), "[LEDGER] Committed");
                Ok(())
            }
            Err(e) => {
                error!(
                    item_id = %item_id,
                    error = %e,
                    "[LEDGER][ERROR] Commit kept in memory only, document is stale"
                );
                Err(e)
            }
        }
    }

    /// Pulls in published records written to the store since load.
    fn merge_from_store(&mut self) {
        let on_disk = match self.store.read() {
            Ok(Some(bytes)) => match decode(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        error = %e,
                        "[LEDGER] Document is corrupt, it will be replaced by the in-memory ledger"
                    );
                    return;
                }
            },
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "[LEDGER] Could not re-read document before commit");
                return;
            }
        };

        for (item_id, record) in on_disk {
            let known_published = self.is_published(&item_id);
            if !known_published && (record.published || !self.records.contains_key(&item_id)) {
                debug!(item_id = %item_id, "[LEDGER] Merged record from store");
                self.records.insert(item_id, record);
            }
        }
    }
}

/// Decodes a ledger document.
///
/// Only a document that is not a JSON object is an error. Individual records
/// that do not match the record shape are dropped with a warning.
fn decode(bytes: &[u8]) -> Result<BTreeMap<String, PublicationRecord>, serde_json::Error> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_slice(bytes)?;
    let mut records = BTreeMap::new();
    for (item_id, value) in raw {
        match serde_json::from_value::<PublicationRecord>(value) {
            Ok(mut record) => {
                record.item_id = item_id.clone();
                records.insert(item_id, record);
            }
            Err(e) => {
                warn!(item_id = %item_id, error = %e, "[LEDGER] Skipping malformed record");
            }
        }
    }
    Ok(records)
}
