//! # contract: interfaces between the publish pipeline and its collaborators
//!
//! This module defines the traits the orchestrator drives during a run and the
//! plain data types that cross those seams:
//!
//! - [`CandidateSource`] enumerates publishable items in remote storage.
//! - [`ContentFetcher`] materializes one item as a local file.
//! - [`MetadataGenerator`] proposes a title, description and tags for an item.
//! - [`Publisher`] sends a local file plus metadata to the video platform.
//!
//! ## Errors
//! Every collaborator failure is a typed value (`ListError`, `FetchError`,
//! `GenerationError`, `PublishError`). The orchestrator consumes them per item
//! and never lets them abort a run.
//!
//! ## Mocking & Testing
//! All traits are annotated for `mockall`, so the mocks are available to
//! integration tests through the `test-export-mocks` feature.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// One object offered by the candidate source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Stable identifier, the object name in the bucket.
    pub item_id: String,
    /// Object size in bytes, when the source reports it.
    pub size: Option<u64>,
    /// Last modification time as reported by the source (RFC 3339).
    pub updated: Option<String>,
}

impl Candidate {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            size: None,
            updated: None,
        }
    }
}

/// Raw, unvalidated output of a metadata generator.
///
/// Fields are optional on purpose: generators frequently omit or garble one of
/// them. See [`crate::metadata::PublicationMetadata::resolve`] for the
/// validation step that fills gaps with defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("candidate listing request failed: {0}")]
    Request(String),
    #[error("candidate listing returned an unreadable response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download of {item_id} failed: {reason}")]
    Download {
        item_id: String,
        reason: String,
        partial: Option<PathBuf>,
    },
    #[error("writing {item_id} to local storage failed: {source}")]
    Io {
        item_id: String,
        partial: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Local file left behind by the failed fetch, if any.
    pub fn partial_artifact(&self) -> Option<&Path> {
        match self {
            FetchError::Download { partial, .. } | FetchError::Io { partial, .. } => {
                partial.as_deref()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("metadata request failed: {0}")]
    Request(String),
    #[error("metadata response was malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not read local artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("platform rejected the upload: {0}")]
    Rejected(String),
    #[error("publish request failed: {0}")]
    Request(String),
    #[error("platform did not return an identifier for the published item")]
    MissingPlatformId,
    #[error("publish request could not be built: {0}")]
    InvalidRequest(String),
}

/// Enumerates the items available for publishing.
///
/// Called once per run. Ordering is not significant; the selector shuffles.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, ListError>;
}

/// Materializes a remote item at a local, readable path.
///
/// On failure, implementors report any partially written file through
/// [`FetchError::partial_artifact`] so the orchestrator can remove it.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, item_id: &str) -> Result<PathBuf, FetchError>;
}

/// Proposes publication metadata for an item.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    async fn generate(&self, item_id: &str) -> Result<GeneratedMetadata, GenerationError>;
}

/// Publishes a local file with its metadata and returns the platform identifier.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        local_path: &Path,
        title: &str,
        description: &str,
        tags: &[String],
    ) -> Result<String, PublishError>;
}
