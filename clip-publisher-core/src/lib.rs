#![doc = "clip-publisher-core: selection, ledger and publish-commit pipeline for clip-publisher."]

//! This crate holds the logic that decides which media item to publish next
//! and guarantees that an item is published at most once across runs.
//! Object storage, text generation and the video platform are reached only
//! through the traits in [`contract`]; their concrete clients live in the
//! `clip-publisher` crate.
//!
//! # Usage
//! Load a [`ledger::Ledger`], build a [`config::RunConfig`] and call
//! [`orchestrator::run_once`] with the four collaborators.

pub mod config;
pub mod contract;
pub mod ledger;
pub mod metadata;
pub mod orchestrator;
pub mod selector;

pub use config::RunConfig;
pub use ledger::{FileStore, Ledger, PublicationRecord};
pub use orchestrator::{run_once, ItemOutcome, RunReport};
