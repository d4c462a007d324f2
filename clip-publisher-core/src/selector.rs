//! Work selection for one run: drop what the ledger already has, shuffle, cap.
//!
//! Shuffling keeps a persistently failing item from being retried first on
//! every run.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::contract::Candidate;
use crate::ledger::{DurableStore, Ledger};

/// Extensions accepted when no explicit list is configured.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi"];

/// Case-insensitive suffix match of `item_id` against `extensions`.
pub fn has_media_extension<E: AsRef<str>>(item_id: &str, extensions: &[E]) -> bool {
    let lower = item_id.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| lower.ends_with(&ext.as_ref().to_ascii_lowercase()))
}

/// Every candidate not yet published, deduplicated, in random order.
pub fn shuffled_eligible<S, R>(
    candidates: &[Candidate],
    ledger: &Ledger<S>,
    rng: &mut R,
) -> Vec<String>
where
    S: DurableStore,
    R: Rng + ?Sized,
{
    let mut seen = HashSet::new();
    let mut eligible: Vec<String> = candidates
        .iter()
        .filter(|c| !ledger.is_published(&c.item_id))
        .filter(|c| seen.insert(c.item_id.as_str()))
        .map(|c| c.item_id.clone())
        .collect();
    eligible.shuffle(rng);

    debug!(
        candidates = candidates.len(),
        eligible = eligible.len(),
        "[SELECT] Filtered candidates against ledger"
    );
    eligible
}

/// The ordered work list for one run, at most `budget` items long.
pub fn select<S, R>(
    candidates: &[Candidate],
    ledger: &Ledger<S>,
    budget: usize,
    rng: &mut R,
) -> Vec<String>
where
    S: DurableStore,
    R: Rng + ?Sized,
{
    let mut selected = shuffled_eligible(candidates, ledger, rng);
    selected.truncate(budget);
    selected
}
