//! CorpusBuilder: rebuilds the comment list the page renders
//!
//! Pipeline: drop the owner thread → (optionally) order threads by fork name →
//! flatten → NG filter → stable sort by `vposMs`.
//!
//! Position `i` of the result is assumed to be the row the page renders with
//! `data-index = i`. Nothing here can verify that; the row body check in the
//! reconciler is the only guard.

use serde::Serialize;

use super::model::{RawComment, RawThread};
use super::ng::{NgFilter, NgSettings};
use crate::config::{FixConfig, TieBreak, DEFAULT_OWNER_FORK};

// =============================================================================
// Corpus
// =============================================================================

/// Ordered, filtered comment list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Corpus {
    entries: Vec<RawComment>,
}

impl Corpus {
    pub fn get(&self, position: usize) -> Option<&RawComment> {
        self.entries.get(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawComment> {
        self.entries.iter()
    }

    /// Bodies in corpus order (handy for assertions and logging)
    pub fn bodies(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.body.as_str()).collect()
    }
}

impl From<Vec<RawComment>> for Corpus {
    fn from(entries: Vec<RawComment>) -> Self {
        Self { entries }
    }
}

// =============================================================================
// CorpusBuilder
// =============================================================================

#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    owner_fork: String,
    tie_break: TieBreak,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self {
            owner_fork: DEFAULT_OWNER_FORK.to_string(),
            tie_break: TieBreak::default(),
        }
    }

    pub fn from_config(config: &FixConfig) -> Self {
        Self {
            owner_fork: config.owner_fork.clone(),
            tie_break: config.tie_break,
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Build the corpus. Inputs are only borrowed; the result owns clones.
    pub fn build(&self, threads: &[RawThread], settings: &NgSettings) -> Result<Corpus, String> {
        let filter = NgFilter::new(settings)?;

        let mut visible: Vec<&RawThread> = threads
            .iter()
            .filter(|thread| thread.fork != self.owner_fork)
            .collect();

        if self.tie_break == TieBreak::ForkName {
            // slice::sort_by is stable: same-fork threads keep payload order
            visible.sort_by(|a, b| a.fork.cmp(&b.fork));
        }

        let mut entries: Vec<RawComment> = visible
            .into_iter()
            .flat_map(|thread| thread.comments.iter())
            .filter(|comment| filter.accepts(comment))
            .cloned()
            .collect();

        entries.sort_by_key(|comment| comment.vpos_ms);

        Ok(Corpus { entries })
    }
}

// =============================================================================
// Tests
// =============================================================================
