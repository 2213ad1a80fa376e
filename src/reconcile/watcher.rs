//! ListWatcher: incremental reconciliation while the page mutates its list
//!
//! # State machine
//! `Idle → Active`, and back to `Idle` whenever a new cycle begins. The slot
//! owns at most one observer; installing a new one always disconnects the old
//! one first, so two observers never fight over the same rows.
//!
//! # Dispatch
//! - child-list records: reconcile only the added rows
//! - attribute records (icon class flips): reconcile every visible row
//! - character-data records: ignored, the reconciler's own text writes land here

use std::fmt;

use super::engine::{ReconcileStats, Reconciler};
use super::locator::CancelToken;
use crate::comments::Corpus;
use crate::dom::CommentRow;

// =============================================================================
// Observer seam
// =============================================================================

/// A live mutation subscription that can be torn down
pub trait ObserverHandle {
    fn disconnect(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Active,
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Active => write!(f, "active"),
        }
    }
}

// =============================================================================
// WatcherSlot
// =============================================================================

/// Single-owner slot for the current observer
pub struct WatcherSlot<H: ObserverHandle> {
    current: Option<H>,
    generation: u64,
    cancel: CancelToken,
}

impl<H: ObserverHandle> Default for WatcherSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ObserverHandle> WatcherSlot<H> {
    pub fn new() -> Self {
        Self {
            current: None,
            generation: 0,
            cancel: CancelToken::new(),
        }
    }

    /// Start a new cycle: disconnect the observer, cancel the previous
    /// cycle's pending lookup, and hand out a fresh generation.
    pub fn begin_cycle(&mut self) -> (u64, CancelToken) {
        self.stop();
        self.cancel.cancel();
        self.cancel = CancelToken::new();
        self.generation += 1;
        (self.generation, self.cancel.clone())
    }

    /// Whether `generation` is still the newest cycle
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Install the observer for `generation`. A stale generation's observer is
    /// disconnected on the spot and false is returned.
    pub fn install(&mut self, generation: u64, handle: H) -> bool {
        if !self.is_current(generation) {
            handle.disconnect();
            return false;
        }
        self.stop();
        self.current = Some(handle);
        true
    }

    /// Disconnect the current observer, if any
    pub fn stop(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                handle.disconnect();
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> WatcherState {
        if self.current.is_some() {
            WatcherState::Active
        } else {
            WatcherState::Idle
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// =============================================================================
// Mutations
// =============================================================================

/// A mutation record reduced to what dispatch needs
#[derive(Debug, Clone)]
pub enum MutationEvent<R> {
    /// Rows added to the list (non-element nodes already dropped)
    ChildList(Vec<R>),
    /// The watched attribute changed somewhere below the container
    Attribute,
    /// Text node content changed
    CharacterData,
}

/// Everything an active observer needs to reconcile one cycle's rows
#[derive(Debug)]
pub struct WatchSession {
    generation: u64,
    corpus: Corpus,
    reconciler: Reconciler,
}

impl WatchSession {
    pub fn new(generation: u64, corpus: Corpus, reconciler: Reconciler) -> Self {
        Self {
            generation,
            corpus,
            reconciler,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Full pass over the given rows
    pub fn reconcile_all<R: CommentRow>(&self, rows: &[R]) -> ReconcileStats {
        self.reconciler.reconcile(&self.corpus, rows)
    }

    /// Apply one mutation batch, record by record, in batch order
    pub fn dispatch<R, V>(&self, events: Vec<MutationEvent<R>>, visible_rows: V) -> ReconcileStats
    where
        R: CommentRow,
        V: Fn() -> Vec<R>,
    {
        let mut stats = ReconcileStats::default();
        for event in events {
            match event {
                MutationEvent::ChildList(added) => {
                    stats.merge(self.reconcile_all(&added));
                }
                MutationEvent::Attribute => {
                    stats.merge(self.reconcile_all(&visible_rows()));
                }
                MutationEvent::CharacterData => {}
            }
        }
        stats
    }
}
