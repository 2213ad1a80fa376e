//! Reconciler: writes the corrected reaction count into rendered rows
//!
//! For each row:
//! 1. look up `corpus[row.position]` (out of range = row from a previous video, skip)
//! 2. annotate the row with the matched entry (optional)
//! 3. count = `nicoruCount`, ±1 when the local toggle disagrees with the snapshot
//! 4. write it only if the row's body equals the entry's body
//!
//! One pass, no retries. The watcher calls again on the next mutation.

use serde::Serialize;

use crate::comments::{Corpus, RawComment};
use crate::dom::CommentRow;

// =============================================================================
// Types
// =============================================================================

/// What happened to a single row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// Row index has no corpus entry
    OutOfRange,
    /// Index, body, toggle or count element could not be read
    Unreadable,
    /// Rendered body differs from the corpus entry, nothing written
    BodyMismatch,
    /// Count written; `adjustment` is -1, 0 or +1
    Written { count: i64, adjustment: i8 },
}

/// Tally of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStats {
    pub visited: usize,
    pub written: usize,
    pub adjusted: usize,
    pub out_of_range: usize,
    pub body_mismatch: usize,
    pub unreadable: usize,
}

impl ReconcileStats {
    pub fn record(&mut self, outcome: RowOutcome) {
        self.visited += 1;
        match outcome {
            RowOutcome::OutOfRange => self.out_of_range += 1,
            RowOutcome::Unreadable => self.unreadable += 1,
            RowOutcome::BodyMismatch => self.body_mismatch += 1,
            RowOutcome::Written { adjustment, .. } => {
                self.written += 1;
                if adjustment != 0 {
                    self.adjusted += 1;
                }
            }
        }
    }

    pub fn merge(&mut self, other: ReconcileStats) {
        self.visited += other.visited;
        self.written += other.written;
        self.adjusted += other.adjusted;
        self.out_of_range += other.out_of_range;
        self.body_mismatch += other.body_mismatch;
        self.unreadable += other.unreadable;
    }
}

/// Count to display given the snapshot and the row's local toggle state
pub fn displayed_count(entry: &RawComment, toggled_locally: bool) -> (i64, i8) {
    let adjustment: i8 = match (toggled_locally, entry.is_nicotta()) {
        (true, false) => 1,
        (false, true) => -1,
        _ => 0,
    };
    // Server-supplied count, clamp instead of overflowing
    (entry.nicoru_count.saturating_add(adjustment as i64), adjustment)
}

// =============================================================================
// Reconciler
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    annotate: bool,
}

impl Reconciler {
    pub fn new(annotate: bool) -> Self {
        Self { annotate }
    }

    /// Reconcile every row, one bad row never stops the rest
    pub fn reconcile<R: CommentRow>(&self, corpus: &Corpus, rows: &[R]) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        for row in rows {
            stats.record(self.reconcile_row(corpus, row));
        }
        stats
    }

    pub fn reconcile_row<R: CommentRow + ?Sized>(&self, corpus: &Corpus, row: &R) -> RowOutcome {
        let Some(position) = row.position() else {
            return RowOutcome::Unreadable;
        };
        let Some(entry) = corpus.get(position) else {
            return RowOutcome::OutOfRange;
        };

        if self.annotate {
            if let Ok(json) = serde_json::to_string(entry) {
                row.annotate(&json);
            }
        }

        let Some(toggled) = row.is_toggled() else {
            return RowOutcome::Unreadable;
        };
        let (count, adjustment) = displayed_count(entry, toggled);

        match row.body_text() {
            None => return RowOutcome::Unreadable,
            Some(body) if body != entry.body => return RowOutcome::BodyMismatch,
            Some(_) => {}
        }

        if !row.write_count(&count.to_string()) {
            return RowOutcome::Unreadable;
        }
        RowOutcome::Written { count, adjustment }
    }
}
