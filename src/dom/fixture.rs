//! In-memory row markup for tests
//!
//! `FixtureRow` plays the role of one `data-index` row: index attribute, count
//! text, body text, reaction icon. Clones share state, like DOM handles do.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::adapter::{parse_position, CommentRow};

#[derive(Debug, Default)]
struct RowState {
    index: Option<String>,
    body: Option<String>,
    count: RefCell<Option<String>>,
    toggled: Cell<Option<bool>>,
    annotation: RefCell<Option<String>>,
    writes: Cell<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FixtureRow(Rc<RowState>);

impl FixtureRow {
    pub fn new(position: usize) -> Self {
        Self(Rc::new(RowState {
            index: Some(position.to_string()),
            ..RowState::default()
        }))
    }

    pub fn unindexed() -> Self {
        Self::default()
    }

    pub fn body(self, body: &str) -> Self {
        self.rebuild(|state| state.body = Some(body.to_string()))
    }

    pub fn count(self, count: &str) -> Self {
        self.rebuild(|state| state.count = RefCell::new(Some(count.to_string())))
    }

    pub fn toggled(self, toggled: bool) -> Self {
        self.rebuild(|state| state.toggled = Cell::new(Some(toggled)))
    }

    /// Flip the icon state in place, like a click on the reaction button
    pub fn set_toggled(&self, toggled: bool) {
        self.0.toggled.set(Some(toggled));
    }

    pub fn count_text(&self) -> Option<String> {
        self.0.count.borrow().clone()
    }

    pub fn annotation(&self) -> Option<String> {
        self.0.annotation.borrow().clone()
    }

    pub fn writes(&self) -> usize {
        self.0.writes.get()
    }

    // Builders run before the row is shared, so unwrapping the Rc is safe here
    fn rebuild(self, apply: impl FnOnce(&mut RowState)) -> Self {
        let mut state = Rc::try_unwrap(self.0).unwrap_or_else(|shared| RowState {
            index: shared.index.clone(),
            body: shared.body.clone(),
            count: RefCell::new(shared.count.borrow().clone()),
            toggled: Cell::new(shared.toggled.get()),
            annotation: RefCell::new(shared.annotation.borrow().clone()),
            writes: Cell::new(shared.writes.get()),
        });
        apply(&mut state);
        Self(Rc::new(state))
    }
}

impl CommentRow for FixtureRow {
    fn position(&self) -> Option<usize> {
        self.0.index.as_deref().and_then(parse_position)
    }

    fn body_text(&self) -> Option<String> {
        self.0.body.clone()
    }

    fn is_toggled(&self) -> Option<bool> {
        self.0.toggled.get()
    }

    fn write_count(&self, text: &str) -> bool {
        let mut count = self.0.count.borrow_mut();
        if count.is_none() {
            return false;
        }
        *count = Some(text.to_string());
        self.0.writes.set(self.0.writes.get() + 1);
        true
    }

    fn annotate(&self, json: &str) {
        *self.0.annotation.borrow_mut() = Some(json.to_string());
    }
}

// =============================================================================
// FixtureList
// =============================================================================

/// A comment list container holding fixture rows
#[derive(Debug, Clone, Default)]
pub struct FixtureList(Rc<ListState>);

#[derive(Debug, Default)]
struct ListState {
    rows: RefCell<Vec<FixtureRow>>,
    attached: Cell<bool>,
}

impl FixtureList {
    pub fn new(rows: Vec<FixtureRow>) -> Self {
        Self(Rc::new(ListState {
            rows: RefCell::new(rows),
            attached: Cell::new(true),
        }))
    }

    pub fn rows(&self) -> Vec<FixtureRow> {
        self.0.rows.borrow().clone()
    }

    pub fn push(&self, row: FixtureRow) {
        self.0.rows.borrow_mut().push(row);
    }

    pub fn is_attached(&self) -> bool {
        self.0.attached.get()
    }

    pub fn detach(&self) {
        self.0.attached.set(false);
    }

    pub fn same_as(&self, other: &FixtureList) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
