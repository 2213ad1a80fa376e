//! Narrow view of a rendered comment row
//!
//! The reconciler only ever talks to rows through `CommentRow`, so the fragile
//! markup assumptions stay in one implementation per markup shape.

/// One rendered comment row. Methods take `&self`: DOM handles are shared.
pub trait CommentRow {
    /// Corpus position the page assigned to this row
    fn position(&self) -> Option<usize>;

    /// Text currently shown as the comment body
    fn body_text(&self) -> Option<String>;

    /// Local reaction state, None when the indicator is missing
    fn is_toggled(&self) -> Option<bool>;

    /// Replace the displayed count; false when there is no count element
    fn write_count(&self, text: &str) -> bool;

    /// Attach diagnostic JSON to the row
    fn annotate(&self, json: &str);
}

/// Parse an index attribute the way the page writes it (plain decimal)
pub fn parse_position(raw: &str) -> Option<usize> {
    raw.trim().parse().ok()
}
