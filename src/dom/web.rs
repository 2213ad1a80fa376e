//! Browser implementation of the page seams (web-sys)
//!
//! - `WebRow`: a `data-index` row element read through `RowMarkup`
//! - `find_list_container`: marker control → N parents up
//! - `WebPage`: `PageHost` over the live document, localStorage and a
//!   `MutationObserver`

use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, MutationObserver, MutationObserverInit, MutationRecord, Storage, Window};

use super::adapter::{parse_position, CommentRow};
use crate::config::{FixConfig, LocatorConfig, RowMarkup};
use crate::reconcile::{MutationEvent, ObserverHandle, PageHost, TimerSleeper, WatchSession};

// =============================================================================
// WebRow
// =============================================================================

#[derive(Debug, Clone)]
pub struct WebRow {
    element: Element,
    markup: Rc<RowMarkup>,
}

impl WebRow {
    pub fn new(element: Element, markup: Rc<RowMarkup>) -> Self {
        Self { element, markup }
    }

    fn text_element(&self, position: u32) -> Option<Element> {
        self.element
            .get_elements_by_tag_name(&self.markup.text_tag)
            .item(position)
    }
}

impl CommentRow for WebRow {
    fn position(&self) -> Option<usize> {
        self.element
            .get_attribute(&self.markup.index_attribute)
            .as_deref()
            .and_then(parse_position)
    }

    fn body_text(&self) -> Option<String> {
        self.text_element(self.markup.body_position)?.text_content()
    }

    fn is_toggled(&self) -> Option<bool> {
        self.element
            .get_elements_by_tag_name(&self.markup.toggle_tag)
            .item(0)
            .map(|icon| icon.class_list().contains(&self.markup.toggle_class))
    }

    fn write_count(&self, text: &str) -> bool {
        let Some(count) = self.text_element(self.markup.count_position) else {
            return false;
        };
        // Skip no-op writes so an idle list stays quiet
        if count.text_content().as_deref() != Some(text) {
            count.set_text_content(Some(text));
        }
        true
    }

    fn annotate(&self, json: &str) {
        if let Some(attribute) = &self.markup.debug_attribute {
            let _ = self.element.set_attribute(attribute, json);
        }
    }
}

/// Current children of the list container as rows
pub fn element_rows(container: &Element, markup: &Rc<RowMarkup>) -> Vec<WebRow> {
    let children = container.children();
    (0..children.length())
        .filter_map(|i| children.item(i))
        .map(|element| WebRow::new(element, Rc::clone(markup)))
        .collect()
}

// =============================================================================
// Locating the list
// =============================================================================

/// One probe: find the marker control by label and climb to the container
pub fn find_list_container(document: &Document, locator: &LocatorConfig) -> Option<Element> {
    let candidates = document.get_elements_by_tag_name(&locator.marker_tag);
    let marker = (0..candidates.length())
        .filter_map(|i| candidates.item(i))
        .find(|el| el.get_attribute("aria-label").as_deref() == Some(locator.marker_label.as_str()))?;

    (0..locator.ancestor_levels).try_fold(marker, |el, _| el.parent_element())
}

// =============================================================================
// Mutation observer
// =============================================================================

type ObserverCallback = Closure<dyn FnMut(js_sys::Array, MutationObserver)>;

/// Live `MutationObserver` plus the closure it calls into
pub struct WebObserver {
    observer: MutationObserver,
    _callback: ObserverCallback,
}

impl ObserverHandle for WebObserver {
    fn disconnect(&self) {
        self.observer.disconnect();
    }
}

fn to_event(record: &MutationRecord, markup: &Rc<RowMarkup>) -> MutationEvent<WebRow> {
    match record.type_().as_str() {
        "childList" => {
            let nodes = record.added_nodes();
            let rows = (0..nodes.length())
                .filter_map(|i| nodes.item(i))
                .filter_map(|node| node.dyn_into::<Element>().ok())
                .map(|element| WebRow::new(element, Rc::clone(markup)))
                .collect();
            MutationEvent::ChildList(rows)
        }
        "attributes" => MutationEvent::Attribute,
        _ => MutationEvent::CharacterData,
    }
}

/// Best-effort message out of a thrown JS value
pub fn js_error_message(err: &JsValue) -> String {
    if let Some(message) = err.as_string() {
        return message;
    }
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{:?}", err)
}

// =============================================================================
// WebPage
// =============================================================================

pub struct WebPage {
    document: Document,
    /// None when the page refuses localStorage (blocked cookies, sandboxed frame)
    storage: Option<Storage>,
    sleeper: TimerSleeper,
    locator: LocatorConfig,
    markup: Rc<RowMarkup>,
}

impl WebPage {
    pub fn new(window: &Window, config: &FixConfig) -> Result<Self, String> {
        let document = window.document().ok_or("No document on window")?;
        // Accessing `localStorage` itself throws when storage is blocked
        let storage = window.local_storage().ok().flatten();

        Ok(Self {
            document,
            storage,
            sleeper: TimerSleeper,
            locator: config.locator.clone(),
            markup: Rc::new(config.markup.clone()),
        })
    }

    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }
}

impl PageHost for WebPage {
    type Row = WebRow;
    type Container = Element;
    type Observer = WebObserver;
    type Store = Option<Storage>;
    type Sleeper = TimerSleeper;

    fn store(&self) -> &Option<Storage> {
        &self.storage
    }

    fn sleeper(&self) -> &TimerSleeper {
        &self.sleeper
    }

    fn find_list(&self) -> Option<Element> {
        find_list_container(&self.document, &self.locator)
    }

    fn is_attached(&self, container: &Element) -> bool {
        container.is_connected()
    }

    fn rows(&self, container: &Element) -> Vec<WebRow> {
        element_rows(container, &self.markup)
    }

    fn observe(&self, container: &Element, session: Rc<WatchSession>) -> Result<WebObserver, String> {
        let markup = Rc::clone(&self.markup);
        let list = container.clone();

        let callback: ObserverCallback = Closure::wrap(Box::new(move |records: js_sys::Array, _: MutationObserver| {
            let events = records
                .iter()
                .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
                .map(|record| to_event(&record, &markup))
                .collect();
            session.dispatch(events, || element_rows(&list, &markup));
        }) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| format!("Failed to create MutationObserver: {}", js_error_message(&e)))?;

        // Only the icon's attribute is watched; the reconciler writes text and
        // its own debug attribute, neither of which may wake this observer.
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_attributes(true);
        options.set_subtree(true);
        options.set_attribute_filter(&js_sys::Array::of1(&JsValue::from_str(&self.markup.watched_attribute)));

        observer
            .observe_with_options(container, &options)
            .map_err(|e| format!("Failed to observe comment list: {}", js_error_message(&e)))?;

        Ok(WebObserver {
            observer,
            _callback: callback,
        })
    }
}
