//! NicoruFix: corrects the nicoru count shown on the watch page comment list
//!
//! The page renders a comment list whose nicoru counts can be stale, and does
//! not account for the viewer's own nicoru. This crate intercepts the comment
//! API response, rebuilds the list's backing order, and rewrites each visible
//! row's count as rows are added or toggled.
//!
//! # Architecture
//!
//! ## Data
//! - `config.rs` - FixConfig: endpoint, storage keys, locator/retry, row markup
//! - `comments/` - payload model, NG filtering, CorpusBuilder
//! - `settings/` - SettingsReader over localStorage (or any `KeyValueStore`)
//!
//! ## Page
//! - `dom/` - `CommentRow` adapter and the web-sys implementation (`WebPage`)
//! - `reconcile/engine.rs` - Reconciler: per-row count correction
//! - `reconcile/locator.rs` - locate(): polls for the list container
//! - `reconcile/watcher.rs` - WatcherSlot + mutation dispatch
//! - `reconcile/pipeline.rs` - Pipeline: one cycle per intercepted response
//! - `intercept.rs` - FetchShim: wraps `window.fetch`
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { install } from 'nicoru-fix';
//!
//! await init();
//!
//! // Defaults target the current watch page; any field can be overridden
//! const fix = install({ retry: { maxAttempts: 120 } });
//!
//! fix.isWatching();   // true once the list is found and reconciled
//! fix.generation();   // number of cycles started so far
//! ```

pub mod config;
pub mod comments;
pub mod settings;
pub mod dom;
pub mod reconcile;
pub mod intercept;

pub use comments::*;
pub use config::*;
pub use reconcile::*;
pub use settings::*;

use std::cell::Cell;
use std::rc::Rc;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::dom::WebPage;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

thread_local! {
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

// =============================================================================
// Installation
// =============================================================================

/// Handle to the installed fix
#[wasm_bindgen]
pub struct NicoruFix {
    pipeline: Rc<Pipeline<WebPage>>,
}

#[wasm_bindgen]
impl NicoruFix {
    /// Whether an observer is currently attached to the comment list
    #[wasm_bindgen(js_name = isWatching)]
    pub fn is_watching(&self) -> bool {
        self.pipeline.state() == WatcherState::Active
    }

    /// Cycles started since install
    pub fn generation(&self) -> u64 {
        self.pipeline.generation()
    }

    /// `"idle"` or `"active"`
    pub fn state(&self) -> String {
        self.pipeline.state().to_string()
    }

    /// Disconnect the current observer. The next comment response starts a
    /// fresh cycle as usual.
    pub fn stop(&self) -> bool {
        self.pipeline.stop()
    }
}

/// Install the fetch shim on the current window
///
/// # Arguments
/// * `config` - partial `FixConfig` object, or `undefined` for defaults
#[wasm_bindgen]
pub fn install(config: JsValue) -> Result<NicoruFix, JsValue> {
    if INSTALLED.with(|flag| flag.get()) {
        return Err(JsValue::from_str("NicoruFix is already installed"));
    }

    let config = parse_config(config)?;
    config.validate().map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?;

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window available"))?;
    let page = WebPage::new(&window, &config).map_err(|e| JsValue::from_str(&e))?;
    if !page.has_storage() {
        web_sys::console::warn_1(&"[NicoruFix] localStorage unavailable, NG settings default to none".into());
    }
    let pipeline = Rc::new(Pipeline::new(page, config));

    intercept::install_fetch_shim(&window, Rc::clone(&pipeline))?;
    INSTALLED.with(|flag| flag.set(true));

    web_sys::console::log_1(
        &format!(
            "[NicoruFix] Watching {} (tie-break {}, {})",
            pipeline.config().api_url,
            pipeline.config().tie_break,
            version()
        )
        .into(),
    );

    Ok(NicoruFix { pipeline })
}

fn parse_config(config: JsValue) -> Result<FixConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(FixConfig::default());
    }
    serde_wasm_bindgen::from_value(config)
        .map_err(|e| JsValue::from_str(&format!("Invalid config input: {}", e)))
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Build the corpus for a comment API payload without touching the page
///
/// # Arguments
/// * `payload` - the decoded `/v1/threads` response
/// * `settings` - optional `NgSettings` (`{ shareThreshold, blockedUserIds, blockedWords }`)
#[wasm_bindgen(js_name = buildCorpus)]
pub fn build_corpus(payload: JsValue, settings: JsValue) -> Result<JsValue, JsValue> {
    // Round-trip through JSON so unknown comment fields survive intact
    let json = js_sys::JSON::stringify(&payload)
        .map_err(|e| JsValue::from_str(&format!("Invalid payload input: {}", dom::js_error_message(&e))))?
        .as_string()
        .ok_or_else(|| JsValue::from_str("Invalid payload input: not JSON-serializable"))?;
    let payload = ThreadsResponse::from_json(&json).map_err(|e| JsValue::from_str(&e))?;

    let settings: NgSettings = if settings.is_undefined() || settings.is_null() {
        NgSettings::default()
    } else {
        serde_wasm_bindgen::from_value(settings)
            .map_err(|e| JsValue::from_str(&format!("Invalid settings input: {}", e)))?
    };

    let corpus = CorpusBuilder::new()
        .build(payload.threads(), &settings)
        .map_err(|e| JsValue::from_str(&e))?;

    corpus
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize corpus: {}", e)))
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("nicoru-fix v{}", env!("CARGO_PKG_VERSION"))
}
