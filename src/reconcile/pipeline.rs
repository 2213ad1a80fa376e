//! Pipeline: one reconciliation cycle per intercepted response
//!
//! ```text
//! payload ─► settings ─► corpus ─► container (cached or located) ─► full pass ─► watcher
//! ```
//!
//! The pipeline owns the watcher slot and the cached container; nothing about
//! the current cycle lives in module-level state. Cycles are serialized by the
//! slot's generation counter: a cycle that was superseded while awaiting the
//! container walks away without touching the page.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use super::engine::{ReconcileStats, Reconciler};
use super::locator::{locate, LocateError, Sleeper};
use super::watcher::{ObserverHandle, WatchSession, WatcherSlot, WatcherState};
use crate::comments::{CorpusBuilder, ShareThreshold, ThreadsResponse};
use crate::config::FixConfig;
use crate::dom::CommentRow;
use crate::settings::{KeyValueStore, SettingsReader};

// =============================================================================
// Host seam
// =============================================================================

/// Everything the pipeline needs from the page
pub trait PageHost {
    type Row: CommentRow;
    type Container: Clone;
    type Observer: ObserverHandle;
    type Store: KeyValueStore + ?Sized;
    type Sleeper: Sleeper + ?Sized;

    fn store(&self) -> &Self::Store;

    fn sleeper(&self) -> &Self::Sleeper;

    /// One lookup attempt for the comment list container
    fn find_list(&self) -> Option<Self::Container>;

    /// False once the page has thrown the container away
    fn is_attached(&self, container: &Self::Container) -> bool;

    fn rows(&self, container: &Self::Container) -> Vec<Self::Row>;

    /// Subscribe to mutations under `container`, dispatching into `session`
    fn observe(
        &self,
        container: &Self::Container,
        session: Rc<WatchSession>,
    ) -> Result<Self::Observer, String>;
}

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub generation: u64,
    pub corpus_len: usize,
    /// Shared-NG level the corpus was filtered with
    pub share_threshold: ShareThreshold,
    /// Container came from the cache instead of a fresh lookup
    pub reused_container: bool,
    pub locate_attempts: u32,
    pub initial: ReconcileStats,
    pub malformed_settings: Vec<String>,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Reconciled(CycleReport),
    /// A newer response started its own cycle first
    Superseded { generation: u64 },
}

// =============================================================================
// Pipeline
// =============================================================================

pub struct Pipeline<H: PageHost> {
    host: H,
    config: FixConfig,
    slot: RefCell<WatcherSlot<H::Observer>>,
    container: RefCell<Option<H::Container>>,
}

impl<H: PageHost> Pipeline<H> {
    pub fn new(host: H, config: FixConfig) -> Self {
        Self {
            host,
            config,
            slot: RefCell::new(WatcherSlot::new()),
            container: RefCell::new(None),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &FixConfig {
        &self.config
    }

    pub fn state(&self) -> WatcherState {
        self.slot.borrow().state()
    }

    pub fn generation(&self) -> u64 {
        self.slot.borrow().generation()
    }

    /// Disconnect the current watcher without starting a new cycle
    pub fn stop(&self) -> bool {
        self.slot.borrow_mut().stop()
    }

    /// Decode a raw response body and run a cycle on it
    pub async fn handle_body(&self, body: &str) -> Result<CycleOutcome, String> {
        let payload = ThreadsResponse::from_json(body)?;
        self.handle_payload(&payload).await
    }

    /// Run one full cycle for a decoded response
    pub async fn handle_payload(&self, payload: &ThreadsResponse) -> Result<CycleOutcome, String> {
        let started = instant::Instant::now();

        // Active → Idle before anything else
        let (generation, cancel) = self.slot.borrow_mut().begin_cycle();

        let snapshot = SettingsReader::new(self.host.store(), &self.config.storage).read();
        let corpus = CorpusBuilder::from_config(&self.config).build(payload.threads(), &snapshot.settings)?;

        let cached = self.cached_container();
        let reused_container = cached.is_some();
        let (container, locate_attempts) = match cached {
            Some(container) => (container, 0),
            None => {
                let located = locate(
                    || self.host.find_list(),
                    self.host.sleeper(),
                    &self.config.retry,
                    &cancel,
                )
                .await;
                match located {
                    Ok(located) => (located.container, located.attempts),
                    Err(LocateError::Cancelled { .. }) => {
                        return Ok(CycleOutcome::Superseded { generation });
                    }
                    Err(e) => return Err(e.to_string()),
                }
            }
        };

        if !self.slot.borrow().is_current(generation) {
            return Ok(CycleOutcome::Superseded { generation });
        }
        *self.container.borrow_mut() = Some(container.clone());

        let reconciler = Reconciler::new(self.config.markup.debug_attribute.is_some());
        let session = Rc::new(WatchSession::new(generation, corpus, reconciler));

        let initial = session.reconcile_all(&self.host.rows(&container));
        let observer = self.host.observe(&container, Rc::clone(&session))?;
        self.slot.borrow_mut().install(generation, observer);

        Ok(CycleOutcome::Reconciled(CycleReport {
            generation: session.generation(),
            corpus_len: session.corpus().len(),
            share_threshold: snapshot.settings.share_threshold,
            reused_container,
            locate_attempts,
            initial,
            malformed_settings: snapshot.malformed_keys,
            elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
        }))
    }

    /// Cached container if the page still has it mounted
    fn cached_container(&self) -> Option<H::Container> {
        let mut cache = self.container.borrow_mut();
        match cache.as_ref() {
            Some(container) if self.host.is_attached(container) => Some(container.clone()),
            Some(_) => {
                *cache = None;
                None
            }
            None => None,
        }
    }
}
