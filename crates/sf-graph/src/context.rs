//! Audio context lifecycle
//!
//! ```text
//!   Suspended ──start()/resume()──▶ Running ──close()──▶ Closed
//!       ▲                             │
//!       └──── engine / suspend() ─────┘
//! ```
//!
//! Entering `Suspended` fires every cleanup listener, so playing voices and
//! probe tones never survive a suspend/resume cycle. `Closed` is terminal.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::AudioBackend;

/// Lifecycle state of the engine's audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

impl ContextState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suspended => "suspended",
            Self::Running => "running",
            Self::Closed => "closed",
        }
    }
}

/// Handle returned by listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type StateCallback = Arc<dyn Fn(ContextState) + Send + Sync>;
type CleanupCallback = Arc<dyn Fn() + Send + Sync>;

struct ContextInner {
    state: ContextState,
    started: bool,
    next_listener: u64,
    state_listeners: Vec<(ListenerId, StateCallback)>,
    cleanup_listeners: Vec<(ListenerId, CleanupCallback)>,
}

/// Wraps the engine's start/suspend/resume/close and broadcasts changes
pub struct ContextManager {
    backend: Arc<dyn AudioBackend>,
    inner: Mutex<ContextInner>,
    poll_interval: Duration,
}

impl ContextManager {
    pub fn new(backend: Arc<dyn AudioBackend>, poll_interval: Duration) -> Self {
        let state = backend.context_state();
        Self {
            backend,
            inner: Mutex::new(ContextInner {
                state,
                started: false,
                next_listener: 1,
                state_listeners: Vec::new(),
                cleanup_listeners: Vec::new(),
            }),
            poll_interval,
        }
    }

    pub fn state(&self) -> ContextState {
        self.inner.lock().state
    }

    /// `start()` has completed at least once
    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    /// Running, and started by us at least once
    pub fn is_valid(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == ContextState::Running && inner.started
    }

    /// Unlock audio. Idempotent: an already running context succeeds at once.
    pub async fn start(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                ContextState::Running => {
                    inner.started = true;
                    return true;
                }
                ContextState::Closed => {
                    log::warn!("Cannot start audio context: already closed");
                    return false;
                }
                ContextState::Suspended => {}
            }
        }

        match self.backend.resume().await {
            Ok(()) => {
                self.inner.lock().started = true;
                self.transition(ContextState::Running);
                log::info!("Audio context started");
                true
            }
            Err(e) => {
                log::error!("Failed to start audio context: {}", e);
                false
            }
        }
    }

    /// Resume a suspended context
    pub async fn resume(&self) -> bool {
        match self.state() {
            ContextState::Running => return true,
            ContextState::Closed => {
                log::warn!("Cannot resume audio context: already closed");
                return false;
            }
            ContextState::Suspended => {}
        }

        match self.backend.resume().await {
            Ok(()) => {
                self.transition(ContextState::Running);
                true
            }
            Err(e) => {
                log::error!("Failed to resume audio context: {}", e);
                false
            }
        }
    }

    pub fn suspend(&self) -> bool {
        if self.state() == ContextState::Closed {
            return false;
        }
        match self.backend.suspend() {
            Ok(()) => {
                self.transition(ContextState::Suspended);
                true
            }
            Err(e) => {
                log::error!("Failed to suspend audio context: {}", e);
                false
            }
        }
    }

    pub fn close(&self) -> bool {
        if self.state() == ContextState::Closed {
            return true;
        }
        match self.backend.close() {
            Ok(()) => {
                self.transition(ContextState::Closed);
                true
            }
            Err(e) => {
                log::error!("Failed to close audio context: {}", e);
                false
            }
        }
    }

    /// Feed a state change the engine made on its own (e.g. an OS interruption)
    pub fn handle_engine_state_change(&self, state: ContextState) {
        self.transition(state);
    }

    /// Pull the engine's current state and apply it if it moved
    pub fn sync_with_engine(&self) {
        let engine_state = self.backend.context_state();
        if engine_state != self.state() {
            self.transition(engine_state);
        }
    }

    /// Resolve once the context is valid. Polls with no deadline; wrap in
    /// `tokio::time::timeout` if one is needed.
    pub async fn wait_for_ready(&self) {
        loop {
            self.sync_with_engine();
            if self.is_valid() {
                return;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub fn on_state_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(ContextState) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.state_listeners.push((id, Arc::new(callback)));
        id
    }

    pub fn on_cleanup<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.cleanup_listeners.push((id, Arc::new(callback)));
        id
    }

    /// Unregister a state-change or cleanup listener
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.state_listeners.len() + inner.cleanup_listeners.len();
        inner.state_listeners.retain(|(l, _)| *l != id);
        inner.cleanup_listeners.retain(|(l, _)| *l != id);
        before != inner.state_listeners.len() + inner.cleanup_listeners.len()
    }

    fn transition(&self, new_state: ContextState) {
        let (state_callbacks, cleanup_callbacks) = {
            let mut inner = self.inner.lock();
            let old = inner.state;
            if old == new_state {
                return;
            }
            if old == ContextState::Closed {
                log::warn!("Ignoring transition {:?} -> {:?}", old, new_state);
                return;
            }
            inner.state = new_state;
            log::info!("Audio context: {} -> {}", old.as_str(), new_state.as_str());

            let cleanup: Vec<CleanupCallback> = if new_state == ContextState::Suspended {
                inner
                    .cleanup_listeners
                    .iter()
                    .map(|(_, cb)| cb.clone())
                    .collect()
            } else {
                Vec::new()
            };
            let state: Vec<StateCallback> = inner
                .state_listeners
                .iter()
                .map(|(_, cb)| cb.clone())
                .collect();
            (state, cleanup)
        };

        // Listeners run outside the lock; they may query the manager.
        for cb in cleanup_callbacks {
            if catch_unwind(AssertUnwindSafe(|| cb())).is_err() {
                log::error!("Context cleanup listener panicked");
            }
        }
        for cb in state_callbacks {
            if catch_unwind(AssertUnwindSafe(|| cb(new_state))).is_err() {
                log::error!("Context state listener panicked");
            }
        }
    }
}
