//! Immutable system snapshots
//!
//! The manager hands out `Arc<AudioSystemState>`. An update builds a fresh
//! snapshot from the current one plus the fields present in the
//! [`StateUpdate`], so a snapshot a caller holds never changes underneath it.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sf_core::{Listener, MixerConfig, Vec3};
use sf_graph::{
    ContextState, EffectConfig, EffectType, GlobalEffect, SoundSource, SpatialMixer, SynthKind,
};

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub id: String,
    pub kind: SynthKind,
    pub position: Vec3,
    pub playing: bool,
    pub dry_level: f64,
    /// Send level per effect id
    pub sends: BTreeMap<String, f64>,
}

impl From<&SoundSource> for SourceSnapshot {
    fn from(source: &SoundSource) -> Self {
        Self {
            id: source.id().to_string(),
            kind: source.kind(),
            position: source.position(),
            playing: source.is_playing(),
            dry_level: source.dry_level(),
            sends: source
                .sends()
                .map(|(id, send)| (id.to_string(), send.level))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSnapshot {
    pub id: String,
    pub effect_type: EffectType,
    pub position: Vec3,
    pub radius: f64,
    pub has_probe: bool,
    pub config: EffectConfig,
}

impl From<&GlobalEffect> for EffectSnapshot {
    fn from(effect: &GlobalEffect) -> Self {
        Self {
            id: effect.id().to_string(),
            effect_type: effect.effect_type(),
            position: effect.position(),
            radius: effect.radius(),
            has_probe: effect.probe().is_some(),
            config: effect.config().clone(),
        }
    }
}

/// Aggregate view of the whole mixer at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSystemState {
    pub sources: BTreeMap<String, SourceSnapshot>,
    pub effects: BTreeMap<String, EffectSnapshot>,
    pub listener: Listener,
    pub context_state: ContextState,
    pub initialized: bool,
    pub captured_at: DateTime<Utc>,
}

impl Default for AudioSystemState {
    fn default() -> Self {
        Self {
            sources: BTreeMap::new(),
            effects: BTreeMap::new(),
            listener: Listener::default(),
            context_state: ContextState::Suspended,
            initialized: false,
            captured_at: Utc::now(),
        }
    }
}

impl AudioSystemState {
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len()
    }

    pub fn playing_count(&self) -> usize {
        self.sources.values().filter(|s| s.playing).count()
    }
}

/// Partial update; absent fields keep their current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub sources: Option<BTreeMap<String, SourceSnapshot>>,
    pub effects: Option<BTreeMap<String, EffectSnapshot>>,
    pub listener: Option<Listener>,
    pub context_state: Option<ContextState>,
    pub initialized: Option<bool>,
}

impl StateUpdate {
    /// Sources, effects and listener as the mixer holds them now
    pub fn from_mixer(mixer: &SpatialMixer) -> Self {
        Self {
            sources: Some(
                mixer
                    .sources()
                    .map(|s| (s.id().to_string(), SourceSnapshot::from(s)))
                    .collect(),
            ),
            effects: Some(
                mixer
                    .effects()
                    .map(|e| (e.id().to_string(), EffectSnapshot::from(e)))
                    .collect(),
            ),
            listener: Some(mixer.listener()),
            ..Default::default()
        }
    }

    pub fn context(mut self, state: ContextState) -> Self {
        self.context_state = Some(state);
        self
    }

    pub fn initialized(mut self, initialized: bool) -> Self {
        self.initialized = Some(initialized);
        self
    }
}

/// Result of [`StateManager::validate_state`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl StateValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Counters reported by the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub source_count: usize,
    pub effect_count: usize,
    pub playing_count: usize,
    pub send_count: usize,
    pub command_history: usize,
    pub queued_commands: usize,
    pub state_history: usize,
    pub subscribers: usize,
    pub context_state: Option<ContextState>,
    pub initialized: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Handle returned by [`StateManager::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&Arc<AudioSystemState>) + Send + Sync>;

struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Subscriber)>,
}

pub struct StateManager {
    current: RwLock<Arc<AudioSystemState>>,
    history: Mutex<VecDeque<Arc<AudioSystemState>>>,
    history_limit: usize,
    subscribers: Mutex<Subscribers>,
    source_warning_threshold: usize,
    effect_warning_threshold: usize,
}

impl StateManager {
    pub fn new(
        history_limit: usize,
        source_warning_threshold: usize,
        effect_warning_threshold: usize,
    ) -> Self {
        Self {
            current: RwLock::new(Arc::new(AudioSystemState::default())),
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit,
            subscribers: Mutex::new(Subscribers {
                next_id: 1,
                entries: Vec::new(),
            }),
            source_warning_threshold,
            effect_warning_threshold,
        }
    }

    pub fn from_config(config: &MixerConfig) -> Self {
        Self::new(
            config.state_history_limit,
            config.source_warning_threshold,
            config.effect_warning_threshold,
        )
    }

    /// Current snapshot
    pub fn state(&self) -> Arc<AudioSystemState> {
        self.current.read().clone()
    }

    /// Merge `update` into a new snapshot, archive the old one and notify
    /// every subscriber with the result
    pub fn update_state(&self, update: StateUpdate) -> Arc<AudioSystemState> {
        let next = {
            let mut current = self.current.write();
            let prev = current.clone();
            let next = Arc::new(AudioSystemState {
                sources: update.sources.unwrap_or_else(|| prev.sources.clone()),
                effects: update.effects.unwrap_or_else(|| prev.effects.clone()),
                listener: update.listener.unwrap_or(prev.listener),
                context_state: update.context_state.unwrap_or(prev.context_state),
                initialized: update.initialized.unwrap_or(prev.initialized),
                captured_at: Utc::now(),
            });
            *current = next.clone();

            if self.history_limit > 0 {
                let mut history = self.history.lock();
                while history.len() >= self.history_limit {
                    history.pop_front();
                }
                history.push_back(prev);
            }
            next
        };

        self.notify(&next);
        next
    }

    fn notify(&self, state: &Arc<AudioSystemState>) {
        let subscribers: Vec<(SubscriptionId, Subscriber)> =
            self.subscribers.lock().entries.clone();
        for (id, subscriber) in subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(state))).is_err() {
                log::error!("State subscriber {:?} panicked", id);
            }
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Arc<AudioSystemState>) + Send + Sync + 'static,
    {
        let mut subs = self.subscribers.lock();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.entries.push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.entries.len();
        subs.entries.retain(|(s, _)| *s != id);
        subs.entries.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().entries.len()
    }

    /// Snapshot that preceded the current one
    pub fn previous_state(&self) -> Option<Arc<AudioSystemState>> {
        self.history.lock().back().cloned()
    }

    /// Archived snapshots, oldest first
    pub fn history(&self) -> Vec<Arc<AudioSystemState>> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn clear_history(&self) {
        self.history.lock().clear();
    }

    pub fn validate_state(&self) -> StateValidation {
        let state = self.state();
        let mut validation = StateValidation::default();

        let listener = &state.listener;
        for (name, v) in [
            ("position", listener.position),
            ("forward", listener.forward),
            ("up", listener.up),
        ] {
            if !v.is_finite() {
                validation
                    .errors
                    .push(format!("Listener {} is not finite: {:?}", name, v));
            }
        }

        if state.source_count() > self.source_warning_threshold {
            validation.warnings.push(format!(
                "{} sound sources exceed the recommended {}",
                state.source_count(),
                self.source_warning_threshold
            ));
        }
        if state.effect_count() > self.effect_warning_threshold {
            validation.warnings.push(format!(
                "{} global effects exceed the recommended {}",
                state.effect_count(),
                self.effect_warning_threshold
            ));
        }
        for source in state.sources.values() {
            if !source.position.is_finite() {
                validation
                    .errors
                    .push(format!("Source '{}' has a non-finite position", source.id));
            }
        }
        validation
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::from_config(&MixerConfig::default())
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("history", &self.history_len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn source(id: &str, x: f64) -> SourceSnapshot {
        SourceSnapshot {
            id: id.to_string(),
            kind: SynthKind::Synth,
            position: Vec3::new(x, 0.0, 0.0),
            playing: false,
            dry_level: 1.0,
            sends: BTreeMap::new(),
        }
    }

    fn with_sources(sources: &[SourceSnapshot]) -> StateUpdate {
        StateUpdate {
            sources: Some(sources.iter().map(|s| (s.id.clone(), s.clone())).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshots_are_never_mutated() {
        let manager = StateManager::default();
        let first = manager.update_state(with_sources(&[source("a", 1.0)]));
        let second = manager.update_state(with_sources(&[source("a", 9.0), source("b", 2.0)]));

        assert_eq!(first.sources.len(), 1);
        assert_eq!(first.sources["a"].position.x, 1.0);
        assert_eq!(second.sources.len(), 2);
        assert_eq!(second.sources["a"].position.x, 9.0);
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let manager = StateManager::default();
        manager.update_state(with_sources(&[source("a", 1.0)]));
        let next = manager.update_state(StateUpdate::default().context(ContextState::Running));

        assert_eq!(next.context_state, ContextState::Running);
        assert_eq!(next.sources.len(), 1);
        assert!(!next.initialized);
    }

    #[test]
    fn test_history_is_bounded() {
        let manager = StateManager::new(3, 50, 20);
        for i in 0..6 {
            manager.update_state(with_sources(&[source("a", i as f64)]));
        }
        assert_eq!(manager.history_len(), 3);
        let history = manager.history();
        assert_eq!(history[0].sources["a"].position.x, 2.0);
        assert_eq!(manager.previous_state().unwrap().sources["a"].position.x, 4.0);

        manager.clear_history();
        assert!(manager.previous_state().is_none());
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let manager = StateManager::default();
        let calls = Arc::new(AtomicUsize::new(0));

        manager.subscribe(|_| panic!("subscriber failure"));
        let seen = calls.clone();
        manager.subscribe(move |state| {
            assert_eq!(state.source_count(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        manager.update_state(with_sources(&[source("a", 0.0)]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let manager = StateManager::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let id = manager.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        manager.update_state(StateUpdate::default());
        assert!(manager.unsubscribe(id));
        assert!(!manager.unsubscribe(id));
        manager.update_state(StateUpdate::default());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(manager.subscriber_count(), 0);
    }

    #[test]
    fn test_validation() {
        let manager = StateManager::new(20, 2, 20);
        assert!(manager.validate_state().is_valid());

        let bad_listener = Listener::new(
            Vec3::new(f64::NAN, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
        manager.update_state(StateUpdate {
            listener: Some(bad_listener),
            ..with_sources(&[source("a", 0.0), source("b", 0.0), source("c", 0.0)])
        });

        let validation = manager.validate_state();
        assert!(!validation.is_valid());
        assert_eq!(validation.errors.len(), 1);
        assert_eq!(validation.warnings.len(), 1);
        assert!(validation.warnings[0].contains("3 sound sources"));
    }

    #[test]
    fn test_state_serializes() {
        let manager = StateManager::default();
        let state = manager.update_state(with_sources(&[source("a", 1.0)]));
        let json = serde_json::to_value(state.as_ref()).unwrap();
        assert_eq!(json["context_state"], "suspended");
        assert_eq!(json["sources"]["a"]["kind"], "synth");
    }
}
