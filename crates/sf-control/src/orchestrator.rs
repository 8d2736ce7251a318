//! Audio Orchestrator
//!
//! Single entry point for callers: runs commands against the shared mixer,
//! keeps the undo history, drains the deferred command queue and republishes
//! the system snapshot after every change.
//!
//! ```text
//!   caller ──▶ execute_command ──▶ Command ──▶ SpatialMixer
//!                    │                              │
//!                    └── history ◀── success        ▼
//!                                          StateManager ──▶ subscribers
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use sf_core::{Listener, MixerConfig, ParameterUpdateResult, Vec3};
use sf_graph::{
    AudioBackend, ContextManager, ContextState, EffectPatch, EffectType, ListenerId,
    SpatialMixer, SynthConfig, SynthPatch,
};

use crate::{
    AudioSystemState, Command, CommandHistory, CommandResult, ControlError,
    CreateGlobalEffectCommand, CreateSoundSourceCommand, RemoveSoundSourceCommand, SfResult,
    SharedMixer, StateManager, StateUpdate, StateValidation, SubscriptionId, SystemStats,
};

/// Clears the queue-processing flag however the drain ends
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AudioOrchestrator {
    config: MixerConfig,
    mixer: SharedMixer,
    context: Arc<ContextManager>,
    state: Arc<StateManager>,
    history: Mutex<CommandHistory>,
    queue: Mutex<VecDeque<Box<dyn Command>>>,
    processing: AtomicBool,
    initialized: Arc<AtomicBool>,
    shut_down: AtomicBool,
    context_listeners: Mutex<Vec<ListenerId>>,
}

impl AudioOrchestrator {
    pub fn new(backend: Arc<dyn AudioBackend>, config: MixerConfig) -> SfResult<Self> {
        config.validate()?;

        let mixer: SharedMixer = Arc::new(RwLock::new(SpatialMixer::new(
            backend.clone(),
            config.clone(),
        )));
        let context = Arc::new(ContextManager::new(
            backend,
            Duration::from_millis(config.context_poll_interval_ms),
        ));
        let state = Arc::new(StateManager::from_config(&config));
        let initialized = Arc::new(AtomicBool::new(false));

        let orchestrator = Self {
            history: Mutex::new(CommandHistory::new(config.command_history_limit)),
            config,
            mixer,
            context,
            state,
            queue: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            initialized,
            shut_down: AtomicBool::new(false),
            context_listeners: Mutex::new(Vec::new()),
        };
        orchestrator.register_context_listeners();
        orchestrator.refresh_state();
        Ok(orchestrator)
    }

    fn register_context_listeners(&self) {
        let weak_mixer = Arc::downgrade(&self.mixer);
        let cleanup = self.context.on_cleanup(move || {
            if let Some(mixer) = weak_mixer.upgrade() {
                let mut mixer = mixer.write();
                let stopped = mixer.stop_all_sounds();
                mixer.silence_probes();
                log::info!("Audio suspended: stopped {} sources", stopped);
            }
        });

        let weak_mixer = Arc::downgrade(&self.mixer);
        let state = self.state.clone();
        let initialized = self.initialized.clone();
        let on_change = self.context.on_state_change(move |context_state| {
            let Some(mixer) = weak_mixer.upgrade() else {
                return;
            };
            let update = {
                let mut mixer = mixer.write();
                if context_state == ContextState::Running {
                    mixer.unsilence_probes();
                }
                StateUpdate::from_mixer(&mixer)
            };
            state.update_state(
                update
                    .context(context_state)
                    .initialized(initialized.load(Ordering::Acquire)),
            );
        });

        self.context_listeners.lock().extend([cleanup, on_change]);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    /// Shared mixer, for building commands
    pub fn mixer(&self) -> SharedMixer {
        self.mixer.clone()
    }

    pub fn context(&self) -> &Arc<ContextManager> {
        &self.context
    }

    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn can_undo(&self) -> bool {
        !self.history.lock().is_empty()
    }

    pub fn undo_name(&self) -> Option<String> {
        self.history.lock().last_name().map(str::to_string)
    }

    pub fn queued_commands(&self) -> usize {
        self.queue.lock().len()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════

    /// Start the audio context; the orchestrator is initialized on success
    pub async fn start(&self) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            log::warn!("Cannot start a shut down orchestrator");
            return false;
        }
        let started = self.context.start().await;
        if started {
            self.initialized.store(true, Ordering::Release);
            log::info!("Audio orchestrator started");
        }
        self.refresh_state();
        started
    }

    /// Stop every sound, tear down the graph, close the context
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let mut mixer = self.mixer.write();
            mixer.stop_all_sounds();
            mixer.clear();
        }
        for id in self.context_listeners.lock().drain(..) {
            self.context.remove_listener(id);
        }
        self.context.close();
        self.queue.lock().clear();
        self.history.lock().clear();
        self.initialized.store(false, Ordering::Release);
        self.refresh_state();
        log::info!("Audio orchestrator shut down");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMMANDS
    // ═══════════════════════════════════════════════════════════════════════

    /// Run one command; successful commands enter the undo history
    pub fn execute_command(&self, mut command: Box<dyn Command>) -> CommandResult {
        if self.shut_down.load(Ordering::Acquire) {
            return CommandResult::failed(command.as_ref(), ControlError::ShutDown);
        }
        match command.execute() {
            Ok(true) => {
                let result = CommandResult::succeeded(command.as_ref());
                log::debug!("{} ({})", result.message, result.command_id);
                self.history.lock().push(command);
                self.refresh_state();
                result
            }
            Ok(false) => {
                log::debug!("{} had nothing to do", command.name());
                CommandResult::not_applied(command.as_ref())
            }
            Err(e) => {
                log::error!("{} failed: {}", command.name(), e);
                CommandResult::failed(command.as_ref(), e)
            }
        }
    }

    /// Run commands in order; a failure does not stop the rest
    pub async fn execute_command_batch(
        &self,
        commands: Vec<Box<dyn Command>>,
    ) -> Vec<CommandResult> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            results.push(self.execute_command(command));
            tokio::task::yield_now().await;
        }
        results
    }

    /// Defer a command; returns the queue length
    pub fn queue_command(&self, command: Box<dyn Command>) -> usize {
        let mut queue = self.queue.lock();
        queue.push_back(command);
        queue.len()
    }

    /// Drain the queue in order, yielding between commands
    ///
    /// A second drain while one is running fails with `QueueBusy`.
    pub async fn process_command_queue(&self) -> SfResult<Vec<CommandResult>> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ControlError::ShutDown);
        }
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Command queue is already being processed");
            return Err(ControlError::QueueBusy);
        }
        let _guard = DrainGuard(&self.processing);

        let mut results = Vec::new();
        loop {
            let next = self.queue.lock().pop_front();
            let Some(command) = next else {
                break;
            };
            results.push(self.execute_command(command));
            tokio::task::yield_now().await;
        }
        Ok(results)
    }

    /// Undo the most recent command
    ///
    /// The entry is consumed even when its undo fails.
    pub fn undo_last_command(&self) -> bool {
        let Some(mut command) = self.history.lock().pop() else {
            log::debug!("Nothing to undo");
            return false;
        };
        match command.undo() {
            Ok(true) => {
                log::info!("Undid {}", command.name());
                self.refresh_state();
                true
            }
            Ok(false) => {
                log::warn!("{} cannot be undone", command.name());
                false
            }
            Err(e) => {
                log::error!("Undo of {} failed: {}", command.name(), e);
                false
            }
        }
    }

    // ── Command shorthands ───────────────────────────────────────────────

    pub fn create_sound_source(
        &self,
        id: &str,
        config: SynthConfig,
        position: Vec3,
    ) -> CommandResult {
        self.execute_command(Box::new(CreateSoundSourceCommand::new(
            self.mixer(),
            id,
            config,
            position,
        )))
    }

    pub fn remove_sound_source(&self, id: &str) -> CommandResult {
        self.execute_command(Box::new(RemoveSoundSourceCommand::new(self.mixer(), id)))
    }

    pub fn create_global_effect(
        &self,
        id: &str,
        effect_type: EffectType,
        position: Vec3,
    ) -> CommandResult {
        self.execute_command(Box::new(CreateGlobalEffectCommand::new(
            self.mixer(),
            id,
            effect_type,
            position,
        )))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DIRECT OPERATIONS (not recorded for undo)
    // ═══════════════════════════════════════════════════════════════════════

    pub fn remove_global_effect(&self, id: &str) -> bool {
        let removed = self.mixer.write().remove_global_effect(id);
        if removed {
            self.refresh_state();
        }
        removed
    }

    pub fn update_global_effect(
        &self,
        id: &str,
        patch: &EffectPatch,
    ) -> SfResult<ParameterUpdateResult> {
        let result = self.mixer.write().update_global_effect(id, patch)?;
        self.refresh_state();
        Ok(result)
    }

    pub fn update_sound_params(
        &self,
        id: &str,
        patch: &SynthPatch,
    ) -> SfResult<ParameterUpdateResult> {
        let result = self.mixer.write().update_sound_params(id, patch)?;
        self.refresh_state();
        Ok(result)
    }

    pub fn update_sound_position(&self, id: &str, position: Vec3) -> SfResult<()> {
        self.mixer.write().update_sound_position(id, position)?;
        self.refresh_state();
        Ok(())
    }

    pub fn update_effect_zone_position(&self, id: &str, position: Vec3) -> SfResult<()> {
        self.mixer.write().update_effect_zone_position(id, position)?;
        self.refresh_state();
        Ok(())
    }

    pub fn set_effect_zone_radius(&self, id: &str, radius: f64) -> SfResult<()> {
        self.mixer.write().set_effect_zone_radius(id, radius)?;
        self.refresh_state();
        Ok(())
    }

    pub fn update_listener(&self, listener: Listener) -> SfResult<()> {
        self.mixer.write().update_listener(listener)?;
        self.refresh_state();
        Ok(())
    }

    pub fn play_sound(&self, id: &str) -> SfResult<()> {
        self.mixer.write().play_sound(id)?;
        self.refresh_state();
        Ok(())
    }

    pub fn stop_sound(&self, id: &str) -> SfResult<()> {
        self.mixer.write().stop_sound(id)?;
        self.refresh_state();
        Ok(())
    }

    pub fn stop_all_sounds(&self) -> usize {
        let stopped = self.mixer.write().stop_all_sounds();
        self.refresh_state();
        stopped
    }

    /// Re-sweep an effect's probe tone; `false` if it has none
    pub fn refresh_probe(&self, id: &str) -> bool {
        self.mixer.read().refresh_probe(id)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATE
    // ═══════════════════════════════════════════════════════════════════════

    /// Publish a fresh snapshot of the mixer and context
    pub fn refresh_state(&self) -> Arc<AudioSystemState> {
        let update = StateUpdate::from_mixer(&self.mixer.read());
        self.state.update_state(
            update
                .context(self.context.state())
                .initialized(self.is_initialized()),
        )
    }

    pub fn get_system_state(&self) -> Arc<AudioSystemState> {
        self.state.state()
    }

    pub fn get_system_stats(&self) -> SystemStats {
        let send_count = self.mixer.read().sources().map(|s| s.send_count()).sum();
        let state = self.state.state();
        SystemStats {
            source_count: state.source_count(),
            effect_count: state.effect_count(),
            playing_count: state.playing_count(),
            send_count,
            command_history: self.history_len(),
            queued_commands: self.queued_commands(),
            state_history: self.state.history_len(),
            subscribers: self.state.subscriber_count(),
            context_state: Some(self.context.state()),
            initialized: self.is_initialized(),
        }
    }

    pub fn validate_state(&self) -> StateValidation {
        self.state.validate_state()
    }

    pub fn subscribe_to_state_changes<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Arc<AudioSystemState>) + Send + Sync + 'static,
    {
        self.state.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state.unsubscribe(id)
    }
}

impl Drop for AudioOrchestrator {
    fn drop(&mut self) {
        for id in self.context_listeners.get_mut().drain(..) {
            self.context.remove_listener(id);
        }
    }
}

impl std::fmt::Debug for AudioOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOrchestrator")
            .field("mixer", &*self.mixer.read())
            .field("context", &self.context.state())
            .field("history", &self.history_len())
            .field("queued", &self.queued_commands())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_graph::{OfflineBackend, SynthKind};

    fn orchestrator() -> (Arc<OfflineBackend>, AudioOrchestrator) {
        let backend = Arc::new(OfflineBackend::new());
        let orch = AudioOrchestrator::new(backend.clone(), MixerConfig::default()).unwrap();
        (backend, orch)
    }

    fn synth() -> SynthConfig {
        SynthConfig::defaults(SynthKind::Synth)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MixerConfig {
            default_zone_radius: -1.0,
            ..Default::default()
        };
        let backend = Arc::new(OfflineBackend::new());
        assert!(AudioOrchestrator::new(backend, config).is_err());
    }

    #[tokio::test]
    async fn test_start_initializes() {
        let (_backend, orch) = orchestrator();
        assert!(!orch.is_initialized());
        assert!(orch.start().await);
        assert!(orch.is_initialized());

        let state = orch.get_system_state();
        assert!(state.initialized);
        assert_eq!(state.context_state, ContextState::Running);
    }

    #[test]
    fn test_execute_records_history_and_state() {
        let (_backend, orch) = orchestrator();
        let result = orch.create_sound_source("a", synth(), Vec3::ZERO);
        assert!(result.success);
        assert_eq!(orch.history_len(), 1);
        assert_eq!(orch.undo_name().as_deref(), Some("Create Sound Source"));
        assert_eq!(orch.get_system_state().source_count(), 1);

        let duplicate = orch.create_sound_source("a", synth(), Vec3::ZERO);
        assert!(!duplicate.success);
        assert!(duplicate.error.is_none());
        assert_eq!(orch.history_len(), 1);
    }

    #[test]
    fn test_failed_command_not_recorded() {
        let (backend, orch) = orchestrator();
        backend.fail_creation_of("synth:");
        let result = orch.create_sound_source("a", synth(), Vec3::ZERO);
        assert!(!result.success);
        assert!(result.error.is_some());
        assert_eq!(orch.history_len(), 0);
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn test_undo_create_restores_registry_size() {
        let (_backend, orch) = orchestrator();
        orch.create_sound_source("a", synth(), Vec3::ZERO);
        orch.create_sound_source("b", synth(), Vec3::ZERO);
        assert_eq!(orch.get_system_state().source_count(), 2);

        assert!(orch.undo_last_command());
        assert_eq!(orch.get_system_state().source_count(), 1);
        assert!(orch.get_system_state().sources.contains_key("a"));
    }

    #[test]
    fn test_undo_after_remove_returns_false() {
        let (_backend, orch) = orchestrator();
        orch.create_sound_source("a", synth(), Vec3::ZERO);
        orch.create_sound_source("b", synth(), Vec3::ZERO);
        assert!(orch.remove_sound_source("a").success);
        let before = orch.get_system_state().source_count();

        assert!(!orch.undo_last_command());
        assert_eq!(orch.get_system_state().source_count(), before);
        // The failed entry was consumed; the create of "b" is next
        assert_eq!(orch.history_len(), 2);
    }

    #[test]
    fn test_undo_with_empty_history() {
        let (_backend, orch) = orchestrator();
        assert!(!orch.can_undo());
        assert!(!orch.undo_last_command());
    }

    #[test]
    fn test_suspend_stops_sounds_and_silences_probes() {
        let (_backend, orch) = orchestrator();
        orch.create_global_effect("verb", EffectType::Reverb, Vec3::ZERO);
        orch.create_sound_source("a", synth(), Vec3::ZERO);
        orch.play_sound("a").unwrap();
        orch.context().handle_engine_state_change(ContextState::Running);

        assert!(orch.context().suspend());
        let mixer = orch.mixer();
        let mixer = mixer.read();
        assert!(!mixer.source("a").unwrap().is_playing());
        assert!(mixer.effect("verb").unwrap().probe().unwrap().is_silenced());
        drop(mixer);

        assert_eq!(
            orch.get_system_state().context_state,
            ContextState::Suspended
        );
    }

    #[test]
    fn test_shutdown_tears_down_graph() {
        let (backend, orch) = orchestrator();
        orch.create_global_effect("verb", EffectType::Reverb, Vec3::ZERO);
        orch.create_sound_source("a", synth(), Vec3::ZERO);
        orch.shutdown();

        assert_eq!(backend.node_count(), 0);
        assert_eq!(orch.get_system_state().context_state, ContextState::Closed);
        assert!(!orch.create_sound_source("b", synth(), Vec3::ZERO).success);
    }

    #[test]
    fn test_direct_operations_refresh_state() {
        let (_backend, orch) = orchestrator();
        orch.create_global_effect("verb", EffectType::Reverb, Vec3::ZERO);
        orch.create_sound_source("a", synth(), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(orch.get_system_state().sources["a"].sends["verb"], 0.0);

        orch.update_sound_position("a", Vec3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(orch.get_system_state().sources["a"].sends["verb"], 1.0);

        orch.set_effect_zone_radius("verb", 0.25).unwrap();
        assert_eq!(orch.get_system_state().effects["verb"].radius, 0.25);
        assert!(orch.update_sound_position("ghost", Vec3::ZERO).is_err());

        assert!(orch.remove_global_effect("verb"));
        assert!(orch.get_system_state().sources["a"].sends.is_empty());
        // Direct operations never enter the history
        assert_eq!(orch.history_len(), 2);
    }

    #[test]
    fn test_stats() {
        let (_backend, orch) = orchestrator();
        orch.create_global_effect("verb", EffectType::Reverb, Vec3::ZERO);
        orch.create_global_effect("chorus", EffectType::Chorus, Vec3::ZERO);
        orch.create_sound_source("a", synth(), Vec3::ZERO);
        orch.play_sound("a").unwrap();

        let stats = orch.get_system_stats();
        assert_eq!(stats.source_count, 1);
        assert_eq!(stats.effect_count, 2);
        assert_eq!(stats.playing_count, 1);
        assert_eq!(stats.send_count, 2);
        assert_eq!(stats.command_history, 3);
    }
}
