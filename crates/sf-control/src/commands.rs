//! Concrete Commands for Mixer Operations
//!
//! Provides undoable commands for:
//! - Sound sources (create, remove, move)
//! - Global effects (create, remove)
//!
//! Every command holds the shared mixer and takes its write lock only for
//! the duration of `execute()` or `undo()`.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::json;
use sf_core::Vec3;
use sf_graph::{EffectConfig, EffectType, SpatialMixer, SynthConfig};
use uuid::Uuid;

use crate::{Command, CommandKind, SfResult};

/// Mixer shared between the orchestrator and its commands
pub type SharedMixer = Arc<RwLock<SpatialMixer>>;

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Create a sound source and mix it against every live effect
pub struct CreateSoundSourceCommand {
    id: Uuid,
    mixer: SharedMixer,
    source_id: String,
    config: SynthConfig,
    position: Vec3,
    created: bool,
}

impl CreateSoundSourceCommand {
    pub fn new(
        mixer: SharedMixer,
        source_id: impl Into<String>,
        config: SynthConfig,
        position: Vec3,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mixer,
            source_id: source_id.into(),
            config,
            position,
            created: false,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }
}

impl Command for CreateSoundSourceCommand {
    fn execute(&mut self) -> SfResult<bool> {
        let mut mixer = self.mixer.write();
        if mixer.has_source(&self.source_id) {
            log::warn!("Sound source '{}' already exists", self.source_id);
            return Ok(false);
        }
        mixer.create_sound_source(&self.source_id, self.config.clone(), self.position)?;
        self.created = true;
        Ok(true)
    }

    fn undo(&mut self) -> SfResult<bool> {
        if !self.created {
            return Ok(false);
        }
        let removed = self.mixer.write().remove_sound_source(&self.source_id);
        self.created = false;
        Ok(removed)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> CommandKind {
        CommandKind::CreateSoundSource
    }

    fn name(&self) -> &str {
        "Create Sound Source"
    }

    fn data(&self) -> Option<serde_json::Value> {
        Some(json!({
            "source_id": self.source_id,
            "synth": self.config.kind(),
            "position": self.position,
        }))
    }
}

/// Release, disconnect and dispose a sound source
///
/// Undo is not supported: the source's live parameter state is not
/// retained, so `undo()` always answers `Ok(false)`.
pub struct RemoveSoundSourceCommand {
    id: Uuid,
    mixer: SharedMixer,
    source_id: String,
}

impl RemoveSoundSourceCommand {
    pub fn new(mixer: SharedMixer, source_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mixer,
            source_id: source_id.into(),
        }
    }
}

impl Command for RemoveSoundSourceCommand {
    fn execute(&mut self) -> SfResult<bool> {
        Ok(self.mixer.write().remove_sound_source(&self.source_id))
    }

    fn undo(&mut self) -> SfResult<bool> {
        log::warn!(
            "Undo of sound source removal is not supported ('{}')",
            self.source_id
        );
        Ok(false)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> CommandKind {
        CommandKind::RemoveSoundSource
    }

    fn name(&self) -> &str {
        "Remove Sound Source"
    }

    fn data(&self) -> Option<serde_json::Value> {
        Some(json!({ "source_id": self.source_id }))
    }
}

/// Move a sound source; undo restores the previous position
pub struct MoveSoundSourceCommand {
    id: Uuid,
    mixer: SharedMixer,
    source_id: String,
    position: Vec3,
    previous: Option<Vec3>,
}

impl MoveSoundSourceCommand {
    pub fn new(mixer: SharedMixer, source_id: impl Into<String>, position: Vec3) -> Self {
        Self {
            id: Uuid::new_v4(),
            mixer,
            source_id: source_id.into(),
            position,
            previous: None,
        }
    }
}

impl Command for MoveSoundSourceCommand {
    fn execute(&mut self) -> SfResult<bool> {
        let mut mixer = self.mixer.write();
        let Some(previous) = mixer.source(&self.source_id).map(|s| s.position()) else {
            return Ok(false);
        };
        mixer.update_sound_position(&self.source_id, self.position)?;
        self.previous = Some(previous);
        Ok(true)
    }

    fn undo(&mut self) -> SfResult<bool> {
        let Some(previous) = self.previous else {
            return Ok(false);
        };
        let mut mixer = self.mixer.write();
        if !mixer.has_source(&self.source_id) {
            return Ok(false);
        }
        mixer.update_sound_position(&self.source_id, previous)?;
        self.previous = None;
        Ok(true)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> CommandKind {
        CommandKind::MoveSoundSource
    }

    fn name(&self) -> &str {
        "Move Sound Source"
    }

    fn data(&self) -> Option<serde_json::Value> {
        Some(json!({
            "source_id": self.source_id,
            "position": self.position,
            "previous": self.previous,
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EFFECT COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Create a global effect and retrofit a send from every existing source
pub struct CreateGlobalEffectCommand {
    id: Uuid,
    mixer: SharedMixer,
    effect_id: String,
    effect_type: EffectType,
    position: Vec3,
    radius: Option<f64>,
    created: bool,
}

impl CreateGlobalEffectCommand {
    pub fn new(
        mixer: SharedMixer,
        effect_id: impl Into<String>,
        effect_type: EffectType,
        position: Vec3,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mixer,
            effect_id: effect_id.into(),
            effect_type,
            position,
            radius: None,
            created: false,
        }
    }

    /// Override the configured default zone radius
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }
}

impl Command for CreateGlobalEffectCommand {
    fn execute(&mut self) -> SfResult<bool> {
        let mut mixer = self.mixer.write();
        if mixer.has_effect(&self.effect_id) {
            log::warn!("Global effect '{}' already exists", self.effect_id);
            return Ok(false);
        }
        match self.radius {
            Some(radius) => {
                let config = EffectConfig::defaults(self.effect_type);
                mixer.create_global_effect_with(&self.effect_id, config, self.position, radius)?;
            }
            None => {
                mixer.create_global_effect(&self.effect_id, self.effect_type, self.position)?;
            }
        }
        self.created = true;
        Ok(true)
    }

    fn undo(&mut self) -> SfResult<bool> {
        if !self.created {
            return Ok(false);
        }
        let removed = self.mixer.write().remove_global_effect(&self.effect_id);
        self.created = false;
        Ok(removed)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> CommandKind {
        CommandKind::CreateGlobalEffect
    }

    fn name(&self) -> &str {
        "Create Global Effect"
    }

    fn data(&self) -> Option<serde_json::Value> {
        Some(json!({
            "effect_id": self.effect_id,
            "effect_type": self.effect_type,
            "position": self.position,
        }))
    }
}

struct RemovedEffect {
    config: EffectConfig,
    position: Vec3,
    radius: f64,
}

/// Sever every send into a global effect and dispose it
///
/// Undo recreates the effect with its settings, position and radius at the
/// time of removal.
pub struct RemoveGlobalEffectCommand {
    id: Uuid,
    mixer: SharedMixer,
    effect_id: String,
    removed: Option<RemovedEffect>,
}

impl RemoveGlobalEffectCommand {
    pub fn new(mixer: SharedMixer, effect_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mixer,
            effect_id: effect_id.into(),
            removed: None,
        }
    }
}

impl Command for RemoveGlobalEffectCommand {
    fn execute(&mut self) -> SfResult<bool> {
        let mut mixer = self.mixer.write();
        let Some(captured) = mixer.effect(&self.effect_id).map(|e| RemovedEffect {
            config: e.config().clone(),
            position: e.position(),
            radius: e.radius(),
        }) else {
            return Ok(false);
        };
        if !mixer.remove_global_effect(&self.effect_id) {
            return Ok(false);
        }
        self.removed = Some(captured);
        Ok(true)
    }

    fn undo(&mut self) -> SfResult<bool> {
        let Some(removed) = self.removed.take() else {
            return Ok(false);
        };
        let mut mixer = self.mixer.write();
        if mixer.has_effect(&self.effect_id) {
            log::warn!(
                "Cannot restore '{}': an effect with that id exists",
                self.effect_id
            );
            return Ok(false);
        }
        mixer.create_global_effect_with(
            &self.effect_id,
            removed.config,
            removed.position,
            removed.radius,
        )?;
        Ok(true)
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn kind(&self) -> CommandKind {
        CommandKind::RemoveGlobalEffect
    }

    fn name(&self) -> &str {
        "Remove Global Effect"
    }

    fn data(&self) -> Option<serde_json::Value> {
        Some(json!({ "effect_id": self.effect_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::MixerConfig;
    use sf_graph::effects::ReverbPatch;
    use sf_graph::{EffectPatch, OfflineBackend, SynthKind};

    fn shared() -> (Arc<OfflineBackend>, SharedMixer) {
        let backend = Arc::new(OfflineBackend::running());
        let mixer = SpatialMixer::new(backend.clone(), MixerConfig::default());
        (backend, Arc::new(RwLock::new(mixer)))
    }

    fn synth() -> SynthConfig {
        SynthConfig::defaults(SynthKind::Synth)
    }

    #[test]
    fn test_create_source_and_undo() {
        let (backend, mixer) = shared();
        let mut cmd = CreateSoundSourceCommand::new(mixer.clone(), "a", synth(), Vec3::ZERO);

        assert!(cmd.execute().unwrap());
        assert_eq!(mixer.read().source_count(), 1);

        assert!(cmd.undo().unwrap());
        assert_eq!(mixer.read().source_count(), 0);
        assert_eq!(backend.node_count(), 0);

        // Nothing left to undo
        assert!(!cmd.undo().unwrap());
    }

    #[test]
    fn test_create_duplicate_source_is_not_applied() {
        let (_backend, mixer) = shared();
        let mut first = CreateSoundSourceCommand::new(mixer.clone(), "a", synth(), Vec3::ZERO);
        let mut second = CreateSoundSourceCommand::new(mixer.clone(), "a", synth(), Vec3::ZERO);

        assert!(first.execute().unwrap());
        assert!(!second.execute().unwrap());
        // The duplicate never created anything, so its undo must not remove "a"
        assert!(!second.undo().unwrap());
        assert!(mixer.read().has_source("a"));
    }

    #[test]
    fn test_create_source_construction_failure() {
        let (backend, mixer) = shared();
        backend.fail_creation_of("panner");
        let mut cmd = CreateSoundSourceCommand::new(mixer.clone(), "a", synth(), Vec3::ZERO);

        assert!(cmd.execute().is_err());
        assert_eq!(mixer.read().source_count(), 0);
        assert_eq!(backend.node_count(), 0);
    }

    #[test]
    fn test_remove_source_undo_unsupported() {
        let (_backend, mixer) = shared();
        mixer
            .write()
            .create_sound_source("a", synth(), Vec3::ZERO)
            .unwrap();

        let mut cmd = RemoveSoundSourceCommand::new(mixer.clone(), "a");
        assert!(cmd.execute().unwrap());
        assert!(!cmd.undo().unwrap());
        assert_eq!(mixer.read().source_count(), 0);

        let mut missing = RemoveSoundSourceCommand::new(mixer.clone(), "ghost");
        assert!(!missing.execute().unwrap());
    }

    #[test]
    fn test_move_source_and_undo() {
        let (_backend, mixer) = shared();
        mixer
            .write()
            .create_sound_source("a", synth(), Vec3::new(1.0, 0.0, 0.0))
            .unwrap();

        let mut cmd = MoveSoundSourceCommand::new(mixer.clone(), "a", Vec3::new(5.0, 0.0, 0.0));
        assert!(cmd.execute().unwrap());
        assert_eq!(mixer.read().source("a").unwrap().position().x, 5.0);

        assert!(cmd.undo().unwrap());
        assert_eq!(mixer.read().source("a").unwrap().position().x, 1.0);

        let mut missing = MoveSoundSourceCommand::new(mixer, "ghost", Vec3::ZERO);
        assert!(!missing.execute().unwrap());
    }

    #[test]
    fn test_create_effect_and_undo() {
        let (backend, mixer) = shared();
        mixer
            .write()
            .create_sound_source("a", synth(), Vec3::ZERO)
            .unwrap();
        let before = backend.node_count();

        let mut cmd =
            CreateGlobalEffectCommand::new(mixer.clone(), "verb", EffectType::Reverb, Vec3::ZERO)
                .with_radius(4.0);
        assert!(cmd.execute().unwrap());
        {
            let m = mixer.read();
            assert_eq!(m.effect("verb").unwrap().radius(), 4.0);
            assert!(m.source("a").unwrap().has_send("verb"));
        }

        assert!(cmd.undo().unwrap());
        assert!(!mixer.read().source("a").unwrap().has_send("verb"));
        assert_eq!(backend.node_count(), before);
        assert_eq!(backend.dirty_disposals(), 0);
    }

    #[test]
    fn test_remove_effect_undo_restores_settings() {
        let (_backend, mixer) = shared();
        {
            let mut m = mixer.write();
            m.create_sound_source("a", synth(), Vec3::ZERO).unwrap();
            m.create_global_effect("verb", EffectType::Reverb, Vec3::new(2.0, 0.0, 0.0))
                .unwrap();
            m.set_effect_zone_radius("verb", 3.0).unwrap();
            let patch = EffectPatch::Reverb(ReverbPatch {
                decay: Some(6.0),
                ..Default::default()
            });
            assert!(m.update_global_effect("verb", &patch).unwrap().success);
        }
        let config_before = mixer.read().effect("verb").unwrap().config().clone();

        let mut cmd = RemoveGlobalEffectCommand::new(mixer.clone(), "verb");
        assert!(cmd.execute().unwrap());
        assert!(!mixer.read().has_effect("verb"));
        assert!(!mixer.read().source("a").unwrap().has_send("verb"));

        assert!(cmd.undo().unwrap());
        let m = mixer.read();
        let effect = m.effect("verb").unwrap();
        assert_eq!(effect.config(), &config_before);
        assert_eq!(effect.radius(), 3.0);
        assert_eq!(effect.position().x, 2.0);
        assert!(m.source("a").unwrap().has_send("verb"));
    }

    #[test]
    fn test_command_data_payloads() {
        let (_backend, mixer) = shared();
        let cmd = CreateSoundSourceCommand::new(mixer, "a", synth(), Vec3::ZERO);
        let data = cmd.data().unwrap();
        assert_eq!(data["source_id"], "a");
        assert_eq!(data["synth"], "synth");
        assert_eq!(cmd.kind(), CommandKind::CreateSoundSource);
    }
}
