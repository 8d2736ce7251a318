//! End-to-End Graph Integration Tests
//!
//! Drives the spatial mixer against the offline backend:
//! - Source/effect lifecycle leaves no stray nodes
//! - Send topology tracks the live effect set
//! - Gains follow geometry under every dry-gain policy

use std::sync::Arc;

use approx::assert_relative_eq;
use sf_core::{DryGainPolicy, MixerConfig, Vec3};
use sf_graph::effects::{FreeverbPatch, PitchShiftPatch};
use sf_graph::synth::{PolySynthPatch, SimpleSynthPatch};
use sf_graph::{
    Endpoint, EffectPatch, EffectType, OfflineBackend, SpatialMixer, SynthConfig, SynthKind,
    SynthPatch,
};

fn mixer_with(config: MixerConfig) -> (Arc<OfflineBackend>, SpatialMixer) {
    let backend = Arc::new(OfflineBackend::running());
    let mixer = SpatialMixer::new(backend.clone(), config);
    (backend, mixer)
}

fn mixer() -> (Arc<OfflineBackend>, SpatialMixer) {
    mixer_with(MixerConfig::default())
}

fn at(x: f64) -> Vec3 {
    Vec3::new(x, 0.0, 0.0)
}

/// Every source has exactly one send per live effect, each wired into it
fn assert_send_topology(backend: &OfflineBackend, mixer: &SpatialMixer) {
    for source in mixer.sources() {
        assert_eq!(source.send_count(), mixer.effect_count(), "{}", source.id());
        for effect in mixer.effects() {
            let send = source.send(effect.id()).unwrap();
            assert!(backend.is_connected(send.gain, Endpoint::Node(effect.node())));
            assert!(backend.is_connected(source.synth().node, Endpoint::Node(send.gain)));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_create_remove_round_trip_restores_graph() {
    let (backend, mut mixer) = mixer();
    mixer
        .create_global_effect("verb", EffectType::Reverb, at(0.0))
        .unwrap();
    let nodes = backend.node_count();
    let edges = backend.edge_count();

    for kind in SynthKind::ALL {
        mixer
            .create_sound_source("probe", SynthConfig::defaults(kind), at(1.0))
            .unwrap();
        mixer.play_sound("probe").unwrap();
        assert!(mixer.remove_sound_source("probe"));

        assert_eq!(backend.node_count(), nodes, "{}", kind);
        assert_eq!(backend.edge_count(), edges, "{}", kind);
    }
    assert_eq!(backend.dirty_disposals(), 0);
    assert!(!mixer.remove_sound_source("probe"));
}

#[test]
fn test_topology_under_interleaved_operations() {
    let (backend, mut mixer) = mixer();
    mixer
        .create_sound_source("a", SynthConfig::defaults(SynthKind::FmSynth), at(0.0))
        .unwrap();
    mixer
        .create_global_effect("verb", EffectType::Reverb, at(0.0))
        .unwrap();
    mixer
        .create_sound_source("b", SynthConfig::defaults(SynthKind::NoiseSynth), at(4.0))
        .unwrap();
    mixer
        .create_global_effect("chorus", EffectType::Chorus, at(4.0))
        .unwrap();
    assert_send_topology(&backend, &mixer);

    mixer.remove_global_effect("verb");
    assert_send_topology(&backend, &mixer);
    assert!(mixer.sources().all(|s| !s.has_send("verb")));

    mixer
        .create_sound_source("c", SynthConfig::defaults(SynthKind::Sampler), at(2.0))
        .unwrap();
    assert_send_topology(&backend, &mixer);
    assert_eq!(backend.dirty_disposals(), 0);
}

#[test]
fn test_probe_tones_disabled() {
    let config = MixerConfig {
        probe_tones: false,
        ..Default::default()
    };
    let (backend, mut mixer) = mixer_with(config);
    mixer
        .create_global_effect("verb", EffectType::Reverb, at(0.0))
        .unwrap();
    assert!(mixer.effect("verb").unwrap().probe().is_none());
    assert_eq!(backend.node_count(), 2);
}

// ═══════════════════════════════════════════════════════════════════════════════
// MIXING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_zone_scenario_send_levels() {
    let (_backend, mut mixer) = mixer();
    mixer
        .create_global_effect("verb", EffectType::Reverb, at(0.0))
        .unwrap();

    for (id, x, expected) in [("near", 1.0, 1.0), ("edge", 3.0, 0.5), ("far", 5.0, 0.0)] {
        mixer
            .create_sound_source(id, SynthConfig::defaults(SynthKind::Synth), at(x))
            .unwrap();
        let source = mixer.source(id).unwrap();
        assert_relative_eq!(source.send("verb").unwrap().level, expected);
        assert_relative_eq!(source.dry_level(), 1.0 - expected);
    }
}

#[test]
fn test_effect_move_recomputes_every_source() {
    let (_backend, mut mixer) = mixer();
    mixer
        .create_global_effect("verb", EffectType::Reverb, at(0.0))
        .unwrap();
    mixer
        .create_sound_source("a", SynthConfig::defaults(SynthKind::Synth), at(10.0))
        .unwrap();
    mixer
        .create_sound_source("b", SynthConfig::defaults(SynthKind::Synth), at(13.0))
        .unwrap();

    mixer.update_effect_zone_position("verb", at(10.0)).unwrap();
    assert_relative_eq!(mixer.source("a").unwrap().send("verb").unwrap().level, 1.0);
    assert_relative_eq!(mixer.source("b").unwrap().send("verb").unwrap().level, 0.5);
}

#[test]
fn test_dry_policies_under_overlap() {
    // Source at the origin; "a" contributes 0.5 and "b" 0.25
    let cases = [
        (DryGainPolicy::LastZone, 0.75),
        (DryGainPolicy::MaxIntensity, 0.5),
        (DryGainPolicy::NormalizedSum, 0.25),
    ];
    for (policy, expected_dry) in cases {
        let config = MixerConfig {
            dry_gain_policy: policy,
            ..Default::default()
        };
        let (_backend, mut mixer) = mixer_with(config);
        mixer
            .create_global_effect("a", EffectType::Reverb, at(3.0))
            .unwrap();
        mixer
            .create_global_effect("b", EffectType::Chorus, at(-3.5))
            .unwrap();
        mixer
            .create_sound_source("s", SynthConfig::defaults(SynthKind::Synth), at(0.0))
            .unwrap();

        assert_relative_eq!(mixer.source("s").unwrap().dry_level(), expected_dry);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_frequency_validation_through_mixer() {
    let (backend, mut mixer) = mixer();
    mixer
        .create_sound_source("a", SynthConfig::defaults(SynthKind::Synth), at(0.0))
        .unwrap();
    let node = mixer.source("a").unwrap().synth().node;

    for hz in [5.0, 25_000.0] {
        let patch = SynthPatch::Synth(SimpleSynthPatch {
            frequency: Some(hz),
            ..Default::default()
        });
        let result = mixer.update_sound_params("a", &patch).unwrap();
        assert!(!result.success);
        assert!(result.updated_params.is_empty());
    }
    assert_eq!(backend.number_param(node, "frequency"), None);

    let patch = SynthPatch::Synth(SimpleSynthPatch {
        frequency: Some(880.0),
        ..Default::default()
    });
    let result = mixer.update_sound_params("a", &patch).unwrap();
    assert!(result.success);
    assert!(result.was_applied("frequency"));
    assert_eq!(backend.number_param(node, "frequency"), Some(880.0));
}

#[test]
fn test_poly_retrigger_through_mixer() {
    let (backend, mut mixer) = mixer();
    mixer
        .create_sound_source("pad", SynthConfig::defaults(SynthKind::PolySynth), at(0.0))
        .unwrap();
    mixer.play_sound("pad").unwrap();

    let patch = SynthPatch::PolySynth(PolySynthPatch {
        frequency: Some(220.0),
        ..Default::default()
    });
    assert!(mixer.update_sound_params("pad", &patch).unwrap().success);

    let node = mixer.source("pad").unwrap().synth().node;
    let notes = backend.node(node).unwrap().active_notes;
    assert_eq!(notes.len(), 3);
    assert_relative_eq!(notes[0], 220.0);
}

#[test]
fn test_probe_refresh_types() {
    let (backend, mut mixer) = mixer();
    mixer
        .create_global_effect("shift", EffectType::PitchShift, at(0.0))
        .unwrap();
    mixer
        .create_global_effect("room", EffectType::Freeverb, at(0.0))
        .unwrap();
    let shift_probe = mixer.effect("shift").unwrap().probe().unwrap().node;
    backend.clear_events();

    let patch = EffectPatch::PitchShift(PitchShiftPatch {
        pitch: Some(7.0),
        ..Default::default()
    });
    assert!(mixer.update_global_effect("shift", &patch).unwrap().success);
    let touched_probe = backend.events().iter().any(|e| {
        matches!(e, sf_graph::backend::EngineEvent::Ramp { node, param, .. }
            if *node == shift_probe && param == "frequency")
    });
    assert!(touched_probe);

    let patch = EffectPatch::Freeverb(FreeverbPatch {
        room_size: Some(2.0),
        ..Default::default()
    });
    assert!(!mixer.update_global_effect("room", &patch).unwrap().success);
    assert!(mixer.update_global_effect("missing", &patch).is_err());
}
