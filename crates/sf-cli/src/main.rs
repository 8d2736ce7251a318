//! SpatialForge headless runner
//!
//! Usage:
//!   spatialforge scene             - Run the scripted scene, print JSON
//!   spatialforge effects           - List effect types and parameter ranges
//!   spatialforge synths            - List synth kinds and parameter ranges
//!
//! Everything runs against the in-memory offline backend; no audio device
//! is opened. Set `RUST_LOG=debug` to see every engine write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sf_control::{
    AudioOrchestrator, AudioSystemState, Command, CommandResult, CreateGlobalEffectCommand,
    CreateSoundSourceCommand, MoveSoundSourceCommand, StateValidation, SystemStats,
};
use sf_core::{DryGainPolicy, MixerConfig, ParamBounds, ParamRange, Vec3};
use sf_graph::{EffectRegistry, EffectType, OfflineBackend, SynthConfig, SynthKind};

#[derive(Parser)]
#[command(name = "spatialforge", about = "SpatialForge headless scene runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty-print JSON output
    #[arg(short, long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a scene, sweep a source through a zone, undo the last move
    Scene {
        /// Mixer configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Dry gain policy for overlapping zones
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Number of sweep steps
        #[arg(short, long, default_value_t = 8)]
        steps: usize,
    },
    /// List effect types and their parameter ranges
    Effects,
    /// List synth kinds and their parameter ranges
    Synths,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    LastZone,
    MaxIntensity,
    NormalizedSum,
}

impl From<PolicyArg> for DryGainPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LastZone => Self::LastZone,
            PolicyArg::MaxIntensity => Self::MaxIntensity,
            PolicyArg::NormalizedSum => Self::NormalizedSum,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scene {
            config,
            policy,
            steps,
        } => {
            let mut mixer_config = load_config(config.as_deref())?;
            if let Some(policy) = policy {
                mixer_config.dry_gain_policy = policy.into();
            }
            let report = run_scene(mixer_config, steps).await?;
            print_json(&report, cli.pretty)
        }
        Commands::Effects => print_json(&list_effects(), cli.pretty),
        Commands::Synths => print_json(&list_synths(), cli.pretty),
    }
}

fn load_config(path: Option<&Path>) -> Result<MixerConfig> {
    let Some(path) = path else {
        return Ok(MixerConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    MixerConfig::from_json(&json).with_context(|| format!("Invalid config in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCENE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct SweepFrame {
    x: f64,
    dry: f64,
    hall: f64,
    echo: f64,
}

#[derive(Serialize)]
struct SceneReport {
    setup: Vec<CommandResult>,
    sweep: Vec<SweepFrame>,
    undone: bool,
    state: AudioSystemState,
    stats: SystemStats,
    validation: StateValidation,
}

async fn run_scene(config: MixerConfig, steps: usize) -> Result<SceneReport> {
    if steps < 2 {
        bail!("A sweep needs at least 2 steps, got {}", steps);
    }

    let backend = Arc::new(OfflineBackend::new());
    let orch = AudioOrchestrator::new(backend, config)?;
    if !orch.start().await {
        bail!("Audio context did not start");
    }

    let setup: Vec<Box<dyn Command>> = vec![
        Box::new(CreateGlobalEffectCommand::new(
            orch.mixer(),
            "hall",
            EffectType::Reverb,
            Vec3::ZERO,
        )),
        Box::new(CreateSoundSourceCommand::new(
            orch.mixer(),
            "pad",
            SynthConfig::defaults(SynthKind::PolySynth),
            Vec3::new(-1.0, 0.0, 0.0),
        )),
        Box::new(CreateSoundSourceCommand::new(
            orch.mixer(),
            "lead",
            SynthConfig::defaults(SynthKind::FmSynth),
            Vec3::new(-6.0, 0.0, 0.0),
        )),
        Box::new(
            CreateGlobalEffectCommand::new(
                orch.mixer(),
                "echo",
                EffectType::FeedbackDelay,
                Vec3::new(3.0, 0.0, 0.0),
            )
            .with_radius(3.0),
        ),
    ];
    let setup = orch.execute_command_batch(setup).await;
    if let Some(failed) = setup.iter().find(|r| !r.success) {
        bail!("Scene setup failed: {}", failed.message);
    }
    for id in ["pad", "lead"] {
        orch.play_sound(id)?;
    }

    // Sweep "lead" from x = -6 to x = 6 through both zones
    let mut sweep = Vec::with_capacity(steps);
    for i in 0..steps {
        let x = -6.0 + 12.0 * i as f64 / (steps - 1) as f64;
        orch.queue_command(Box::new(MoveSoundSourceCommand::new(
            orch.mixer(),
            "lead",
            Vec3::new(x, 0.0, 0.0),
        )));
        orch.process_command_queue().await?;

        let state = orch.get_system_state();
        let lead = state
            .sources
            .get("lead")
            .context("source 'lead' missing from state")?;
        sweep.push(SweepFrame {
            x,
            dry: lead.dry_level,
            hall: lead.sends.get("hall").copied().unwrap_or(0.0),
            echo: lead.sends.get("echo").copied().unwrap_or(0.0),
        });
    }

    let undone = orch.undo_last_command();
    let stopped = orch.stop_all_sounds();
    log::info!("Scene finished: {} sweep steps, {} sources stopped", steps, stopped);

    Ok(SceneReport {
        setup,
        sweep,
        undone,
        state: orch.get_system_state().as_ref().clone(),
        stats: orch.get_system_stats(),
        validation: orch.validate_state(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// LISTINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct ParamInfo {
    name: &'static str,
    #[serde(flatten)]
    range: ParamRange,
}

fn params(bounds: &ParamBounds) -> Vec<ParamInfo> {
    bounds
        .names()
        .filter_map(|name| bounds.range(name).map(|range| ParamInfo { name, range }))
        .collect()
}

#[derive(Serialize)]
struct EffectInfo {
    effect_type: EffectType,
    display_name: &'static str,
    probe_frequency: f64,
    params: Vec<ParamInfo>,
}

fn list_effects() -> Vec<EffectInfo> {
    let registry = EffectRegistry::with_builtins();
    registry
        .types()
        .filter_map(|ty| registry.get(ty))
        .map(|d| EffectInfo {
            effect_type: d.effect_type,
            display_name: d.display_name,
            probe_frequency: d.probe.frequency,
            params: params(&d.effect_type.bounds()),
        })
        .collect()
}

#[derive(Serialize)]
struct SynthInfo {
    kind: SynthKind,
    pitched: bool,
    params: Vec<ParamInfo>,
}

fn list_synths() -> Vec<SynthInfo> {
    SynthKind::ALL
        .iter()
        .map(|&kind| SynthInfo {
            kind,
            pitched: kind.is_pitched(),
            params: params(&kind.bounds()),
        })
        .collect()
}
