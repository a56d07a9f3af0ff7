//! `hearth` bootstraps a dedicated Mac into a self-hosted assistant
//! appliance through ordered, idempotent phases.

mod setup;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use hearth_bootstrap::{
    standard_phases, HearthPaths, Phase, PhaseController, PhaseOutcome,
};
use hearth_probe::SystemProbe;
use hearth_reconcile::CommandReconciler;
use hearth_voice::{Speaker, SpeakerConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hearth", version, about = "Self-hosted assistant appliance bootstrap")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install nix and nix-darwin, then seed the configuration document.
    Setup,
    /// Probe every phase and report what is still missing.
    Status,
    /// Run all incomplete phases, or one specific phase, in order.
    Run {
        /// Run only the phase with this ordinal (1-4).
        #[arg(long)]
        phase: Option<u32>,
        /// Skip the confirmation when earlier phases are incomplete.
        #[arg(long)]
        yes: bool,
    },
    /// Queue one spoken announcement and wait for it to finish.
    Say {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Speak a test sentence synchronously.
    VoiceTest,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn banner() {
    println!("╔════════════════════════════════════════╗");
    println!("║              Hearth                    ║");
    println!("║  Self-hosted assistant for your Mac    ║");
    println!("╚════════════════════════════════════════╝");
    println!();
}

fn load_speaker(paths: &HearthPaths) -> Speaker {
    let settings_path = paths.voice_settings();
    let config = if settings_path.exists() {
        match SpeakerConfig::load(&settings_path) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%error, "falling back to default voice settings");
                SpeakerConfig::default()
            }
        }
    } else {
        SpeakerConfig::default()
    };
    Speaker::new(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let paths = HearthPaths::from_env()?;

    match cli.command {
        Command::Setup => run_setup(&paths).await,
        Command::Status => run_status(&paths).await,
        Command::Run { phase, yes } => run_phases(&paths, phase, yes).await,
        Command::Say { text } => run_say(&paths, &text.join(" ")).await,
        Command::VoiceTest => run_voice_test(&paths).await,
    }
}

async fn run_setup(paths: &HearthPaths) -> Result<()> {
    banner();

    if setup::nix_darwin_installed(paths) {
        println!("✓ nix-darwin is already installed.");
        println!("Run 'hearth run' to continue the bootstrap.");
        return Ok(());
    }

    println!("nix-darwin is not installed yet. This setup will:");
    println!("  1. Install Nix (if not already installed)");
    println!("  2. Install nix-darwin");
    println!("  3. Seed the initial configuration document");
    println!();
    if !setup::confirm("Proceed with the installation?") {
        println!("Installation cancelled.");
        return Ok(());
    }
    println!();

    if setup::nix_installed() {
        println!("✓ Nix is already installed.");
    } else {
        println!("Installing Nix (you may be asked for your password)...");
        setup::install_nix().await?;
    }
    println!();

    if setup::seed_document(paths)? {
        println!("✓ Seeded {}", paths.document().display());
    } else {
        println!("✓ Configuration document already present.");
    }
    println!();

    println!("Installing nix-darwin...");
    setup::install_nix_darwin().await?;
    println!();
    println!("✓ Setup complete. Restart your terminal, then run 'hearth run'.");
    Ok(())
}

async fn run_status(paths: &HearthPaths) -> Result<()> {
    let probe = SystemProbe::new();
    let reconciler = CommandReconciler::darwin_rebuild();
    let speaker = Speaker::new(SpeakerConfig {
        enabled: false,
        ..SpeakerConfig::default()
    });
    let controller = PhaseController::new(
        &probe,
        &reconciler,
        &speaker,
        paths,
        std::env::var("USER").ok(),
    );

    for phase in standard_phases() {
        let status = controller.phase_status(phase.as_ref()).await;
        if status.complete {
            println!("✓ phase {} ({})", status.ordinal, status.name);
        } else if status.missing.is_empty() {
            println!("✗ phase {} ({})", status.ordinal, status.name);
        } else {
            println!(
                "✗ phase {} ({}), missing: {}",
                status.ordinal,
                status.name,
                status.missing.join(", ")
            );
        }
    }
    speaker.close().await;
    Ok(())
}

async fn run_phases(paths: &HearthPaths, only: Option<u32>, yes: bool) -> Result<()> {
    banner();
    let probe = SystemProbe::new();
    let reconciler = CommandReconciler::darwin_rebuild();
    let speaker = load_speaker(paths);
    let controller = PhaseController::new(
        &probe,
        &reconciler,
        &speaker,
        paths,
        std::env::var("USER").ok(),
    );
    let phases = standard_phases();

    let selected: Vec<&dyn Phase> = match only {
        Some(ordinal) => {
            let Some(phase) = phases.iter().find(|phase| phase.ordinal() == ordinal) else {
                speaker.close().await;
                bail!("no phase with ordinal {ordinal} (valid: 1-{})", phases.len());
            };
            let incomplete = controller.incomplete_predecessors(&phases, ordinal).await;
            if !incomplete.is_empty() {
                println!("Warning: earlier phases are incomplete: {}", incomplete.join(", "));
                if !yes && !setup::confirm("Run this phase anyway?") {
                    println!("Cancelled.");
                    speaker.close().await;
                    return Ok(());
                }
            }
            vec![phase.as_ref()]
        }
        None => phases.iter().map(|phase| phase.as_ref()).collect(),
    };

    let mut failure = None;
    for phase in selected {
        println!("── phase {}: {} ──", phase.ordinal(), phase.name());
        match controller.run_phase(phase).await {
            Ok(PhaseOutcome::AlreadyComplete) => {
                println!("✓ phase {} is already complete", phase.ordinal());
            }
            Ok(PhaseOutcome::Converged) => {
                println!("✓ phase {} complete", phase.ordinal());
            }
            Err(error) => {
                failure = Some((phase.ordinal(), error));
                break;
            }
        }
        println!();
    }

    speaker.close().await;
    match failure {
        Some((ordinal, error)) => Err(anyhow::Error::new(error).context(format!(
            "phase {ordinal} failed; every step is idempotent, so re-running is safe"
        ))),
        None => Ok(()),
    }
}

async fn run_say(paths: &HearthPaths, text: &str) -> Result<()> {
    let speaker = load_speaker(paths);
    if !speaker.is_enabled() {
        bail!("voice output is disabled in {}", paths.voice_settings().display());
    }
    speaker.enqueue(text);
    speaker.close().await;
    Ok(())
}

async fn run_voice_test(paths: &HearthPaths) -> Result<()> {
    let speaker = load_speaker(paths);
    speaker
        .speak_blocking("Hello. Hearth voice output is working correctly.")
        .await?;
    speaker.close().await;
    println!("✓ voice test successful");
    Ok(())
}
