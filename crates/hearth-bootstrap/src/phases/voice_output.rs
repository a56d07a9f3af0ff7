use std::time::Duration;

use hearth_core::store_settings_private;
use hearth_probe::Requirement;
use hearth_reconcile::run_streaming;
use hearth_voice::{is_voice_available, SpeakerConfig, DEFAULT_VOICE};

use crate::error::PhaseError;
use crate::paths::HearthPaths;
use crate::phase::{Phase, PhaseContext, SectionDecl};

const SELF_TEST_MESSAGE: &str =
    "Hello. I am Hearth, your personal assistant. Voice output is working correctly.";

/// Known identifiers for the default voice package, tried in order when the
/// update listing does not name it.
const FALLBACK_VOICE_PACKAGES: &[&str] = &[
    "com.apple.voice.compact.en-GB.Jamie",
    "com.apple.voice.premium.en-GB.Jamie",
    "VoiceOver_enGB_Jamie",
];

const VOICE_REGISTRATION_DELAY: Duration = Duration::from_secs(2);

const SECTIONS: &[SectionDecl] = &[SectionDecl {
    marker: "# Phase 3 voice output",
    template: "  # Phase 3 voice output\n  # The system voice is installed during bootstrap via softwareupdate;\n  # spoken-feedback settings live in ~/.config/hearth/voice.toml.",
}];

/// Phase 3: the default system voice installed plus persisted speech
/// settings, verified by a spoken self-test.
pub struct VoiceOutputPhase;

#[async_trait::async_trait]
impl Phase for VoiceOutputPhase {
    fn name(&self) -> &'static str {
        "voice output"
    }

    fn ordinal(&self) -> u32 {
        3
    }

    fn requirements(&self, paths: &HearthPaths) -> Vec<Requirement> {
        vec![Requirement::file("voice settings", paths.voice_settings())]
    }

    fn sections(&self) -> &[SectionDecl] {
        SECTIONS
    }

    async fn is_complete(&self, ctx: &PhaseContext<'_>) -> bool {
        is_voice_available(DEFAULT_VOICE).await
            && ctx.probe.file_exists(&ctx.paths.voice_settings())
    }

    async fn after_apply(&self, ctx: &PhaseContext<'_>) -> Result<(), PhaseError> {
        if is_voice_available(DEFAULT_VOICE).await {
            tracing::info!(voice = DEFAULT_VOICE, "voice already installed");
        } else if let Err(error) = install_default_voice().await {
            // Installation is best-effort: verification will still name the
            // voice as missing if it never became available.
            tracing::warn!(voice = DEFAULT_VOICE, %error, "voice installation failed");
        }

        ensure_voice_settings(ctx.paths).map_err(PhaseError::Mutation)?;

        if ctx
            .speaker
            .speak_blocking(SELF_TEST_MESSAGE)
            .await
            .is_err()
        {
            return Err(PhaseError::Verification {
                missing: vec!["voice self-test".to_string()],
            });
        }
        Ok(())
    }

    async fn missing(&self, ctx: &PhaseContext<'_>) -> Vec<String> {
        let mut missing = Vec::new();
        if !is_voice_available(DEFAULT_VOICE).await {
            missing.push(format!("voice {DEFAULT_VOICE}"));
        }
        if !ctx.probe.file_exists(&ctx.paths.voice_settings()) {
            missing.push("voice settings".to_string());
        }
        missing
    }
}

/// Writes default speech settings owner-only, unless already present. An
/// existing file is never overwritten; the operator may have tuned it.
fn ensure_voice_settings(paths: &HearthPaths) -> anyhow::Result<()> {
    let settings_path = paths.voice_settings();
    if settings_path.exists() {
        return Ok(());
    }
    store_settings_private(&settings_path, &SpeakerConfig::default())?;
    tracing::info!(path = %settings_path.display(), "wrote default voice settings");
    Ok(())
}

/// Installs the default voice through `softwareupdate`: first by scanning
/// the update listing for its package, then by trying known identifiers.
/// Needs sudo, so stdin stays attached to the operator.
async fn install_default_voice() -> anyhow::Result<()> {
    let listing = tokio::process::Command::new("softwareupdate")
        .arg("--list")
        .output()
        .await
        .map_err(|source| anyhow::anyhow!("failed to run softwareupdate --list: {source}"))?;
    let listing_text = String::from_utf8_lossy(&listing.stdout).to_string()
        + &String::from_utf8_lossy(&listing.stderr);

    if let Some(package) = find_voice_package(&listing_text, DEFAULT_VOICE) {
        tracing::info!(%package, "installing voice package from update listing");
        run_streaming("sudo", &["softwareupdate", "--install", &package, "--verbose"], None)
            .await
            .map_err(|error| anyhow::anyhow!("voice package install failed: {error}"))?;
        tokio::time::sleep(VOICE_REGISTRATION_DELAY).await;
        if is_voice_available(DEFAULT_VOICE).await {
            return Ok(());
        }
        anyhow::bail!("package installed but voice {DEFAULT_VOICE} not detected");
    }

    for package in FALLBACK_VOICE_PACKAGES {
        tracing::info!(package, "trying fallback voice package");
        if run_streaming("sudo", &["softwareupdate", "--install", package], None)
            .await
            .is_err()
        {
            continue;
        }
        tokio::time::sleep(VOICE_REGISTRATION_DELAY).await;
        if is_voice_available(DEFAULT_VOICE).await {
            return Ok(());
        }
    }
    anyhow::bail!("no installable package found for voice {DEFAULT_VOICE}")
}

/// Scans `softwareupdate --list` output for the named voice's package
/// label: a `*`/`-` prefixed line mentioning the voice together with a
/// voice or en-GB locale hint.
pub fn find_voice_package(listing: &str, voice: &str) -> Option<String> {
    let voice = voice.to_lowercase();
    for line in listing.lines() {
        let lower = line.to_lowercase();
        if !lower.contains(&voice) {
            continue;
        }
        if !(lower.contains("voice") || lower.contains("en-gb") || lower.contains("en_gb")) {
            continue;
        }
        let trimmed = line.trim();
        if let Some(label) = trimmed
            .strip_prefix('*')
            .or_else(|| trimmed.strip_prefix('-'))
        {
            return Some(label.trim().to_string());
        }
    }
    None
}
