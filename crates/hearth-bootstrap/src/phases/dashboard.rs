use hearth_core::{store_settings_private, write_text_executable};
use hearth_probe::Requirement;
use serde::{Deserialize, Serialize};

use crate::error::PhaseError;
use crate::paths::HearthPaths;
use crate::phase::{Phase, PhaseContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Status dashboard settings, persisted as owner-only TOML.
pub struct DashboardSettings {
    pub enabled: bool,
    /// Initial view shown on launch: "status", "logs", or "config".
    pub default_view: String,
    pub theme: String,
    pub refresh_interval_secs: u32,
    pub show_resources: bool,
    pub max_log_entries: u32,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_view: "status".to_string(),
            theme: "auto".to_string(),
            refresh_interval_secs: 5,
            show_resources: true,
            max_log_entries: 100,
        }
    }
}

const LAUNCHER_SCRIPT: &str = "\
#!/bin/sh
# Opens the Hearth status dashboard inside a persistent tmux session.
exec tmux new-session -A -s hearth 'hearth status; exec \"${SHELL:-/bin/sh}\"'
";

/// Phase 4: the operator-facing status dashboard, installed as a settings
/// file plus a launcher on `PATH`. Owns no document sections.
pub struct DashboardPhase;

#[async_trait::async_trait]
impl Phase for DashboardPhase {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn ordinal(&self) -> u32 {
        4
    }

    fn requirements(&self, paths: &HearthPaths) -> Vec<Requirement> {
        vec![
            Requirement::file("dashboard settings", paths.dashboard_settings()),
            Requirement::file("dashboard launcher", paths.dashboard_launcher()),
        ]
    }

    async fn after_apply(&self, ctx: &PhaseContext<'_>) -> Result<(), PhaseError> {
        install_dashboard(ctx.paths).map_err(PhaseError::Mutation)?;
        Ok(())
    }
}

/// Writes the dashboard settings and launcher, skipping files the operator
/// already has.
fn install_dashboard(paths: &HearthPaths) -> anyhow::Result<()> {
    let settings_path = paths.dashboard_settings();
    if !settings_path.exists() {
        store_settings_private(&settings_path, &DashboardSettings::default())?;
        tracing::info!(path = %settings_path.display(), "wrote default dashboard settings");
    }

    let launcher_path = paths.dashboard_launcher();
    if !launcher_path.exists() {
        write_text_executable(&launcher_path, LAUNCHER_SCRIPT)?;
        tracing::info!(path = %launcher_path.display(), "installed dashboard launcher");
    }
    Ok(())
}
