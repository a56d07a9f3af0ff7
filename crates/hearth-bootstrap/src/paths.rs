use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Well-known file locations, all rooted at the invoking user's home
/// directory so tests can point the whole engine at a tempdir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HearthPaths {
    home: PathBuf,
}

impl HearthPaths {
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }

    pub fn from_env() -> Result<Self> {
        let home = std::env::var_os("HOME")
            .map(PathBuf::from)
            .context("HOME is not set; cannot locate the configuration document")?;
        Ok(Self::new(home))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// The declarative configuration document applied by `darwin-rebuild`.
    pub fn document(&self) -> PathBuf {
        self.home.join(".nixpkgs").join("darwin-configuration.nix")
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.home.join(".config").join("hearth")
    }

    pub fn voice_settings(&self) -> PathBuf {
        self.settings_dir().join("voice.toml")
    }

    pub fn dashboard_settings(&self) -> PathBuf {
        self.settings_dir().join("dashboard.toml")
    }

    pub fn launch_agents_dir(&self) -> PathBuf {
        self.home.join("Library").join("LaunchAgents")
    }

    /// Service-supervisor unit keeping the inference server running.
    pub fn ollama_unit(&self) -> PathBuf {
        self.launch_agents_dir().join("com.hearth.ollama.plist")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.home.join("Library").join("Logs")
    }

    pub fn dashboard_launcher(&self) -> PathBuf {
        self.home.join(".local").join("bin").join("hearth-dashboard")
    }
}
