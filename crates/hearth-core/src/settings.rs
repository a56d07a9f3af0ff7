use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::atomic_io::write_text_private;

/// Loads a TOML settings file into a typed value.
pub fn load_settings<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))
}

/// Persists a typed value as an owner-only TOML settings file.
///
/// Settings are read once on startup; they are not hot-reloaded.
pub fn store_settings_private<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let rendered = toml::to_string_pretty(value)
        .with_context(|| format!("failed to serialize settings for {}", path.display()))?;
    write_text_private(path, &rendered)
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct SampleSettings {
        enabled: bool,
        label: String,
    }

    #[test]
    fn functional_settings_round_trip_through_toml() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("sample.toml");
        let settings = SampleSettings {
            enabled: true,
            label: "dashboard".to_string(),
        };
        store_settings_private(&path, &settings).expect("store");
        let loaded: SampleSettings = load_settings(&path).expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn regression_load_settings_reports_missing_file_path() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("absent.toml");
        let error = load_settings::<SampleSettings>(&path).expect_err("missing file");
        assert!(error.to_string().contains("absent.toml"));
    }
}
