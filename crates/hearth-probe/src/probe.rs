use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::requirement::ProbeTarget;

const ENDPOINT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
/// Capability for answering "is this requirement already satisfied?".
///
/// Implementations must be side-effect free and must never error; every
/// detection failure is reported as `false`.
pub trait StateProbe: Send + Sync {
    fn binary_on_path(&self, name: &str) -> bool;

    async fn endpoint_healthy(&self, url: &str) -> bool;

    fn file_exists(&self, path: &Path) -> bool;

    async fn satisfied(&self, target: &ProbeTarget) -> bool {
        match target {
            ProbeTarget::Binary(name) => self.binary_on_path(name),
            ProbeTarget::Endpoint(url) => self.endpoint_healthy(url).await,
            ProbeTarget::File(path) => self.file_exists(path),
        }
    }
}

/// Probe backed by the real machine: `PATH` lookup, a short-timeout HTTP
/// GET, and filesystem metadata.
pub struct SystemProbe {
    http: reqwest::Client,
}

impl SystemProbe {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(ENDPOINT_PROBE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateProbe for SystemProbe {
    fn binary_on_path(&self, name: &str) -> bool {
        lookup_on_path(name, std::env::var_os("PATH").as_deref()).is_some()
    }

    async fn endpoint_healthy(&self, url: &str) -> bool {
        match self.http.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Resolves `name` against a `PATH`-style search string, returning the first
/// executable hit.
pub fn lookup_on_path(name: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    if name.is_empty() || name.contains(std::path::MAIN_SEPARATOR) {
        return None;
    }
    let search_path = search_path?;
    for dir in std::env::split_paths(search_path) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(name);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn place_executable(dir: &Path, name: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").expect("write stub");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("set mode");
    }

    #[cfg(unix)]
    #[test]
    fn functional_lookup_on_path_finds_executable_in_search_path() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        place_executable(tempdir.path(), "ollama");
        let search = std::env::join_paths([tempdir.path()]).expect("join paths");

        let hit = lookup_on_path("ollama", Some(search.as_os_str()));
        assert_eq!(hit, Some(tempdir.path().join("ollama")));
        assert!(lookup_on_path("tmux", Some(search.as_os_str())).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn regression_lookup_on_path_skips_non_executable_files() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        std::fs::write(tempdir.path().join("jq"), "not a program").expect("write plain file");
        let search = std::env::join_paths([tempdir.path()]).expect("join paths");

        assert!(lookup_on_path("jq", Some(search.as_os_str())).is_none());
    }

    #[test]
    fn unit_lookup_on_path_rejects_path_separators_and_empty_names() {
        let search = std::env::var_os("PATH");
        assert!(lookup_on_path("", search.as_deref()).is_none());
        assert!(lookup_on_path("bin/ollama", search.as_deref()).is_none());
    }

    #[tokio::test]
    async fn unit_endpoint_probe_reports_unreachable_service_as_false() {
        let probe = SystemProbe::new();
        // Reserved port with nothing listening.
        assert!(!probe.endpoint_healthy("http://127.0.0.1:1/").await);
    }

    #[test]
    fn unit_file_probe_matches_filesystem_presence() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let probe = SystemProbe::new();
        let present = tempdir.path().join("present.toml");
        std::fs::write(&present, "").expect("write");

        assert!(probe.file_exists(&present));
        assert!(!probe.file_exists(&tempdir.path().join("absent.toml")));
    }
}
