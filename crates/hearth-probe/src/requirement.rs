use std::path::PathBuf;

use crate::probe::StateProbe;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A single probe target: how a requirement is detected on the machine.
pub enum ProbeTarget {
    /// Executable resolvable on `PATH`.
    Binary(String),
    /// Local HTTP endpoint answering 200.
    Endpoint(String),
    /// File present on disk.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A named requirement a phase must ensure and verify.
pub struct Requirement {
    pub name: String,
    pub target: ProbeTarget,
}

impl Requirement {
    pub fn binary(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: ProbeTarget::Binary(name.to_string()),
        }
    }

    pub fn endpoint(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            target: ProbeTarget::Endpoint(url.to_string()),
        }
    }

    pub fn file(name: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            target: ProbeTarget::File(path),
        }
    }
}

/// Returns the names of unsatisfied requirements in declaration order, so
/// user-facing "missing: ..." messages are deterministic.
pub async fn missing_requirements(
    probe: &dyn StateProbe,
    requirements: &[Requirement],
) -> Vec<String> {
    let mut missing = Vec::new();
    for requirement in requirements {
        if !probe.satisfied(&requirement.target).await {
            missing.push(requirement.name.clone());
        }
    }
    missing
}

/// True when every requirement probes as satisfied.
pub async fn all_satisfied(probe: &dyn StateProbe, requirements: &[Requirement]) -> bool {
    for requirement in requirements {
        if !probe.satisfied(&requirement.target).await {
            return false;
        }
    }
    true
}
