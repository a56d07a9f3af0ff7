use hearth_probe::Requirement;

use crate::paths::HearthPaths;
use crate::phase::{Phase, SectionDecl};

/// Binaries phase one must put on `PATH`.
pub const BOOTSTRAP_PACKAGES: &[&str] = &["ollama", "tmux", "jq"];

const SECTIONS: &[SectionDecl] = &[
    SectionDecl {
        marker: "# Phase 1 bootstrap packages",
        template: "  # Phase 1 bootstrap packages\n  environment.systemPackages = with pkgs; [\n    ollama\n    tmux\n    jq\n  ];",
    },
    SectionDecl {
        marker: "# Phase 1 remote access",
        template: "  # Phase 1 remote access\n  services.openssh.enable = true;",
    },
    SectionDecl {
        marker: "# Phase 1 auto-login",
        // The appliance runs on dedicated, physically secured hardware and
        // must come back up unattended after a power loss.
        template: "  # Phase 1 auto-login\n  system.defaults.loginwindow = {\n    autoLoginUser = \"__OWNER_NAME__\";\n  };",
    },
];

/// Phase 1: base packages plus remote access and unattended recovery.
pub struct PackagesPhase;

#[async_trait::async_trait]
impl Phase for PackagesPhase {
    fn name(&self) -> &'static str {
        "base packages"
    }

    fn ordinal(&self) -> u32 {
        1
    }

    fn requirements(&self, _paths: &HearthPaths) -> Vec<Requirement> {
        BOOTSTRAP_PACKAGES
            .iter()
            .map(|package| Requirement::binary(package))
            .collect()
    }

    fn sections(&self) -> &[SectionDecl] {
        SECTIONS
    }
}
