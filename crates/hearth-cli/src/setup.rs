//! The `hearth setup` flow: nix + nix-darwin detection and installation,
//! plus seeding the initial configuration document.

use anyhow::{Context, Result};
use hearth_bootstrap::HearthPaths;
use hearth_core::write_text_atomic;
use hearth_document::OWNER_NAME_TOKEN;
use hearth_probe::lookup_on_path;
use hearth_reconcile::run_streaming;

const NIX_INSTALL_SCRIPT: &str =
    "curl --proto '=https' --tlsv1.2 -sSf -L https://install.determinate.systems/nix | sh -s -- install";

const NIX_DARWIN_INSTALL_SCRIPT: &str = r#"
if [ -e '/nix/var/nix/profiles/default/etc/profile.d/nix-daemon.sh' ]; then
	. '/nix/var/nix/profiles/default/etc/profile.d/nix-daemon.sh'
fi
nix-build https://github.com/LnL7/nix-darwin/archive/master.tar.gz -A installer
./result/bin/darwin-installer
"#;

const DEFAULT_DOCUMENT_TEMPLATE: &str = r#"{ config, pkgs, ... }:
{
  # Basic system packages
  environment.systemPackages = with pkgs; [
    vim
    git
    curl
    wget
  ];

  services.nix-daemon.enable = true;
  nix.settings.experimental-features = "nix-command flakes";

  system.primaryUser = "__OWNER_NAME__";
  system.stateVersion = 5;
}
"#;

pub fn nix_installed() -> bool {
    lookup_on_path("nix", std::env::var_os("PATH").as_deref()).is_some()
}

/// nix-darwin counts as installed when its rebuild command resolves or the
/// configuration document is already in place.
pub fn nix_darwin_installed(paths: &HearthPaths) -> bool {
    lookup_on_path("darwin-rebuild", std::env::var_os("PATH").as_deref()).is_some()
        || paths.document().exists()
}

/// Renders the initial document with the owner declaration filled in.
pub fn render_default_document(owner: &str) -> String {
    DEFAULT_DOCUMENT_TEMPLATE.replace(OWNER_NAME_TOKEN, owner)
}

fn resolved_owner(paths: &HearthPaths) -> String {
    std::env::var("USER")
        .ok()
        .map(|owner| owner.trim().to_string())
        .filter(|owner| !owner.is_empty())
        .or_else(|| {
            paths
                .home()
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "hearth".to_string())
}

/// Writes the initial configuration document, unless one already exists.
pub fn seed_document(paths: &HearthPaths) -> Result<bool> {
    let document_path = paths.document();
    if document_path.exists() {
        return Ok(false);
    }
    let rendered = render_default_document(&resolved_owner(paths));
    write_text_atomic(&document_path, &rendered)
        .with_context(|| format!("failed to seed {}", document_path.display()))?;
    Ok(true)
}

pub async fn install_nix() -> Result<()> {
    run_streaming("sh", &["-c", NIX_INSTALL_SCRIPT], None)
        .await
        .map_err(|error| anyhow::anyhow!("nix installation failed: {error}"))?;
    Ok(())
}

pub async fn install_nix_darwin() -> Result<()> {
    run_streaming("sh", &["-c", NIX_DARWIN_INSTALL_SCRIPT], None)
        .await
        .map_err(|error| anyhow::anyhow!("nix-darwin installation failed: {error}"))?;
    Ok(())
}

/// Line-based y/n confirmation; EOF counts as "no".
pub fn confirm(prompt: &str) -> bool {
    use std::io::{BufRead, Write};

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("{prompt} (y/n): ");
        let _ = std::io::stdout().flush();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return false,
            Ok(_) => {}
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => println!("Please answer 'y' or 'n'"),
        }
    }
}
