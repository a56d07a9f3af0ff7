use std::path::Path;

use anyhow::{bail, Context, Result};

/// Writes text through a sibling temp file plus rename so readers never
/// observe partial data.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    write_text_with_mode(path, content, None)
}

/// Like [`write_text_atomic`], but the final file is readable and writable
/// by the owning user only (mode 0600). Used for persisted settings files.
pub fn write_text_private(path: &Path, content: &str) -> Result<()> {
    write_text_with_mode(path, content, Some(0o600))
}

/// Like [`write_text_atomic`], but the final file is executable (mode
/// 0755). Used for installed launcher scripts.
pub fn write_text_executable(path: &Path, content: &str) -> Result<()> {
    write_text_with_mode(path, content, Some(0o755))
}

fn write_text_with_mode(path: &Path, content: &str, unix_mode: Option<u32>) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let temp_name = format!(
        ".{}.hearth-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("write"),
        std::process::id(),
    );
    let temp_path = parent_dir.join(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;

    #[cfg(unix)]
    if let Some(mode) = unix_mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("failed to restrict {}", temp_path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = unix_mode;

    std::fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}
