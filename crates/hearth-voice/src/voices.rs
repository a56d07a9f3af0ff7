use anyhow::{Context, Result};

/// Parses `say -v ?` output into voice names (the first field of each line).
pub fn parse_voice_listing(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.to_string())
        .collect()
}

/// Exact first-field match; "Jamie" must not match "Jamie-Premium" text in
/// the language or comment columns.
pub fn voice_in_listing(raw: &str, name: &str) -> bool {
    raw.lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|candidate| candidate == name)
}

/// Lists the voices installed on this machine.
pub async fn list_available_voices() -> Result<Vec<String>> {
    let output = tokio::process::Command::new("say")
        .args(["-v", "?"])
        .output()
        .await
        .context("failed to run say -v ?")?;
    if !output.status.success() {
        anyhow::bail!("say -v ? exited with status {}", output.status);
    }
    Ok(parse_voice_listing(&String::from_utf8_lossy(&output.stdout)))
}

/// Whether a specific voice is installed. Detection failures mean "not
/// available", never an error.
pub async fn is_voice_available(name: &str) -> bool {
    match list_available_voices().await {
        Ok(voices) => voices.iter().any(|candidate| candidate == name),
        Err(_) => false,
    }
}
