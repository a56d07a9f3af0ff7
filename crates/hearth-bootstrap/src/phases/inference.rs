use std::time::Duration;

use hearth_core::write_text_atomic;
use hearth_probe::{lookup_on_path, Requirement};
use hearth_reconcile::{await_convergence, run_streaming};

use crate::error::PhaseError;
use crate::paths::HearthPaths;
use crate::phase::{Phase, PhaseContext};

/// Model pulled and served by default.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Local inference API root.
pub const INFERENCE_URL: &str = "http://127.0.0.1:11434";

const SERVICE_LABEL: &str = "com.hearth.ollama";
const STARTUP_POLL_INTERVAL: Duration = Duration::from_secs(1);
const STARTUP_POLL_ATTEMPTS: usize = 30;
const SELF_TEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Phase 2: a supervised local inference service with the default model
/// pulled and answering generation requests.
///
/// Owns no document sections; the service runs as a per-user launch agent
/// rather than a system-level declaration, so a broken model pull never
/// wedges the machine configuration.
pub struct InferencePhase;

#[async_trait::async_trait]
impl Phase for InferencePhase {
    fn name(&self) -> &'static str {
        "inference service"
    }

    fn ordinal(&self) -> u32 {
        2
    }

    fn requirements(&self, _paths: &HearthPaths) -> Vec<Requirement> {
        vec![Requirement::endpoint("inference service", INFERENCE_URL)]
    }

    async fn is_complete(&self, ctx: &PhaseContext<'_>) -> bool {
        ctx.probe.endpoint_healthy(INFERENCE_URL).await && model_installed(DEFAULT_MODEL).await
    }

    async fn after_apply(&self, ctx: &PhaseContext<'_>) -> Result<(), PhaseError> {
        ensure_launch_agent(ctx.paths).map_err(PhaseError::Mutation)?;
        reload_launch_agent(ctx.paths).await.map_err(PhaseError::Mutation)?;

        await_convergence(
            "inference service",
            STARTUP_POLL_INTERVAL,
            STARTUP_POLL_ATTEMPTS,
            || ctx.probe.endpoint_healthy(INFERENCE_URL),
        )
        .await?;

        if model_installed(DEFAULT_MODEL).await {
            tracing::info!(model = DEFAULT_MODEL, "model already present");
        } else {
            ctx.speaker
                .enqueue(&format!("Downloading the {DEFAULT_MODEL} model. This may take a while."));
            run_streaming("ollama", &["pull", DEFAULT_MODEL], None).await?;
        }

        if !generation_self_test(DEFAULT_MODEL).await {
            return Err(PhaseError::Verification {
                missing: vec!["inference self-test".to_string()],
            });
        }
        Ok(())
    }

    async fn missing(&self, ctx: &PhaseContext<'_>) -> Vec<String> {
        let mut missing = Vec::new();
        if !ctx.probe.endpoint_healthy(INFERENCE_URL).await {
            missing.push("inference service".to_string());
        }
        if !model_installed(DEFAULT_MODEL).await {
            missing.push(format!("model {DEFAULT_MODEL}"));
        }
        missing
    }
}

/// Writes the launch agent keeping the inference server alive, unless one
/// is already present.
fn ensure_launch_agent(paths: &HearthPaths) -> anyhow::Result<()> {
    let unit_path = paths.ollama_unit();
    if unit_path.exists() {
        return Ok(());
    }
    let server_binary = lookup_on_path("ollama", std::env::var_os("PATH").as_deref())
        .ok_or_else(|| anyhow::anyhow!("ollama binary not found on PATH"))?;
    let home = paths.home().display().to_string();
    let rendered = render_launch_agent(&server_binary.display().to_string(), &home);
    write_text_atomic(&unit_path, &rendered)?;
    tracing::info!(path = %unit_path.display(), "wrote inference launch agent");
    Ok(())
}

/// Cycles the launch agent. Unload is best-effort (the agent may not be
/// loaded yet); load must succeed.
async fn reload_launch_agent(paths: &HearthPaths) -> anyhow::Result<()> {
    let unit_path = paths.ollama_unit().display().to_string();
    let _ = tokio::process::Command::new("launchctl")
        .args(["unload", &unit_path])
        .output()
        .await;

    let output = tokio::process::Command::new("launchctl")
        .args(["load", &unit_path])
        .output()
        .await
        .map_err(|source| anyhow::anyhow!("failed to run launchctl load: {source}"))?;
    if !output.status.success() {
        anyhow::bail!(
            "launchctl load {} failed: {}",
            unit_path,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

fn render_launch_agent(server_binary: &str, home: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>Label</key>
	<string>{SERVICE_LABEL}</string>
	<key>ProgramArguments</key>
	<array>
		<string>{server_binary}</string>
		<string>serve</string>
	</array>
	<key>RunAtLoad</key>
	<true/>
	<key>KeepAlive</key>
	<true/>
	<key>StandardOutPath</key>
	<string>{home}/Library/Logs/ollama.log</string>
	<key>StandardErrorPath</key>
	<string>{home}/Library/Logs/ollama-error.log</string>
	<key>EnvironmentVariables</key>
	<dict>
		<key>PATH</key>
		<string>/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin:/run/current-system/sw/bin</string>
	</dict>
</dict>
</plist>
"#
    )
}

/// Parses `ollama list` output into model names: skip the header line, take
/// the first field of each remaining line.
pub fn parse_model_listing(raw: &str) -> Vec<String> {
    raw.lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| line.split_whitespace().next())
        .map(|name| name.to_string())
        .collect()
}

/// Whether `model` appears in a listing, tag-insensitively: the listing
/// shows `llama3.2:latest` while callers ask for `llama3.2`.
pub fn model_in_listing(raw: &str, model: &str) -> bool {
    let tag_prefix = format!("{model}:");
    parse_model_listing(raw)
        .iter()
        .any(|name| name == model || name.starts_with(&tag_prefix))
}

/// Probe-style model check: listing failures mean "not installed".
async fn model_installed(model: &str) -> bool {
    let output = match tokio::process::Command::new("ollama")
        .arg("list")
        .output()
        .await
    {
        Ok(output) if output.status.success() => output,
        _ => return false,
    };
    model_in_listing(&String::from_utf8_lossy(&output.stdout), model)
}

/// One non-streamed generation request proving the model actually answers,
/// not just that its weights are on disk.
async fn generation_self_test(model: &str) -> bool {
    let client = match reqwest::Client::builder().timeout(SELF_TEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(_) => return false,
    };
    let body = serde_json::json!({
        "model": model,
        "prompt": "Say 'test successful' and nothing else.",
        "stream": false,
    });
    match client
        .post(format!("{INFERENCE_URL}/api/generate"))
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTING: &str = "\
NAME              ID              SIZE      MODIFIED
llama3.2:latest   a80c4f17acd5    2.0 GB    3 days ago
qwen2.5:7b        845dbda0ea48    4.7 GB    2 weeks ago
";

    #[test]
    fn unit_parse_model_listing_skips_header_and_blank_lines() {
        let models = parse_model_listing(SAMPLE_LISTING);
        assert_eq!(
            models,
            vec!["llama3.2:latest".to_string(), "qwen2.5:7b".to_string()]
        );
        assert!(parse_model_listing("NAME  ID  SIZE  MODIFIED\n").is_empty());
    }

    #[test]
    fn unit_model_in_listing_matches_bare_name_against_tagged_entry() {
        assert!(model_in_listing(SAMPLE_LISTING, "llama3.2"));
        assert!(model_in_listing(SAMPLE_LISTING, "llama3.2:latest"));
        assert!(!model_in_listing(SAMPLE_LISTING, "llama3"));
        assert!(!model_in_listing(SAMPLE_LISTING, "mistral"));
    }

    #[test]
    fn unit_render_launch_agent_embeds_binary_logs_and_label() {
        let rendered = render_launch_agent("/run/current-system/sw/bin/ollama", "/Users/carol");
        assert!(rendered.contains("<string>com.hearth.ollama</string>"));
        assert!(rendered.contains("<string>/run/current-system/sw/bin/ollama</string>"));
        assert!(rendered.contains("<string>serve</string>"));
        assert!(rendered.contains("/Users/carol/Library/Logs/ollama.log"));
        assert!(rendered.contains("<key>KeepAlive</key>"));
    }

    #[test]
    fn unit_inference_phase_owns_no_document_sections() {
        assert!(InferencePhase.sections().is_empty());
    }
}
