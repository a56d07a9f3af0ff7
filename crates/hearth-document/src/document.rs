use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hearth_core::write_text_atomic;

/// Sentinel replaced by the resolved account identity during rendering.
pub const OWNER_NAME_TOKEN: &str = "__OWNER_NAME__";

const OWNER_DECLARATION: &str = "system.primaryUser";

/// In-memory model of the configuration document.
///
/// Owned exclusively by the running process; it is read once, mutated in
/// memory, and written back atomically only when something changed.
#[derive(Debug)]
pub struct ConfigDocument {
    path: PathBuf,
    lines: Vec<String>,
    closing_index: usize,
    markers: BTreeSet<String>,
    dirty: bool,
}

impl ConfigDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        Self::from_text(path, &raw)
    }

    pub fn from_text(path: &Path, raw: &str) -> Result<Self> {
        let lines: Vec<String> = raw.lines().map(|line| line.to_string()).collect();
        let closing_index = lines
            .iter()
            .rposition(|line| line == "}")
            .with_context(|| {
                format!(
                    "configuration {} has no closing delimiter line",
                    path.display()
                )
            })?;
        let markers = index_markers(&lines);
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            closing_index,
            markers,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotency is keyed on exact marker-line presence.
    pub fn contains_marker(&self, marker: &str) -> bool {
        self.markers.contains(marker.trim())
    }

    /// Inserts the rendered section immediately before the closing delimiter
    /// unless the marker is already present. Returns whether the document
    /// changed. Sections land in request order, preserving human-diffable
    /// history across phases.
    pub fn ensure_section(
        &mut self,
        marker: &str,
        template: &str,
        placeholders: &[(&str, &str)],
    ) -> Result<bool> {
        let marker = marker.trim();
        if marker.is_empty() {
            bail!("section marker cannot be empty");
        }
        if !template.contains(marker) {
            bail!("section template does not carry its marker '{marker}'");
        }
        if self.contains_marker(marker) {
            return Ok(false);
        }

        let rendered = render_template(template, placeholders);
        let mut block: Vec<String> = Vec::new();
        // One separating blank line keeps inserted sections readable.
        if self.closing_index > 0 && !self.lines[self.closing_index - 1].trim().is_empty() {
            block.push(String::new());
        }
        block.extend(rendered.lines().map(|line| line.to_string()));

        for line in &block {
            let trimmed = line.trim();
            if trimmed.starts_with('#') {
                self.markers.insert(trimmed.to_string());
            }
        }
        let insert_at = self.closing_index;
        self.lines.splice(insert_at..insert_at, block.iter().cloned());
        self.closing_index += block.len();
        self.dirty = true;
        Ok(true)
    }

    /// Owner declared in the document itself, e.g.
    /// `system.primaryUser = "alice";`.
    pub fn declared_owner(&self) -> Option<String> {
        self.lines
            .iter()
            .find(|line| line.contains(OWNER_DECLARATION))
            .and_then(|line| extract_quoted(line))
    }

    /// Resolves the account identity used for `__OWNER_NAME__`: an existing
    /// owner declaration wins, then the environment-supplied name, then the
    /// invoking user's home directory basename.
    pub fn resolve_owner(&self, env_owner: Option<&str>, home_dir: Option<&Path>) -> Option<String> {
        if let Some(owner) = self.declared_owner() {
            return Some(owner);
        }
        if let Some(owner) = env_owner.map(str::trim).filter(|owner| !owner.is_empty()) {
            return Some(owner.to_string());
        }
        home_dir
            .and_then(|dir| dir.file_name())
            .and_then(|name| name.to_str())
            .map(|name| name.to_string())
    }

    pub fn text(&self) -> String {
        let mut rendered = self.lines.join("\n");
        rendered.push('\n');
        rendered
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the document back atomically, but only when a mutation
    /// actually changed it. Returns whether a write happened.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        write_text_atomic(&self.path, &self.text())
            .with_context(|| format!("failed to write configuration {}", self.path.display()))?;
        self.dirty = false;
        Ok(true)
    }
}

fn index_markers(lines: &[String]) -> BTreeSet<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| line.starts_with('#'))
        .map(|line| line.to_string())
        .collect()
}

fn render_template(template: &str, placeholders: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (token, value) in placeholders {
        rendered = rendered.replace(token, value);
    }
    rendered
}

fn extract_quoted(line: &str) -> Option<String> {
    let mut parts = line.split('"');
    parts.next()?;
    parts.next().map(|value| value.to_string())
}
