use hearth_document::{ConfigDocument, OWNER_NAME_TOKEN};
use hearth_probe::StateProbe;
use hearth_reconcile::Reconciler;
use hearth_voice::Speaker;

use crate::error::PhaseError;
use crate::paths::HearthPaths;
use crate::phase::{Phase, PhaseContext, PhaseOutcome};

/// Per-phase report used for operator-facing status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStatus {
    pub ordinal: u32,
    pub name: &'static str,
    pub complete: bool,
    pub missing: Vec<String>,
}

/// Drives phases through probe → mutate → apply → verify.
///
/// One foreground invocation runs exactly the phases it was asked to run,
/// in declared order; there is no implicit chaining and no automatic retry.
pub struct PhaseController<'a> {
    probe: &'a dyn StateProbe,
    reconciler: &'a dyn Reconciler,
    speaker: &'a Speaker,
    paths: &'a HearthPaths,
    env_owner: Option<String>,
}

impl<'a> PhaseController<'a> {
    pub fn new(
        probe: &'a dyn StateProbe,
        reconciler: &'a dyn Reconciler,
        speaker: &'a Speaker,
        paths: &'a HearthPaths,
        env_owner: Option<String>,
    ) -> Self {
        Self {
            probe,
            reconciler,
            speaker,
            paths,
            env_owner,
        }
    }

    fn context(&self) -> PhaseContext<'_> {
        PhaseContext {
            probe: self.probe,
            speaker: self.speaker,
            paths: self.paths,
        }
    }

    /// Runs one phase to a fatal error or convergence. Steps are strictly
    /// ordered; a mutation error aborts before any external apply, and a
    /// verification failure names exactly what is still missing.
    pub async fn run_phase(&self, phase: &dyn Phase) -> Result<PhaseOutcome, PhaseError> {
        let ctx = self.context();
        self.speaker
            .enqueue(&format!("Starting phase {}, {}.", phase.ordinal(), phase.name()));

        if phase.is_complete(&ctx).await {
            self.speaker
                .enqueue(&format!("Phase {} is already complete.", phase.ordinal()));
            return Ok(PhaseOutcome::AlreadyComplete);
        }

        let sections = phase.sections();
        if !sections.is_empty() {
            let document_path = self.paths.document();
            let mut document =
                ConfigDocument::load(&document_path).map_err(PhaseError::Mutation)?;
            let owner = document
                .resolve_owner(self.env_owner.as_deref(), Some(self.paths.home()))
                .unwrap_or_else(|| "hearth".to_string());
            let placeholders = [(OWNER_NAME_TOKEN, owner.as_str())];

            let mut changed = false;
            for section in sections {
                changed |= document
                    .ensure_section(section.marker, section.template, &placeholders)
                    .map_err(PhaseError::Mutation)?;
            }
            if changed {
                document.save().map_err(PhaseError::Mutation)?;
                tracing::info!(
                    phase = phase.name(),
                    path = %document_path.display(),
                    "configuration document updated"
                );
            }

            // Applied even when the document already carried our sections: a
            // previous run may have mutated successfully and failed to apply.
            self.reconciler.apply().await?;
        }

        phase.after_apply(&ctx).await?;

        let missing = phase.missing(&ctx).await;
        if !missing.is_empty() {
            return Err(PhaseError::Verification { missing });
        }

        self.speaker
            .enqueue(&format!("Phase {} complete.", phase.ordinal()));
        Ok(PhaseOutcome::Converged)
    }

    pub async fn phase_status(&self, phase: &dyn Phase) -> PhaseStatus {
        let ctx = self.context();
        let missing = phase.missing(&ctx).await;
        PhaseStatus {
            ordinal: phase.ordinal(),
            name: phase.name(),
            complete: missing.is_empty() && phase.is_complete(&ctx).await,
            missing,
        }
    }

    /// Names of incomplete phases declared before `target_ordinal`. The
    /// controller reports these and lets the operator decide; it never
    /// hard-blocks a later phase on an earlier one.
    pub async fn incomplete_predecessors(
        &self,
        phases: &[Box<dyn Phase>],
        target_ordinal: u32,
    ) -> Vec<&'static str> {
        let ctx = self.context();
        let mut incomplete = Vec::new();
        for phase in phases {
            if phase.ordinal() < target_ordinal && !phase.is_complete(&ctx).await {
                incomplete.push(phase.name());
            }
        }
        incomplete
    }
}
