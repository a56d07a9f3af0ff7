use async_trait::async_trait;
use hearth_probe::{all_satisfied, missing_requirements, Requirement, StateProbe};
use hearth_voice::Speaker;

use crate::error::PhaseError;
use crate::paths::HearthPaths;

/// A document declaration a phase owns: the marker that keys idempotency
/// plus the template inserted when the marker is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionDecl {
    pub marker: &'static str,
    pub template: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How a phase run ended when it did not fail.
pub enum PhaseOutcome {
    /// Probing found everything already satisfied; nothing was touched.
    AlreadyComplete,
    /// The phase reconciled and verified convergence.
    Converged,
}

/// Capabilities handed to a phase while it runs.
pub struct PhaseContext<'a> {
    pub probe: &'a dyn StateProbe,
    pub speaker: &'a Speaker,
    pub paths: &'a HearthPaths,
}

#[async_trait]
/// An ordered, idempotent unit of bootstrap work.
///
/// Phases are constructed once as a static ordered list and never mutated;
/// re-evaluating them on every run is the idempotency guarantee.
pub trait Phase: Send + Sync {
    fn name(&self) -> &'static str;

    fn ordinal(&self) -> u32;

    /// Requirements probed for completion and re-probed for verification.
    fn requirements(&self, paths: &HearthPaths) -> Vec<Requirement>;

    /// Document declarations this phase owns. Phases owning none skip the
    /// external apply entirely.
    fn sections(&self) -> &[SectionDecl] {
        &[]
    }

    async fn is_complete(&self, ctx: &PhaseContext<'_>) -> bool {
        all_satisfied(ctx.probe, &self.requirements(ctx.paths)).await
    }

    /// Phase-specific convergence work after the external apply: starting
    /// services, pulling models, writing auxiliary settings.
    async fn after_apply(&self, _ctx: &PhaseContext<'_>) -> Result<(), PhaseError> {
        Ok(())
    }

    /// Verification probe; unsatisfied names come back in declaration order.
    async fn missing(&self, ctx: &PhaseContext<'_>) -> Vec<String> {
        missing_requirements(ctx.probe, &self.requirements(ctx.paths)).await
    }
}
