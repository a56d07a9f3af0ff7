//! The phased bootstrap engine.
//!
//! Phases are independent, idempotent units evaluated in a fixed order:
//! probe current state, mutate the configuration document, apply through the
//! external reconciler, then verify convergence. A later phase may assume an
//! earlier one converged, but the controller only reports prior
//! incompletion; it never hard-blocks, and each phase re-probes the external
//! dependencies it actually needs.

pub mod controller;
pub mod error;
pub mod paths;
pub mod phase;
pub mod phases;

pub use controller::{PhaseController, PhaseStatus};
pub use error::PhaseError;
pub use paths::HearthPaths;
pub use phase::{Phase, PhaseContext, PhaseOutcome, SectionDecl};
pub use phases::standard_phases;
