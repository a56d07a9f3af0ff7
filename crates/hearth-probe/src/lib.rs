//! State probing for the bootstrap phases.
//!
//! A probe answers "is requirement X already satisfied?" by checking binary
//! availability, local service reachability, or file presence. Probes never
//! fail: a missing binary, an unreachable endpoint, or an absent file is
//! "not yet done", not an error. The [`StateProbe`] trait is the seam that
//! lets tests substitute deterministic fakes for real machine state.

pub mod probe;
pub mod requirement;

pub use probe::{lookup_on_path, StateProbe, SystemProbe};
pub use requirement::{all_satisfied, missing_requirements, ProbeTarget, Requirement};
