//! The concrete bootstrap phases, in their fixed order.

pub mod dashboard;
pub mod inference;
pub mod packages;
pub mod voice_output;

pub use dashboard::DashboardPhase;
pub use inference::InferencePhase;
pub use packages::PackagesPhase;
pub use voice_output::VoiceOutputPhase;

use crate::phase::Phase;

/// The full bootstrap sequence. Order matters: later phases depend on the
/// external side effects of earlier ones, which they re-probe themselves.
pub fn standard_phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(PackagesPhase),
        Box::new(InferencePhase),
        Box::new(VoiceOutputPhase),
        Box::new(DashboardPhase),
    ]
}
