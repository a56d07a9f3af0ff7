use hearth_reconcile::{ConvergeTimeout, ReconcileError};
use thiserror::Error;

#[derive(Debug, Error)]
/// Fatal outcomes of a single phase run.
///
/// Probe-negative results are never errors; they mean "not yet done".
/// Announcement failures are logged by the speaker and never reach here.
pub enum PhaseError {
    /// The configuration document could not be read, parsed, or written.
    /// Raised before any external apply is attempted, so a malformed
    /// document is never partially applied.
    #[error("configuration mutation failed: {0:#}")]
    Mutation(anyhow::Error),

    /// The external apply command failed; carries its captured output
    /// verbatim for the operator to diagnose.
    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    /// A bounded convergence wait exhausted its attempt budget.
    #[error("convergence wait failed: {0}")]
    Timeout(#[from] ConvergeTimeout),

    /// Apply succeeded but re-probing found requirements still unsatisfied,
    /// named in declaration order.
    #[error("verification failed, still missing: {}", missing.join(", "))]
    Verification { missing: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_verification_error_names_missing_requirements_in_order() {
        let error = PhaseError::Verification {
            missing: vec!["ollama".to_string(), "jq".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "verification failed, still missing: ollama, jq"
        );
    }

    #[test]
    fn unit_reconcile_error_surfaces_captured_output() {
        let error = PhaseError::Reconcile(ReconcileError::CommandFailed {
            command: "darwin-rebuild switch".to_string(),
            status: "1".to_string(),
            output: "builder failed\n".to_string(),
        });
        let rendered = error.to_string();
        assert!(rendered.contains("status 1"));
        assert!(rendered.contains("builder failed"));
    }
}
