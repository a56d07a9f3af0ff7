//! External apply invocation and bounded convergence polling.
//!
//! The reconciler fails closed: a non-zero exit from the apply command is a
//! fatal error carrying the captured output verbatim, never silently
//! swallowed. Convergence waits are always bounded (interval × attempts);
//! there is no unbounded wait anywhere in the bootstrap core.

pub mod command;
pub mod convergence;

pub use command::{run_streaming, CommandCapture, CommandReconciler, ReconcileError, Reconciler};
pub use convergence::{await_convergence, ConvergeTimeout};
