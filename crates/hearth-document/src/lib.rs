//! The declarative configuration document mutated by bootstrap phases.
//!
//! The document (a nix-darwin configuration file) is modeled structurally:
//! body lines, a marker-presence index, and the unique closing delimiter.
//! Each phase's section marker appears at most once; re-running a phase's
//! mutation against a document that already carries its marker is a no-op,
//! and a run with no changes performs zero writes. That is the idempotency
//! guarantee the whole bootstrap leans on.

pub mod document;

pub use document::{ConfigDocument, OWNER_NAME_TOKEN};
