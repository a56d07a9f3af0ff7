//! Foundational low-level utilities shared across Hearth crates.
//!
//! Provides atomic file-write helpers and owner-only settings persistence
//! used by the configuration document and the auxiliary voice/dashboard
//! config files.

pub mod atomic_io;
pub mod settings;

pub use atomic_io::{write_text_atomic, write_text_executable, write_text_private};
pub use settings::{load_settings, store_settings_private};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("document.nix");
        write_text_atomic(&path, "{ }\n").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "{ }\n");
    }

    #[test]
    fn unit_write_text_atomic_replaces_existing_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("document.nix");
        write_text_atomic(&path, "first").expect("first write");
        write_text_atomic(&path, "second").expect("second write");
        assert_eq!(read_to_string(&path).expect("read"), "second");
    }

    #[cfg(unix)]
    #[test]
    fn functional_write_text_private_restricts_permissions_to_owner() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("voice.toml");
        write_text_private(&path, "enabled = true\n").expect("write");
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn functional_write_text_executable_sets_exec_bits() {
        use std::os::unix::fs::PermissionsExt;

        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("launcher");
        write_text_executable(&path, "#!/bin/sh\n").expect("write");
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn regression_write_text_atomic_rejects_directory_destination() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "x").expect_err("directory must be rejected");
        assert!(error.to_string().contains("directory"));
    }
}
