//! Core data model for remote synchronization.
//!
//! This module defines the values passed into and out of engine operations:
//! - EntryKind: what a remote path resolves to
//! - TransferDirection, ProgressEvent: per-file progress reporting
//! - CommandResult: outcome of a remote shell command
//! - TransferSummary: counters returned by recursive operations
//! - UploadOptions, DownloadOptions, CommandOptions: per-call behavior

use serde::Serialize;
use std::fmt;

use crate::checksums::ChecksumAlgorithm;

/// What a remote path resolves to.
///
/// `Absent` is a normal outcome of inspection, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Absent,
}

/// Direction of a recursive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
    Delete,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::Upload => write!(f, "Upload"),
            TransferDirection::Download => write!(f, "Download"),
            TransferDirection::Delete => write!(f, "Delete"),
        }
    }
}

/// Reported once per file, right after its bytes were fully transferred or
/// the file was removed. Never reported for directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub direction: TransferDirection,
    /// Slash-separated path relative to the transfer root
    pub relative_path: String,
    /// Bytes moved for this file (0 for deletions)
    pub bytes: u64,
}

/// Exit status and captured output of a remote shell command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    /// 128 plus the signal number for a command killed by a signal, or -1
    /// if the signal is not a standard one
    pub exit_code: i32,
    /// Signal that ended the command, if any
    pub signal: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Counters for one recursive call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    /// Files transferred or removed
    pub files: u64,
    /// Directories created or removed
    pub directories: u64,
    /// Bytes transferred (0 for deletions)
    pub bytes: u64,
}

/// What to do when an uploaded directory already exists remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingDirPolicy {
    /// Treat the failed mkdir as a write error
    #[default]
    Fail,
    /// Reuse the existing directory and write into it
    Merge,
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub existing_dirs: ExistingDirPolicy,
    /// Re-read each uploaded file and compare checksums
    pub verify: Option<ChecksumAlgorithm>,
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Re-read each downloaded file and compare checksums
    pub verify: Option<ChecksumAlgorithm>,
    /// Apply the remote modification time to downloaded files
    pub preserve_mtime: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        DownloadOptions {
            verify: None,
            preserve_mtime: true,
        }
    }
}

/// How a command is wrapped before it is sent to the remote host.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Shell that interprets the command
    pub shell: String,
    /// Run the shell with `-i` so login profiles and aliases apply
    pub interactive: bool,
    /// Request a pseudo-terminal before executing
    pub pty: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        CommandOptions {
            shell: "bash".to_string(),
            interactive: true,
            pty: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_result_success() {
        let ok = CommandResult {
            exit_code: 0,
            signal: None,
            stdout: "done\n".to_string(),
            stderr: String::new(),
        };
        let failed = CommandResult {
            exit_code: 2,
            ..ok.clone()
        };
        assert!(ok.success());
        assert!(!failed.success());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(UploadOptions::default().existing_dirs, ExistingDirPolicy::Fail);
        assert!(DownloadOptions::default().preserve_mtime);

        let options = CommandOptions::default();
        assert_eq!(options.shell, "bash");
        assert!(options.interactive);
        assert!(options.pty);
    }
}
