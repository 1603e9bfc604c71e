//! # Mirror Engine - Remote Synchronization Library
//!
//! Mirrors directory trees to and from a remote host over SSH (SFTP) and runs
//! remote shell commands, reporting their exit status and output.
//!
//! ## Overview
//!
//! The engine works on an already-authenticated session. It features:
//! - Recursive upload, download and delete of remote trees
//! - Directory-before-contents ordering on upload/download, contents-before-
//!   directory on delete
//! - "Absent" as a normal inspection result, separate from transport faults
//! - Per-file progress reporting via callbacks
//! - Optional checksum verification after each transfer
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{run_shell_command, upload_directory, CommandOptions, SshSession, UploadOptions};
//! use std::net::TcpStream;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tcp = TcpStream::connect("backup.example.org:22")?;
//! let mut ssh = ssh2::Session::new()?;
//! ssh.set_tcp_stream(tcp);
//! ssh.handshake()?;
//! ssh.userauth_agent("backup")?;
//! let session = SshSession::new(ssh);
//!
//! let mut report = |event: &engine::ProgressEvent| println!("{}", event.relative_path);
//! let summary = upload_directory(
//!     &session,
//!     Path::new("./dataset"),
//!     "/srv/incoming/dataset",
//!     &UploadOptions::default(),
//!     Some(&mut report),
//! )?;
//! println!("Uploaded {} files", summary.files);
//!
//! let result = run_shell_command(&session, "ls /srv/incoming", &CommandOptions::default())?;
//! println!("exit {}: {}", result.exit_code, result.stdout);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (EntryKind, CommandResult, options)
//! - **error**: Error types and handling
//! - **transport**: Session and channel traits consumed by the engine
//! - **ssh**: Transport binding over libssh2
//! - **inspect**: Remote entry inspection
//! - **transfer**: Recursive upload, download and delete
//! - **command**: Remote shell command execution
//! - **fs_ops**: Local filesystem operations
//! - **progress**: Progress callback trait
//! - **checksums**: Checksum computation and verification

pub mod model;
pub mod error;
pub mod transport;
pub mod ssh;
pub mod inspect;
pub mod transfer;
pub mod command;
pub mod fs_ops;
pub mod progress;
pub mod checksums;

// Re-export main types and functions
pub use model::{
    CommandOptions, CommandResult, DownloadOptions, EntryKind, ExistingDirPolicy, ProgressEvent,
    TransferDirection, TransferSummary, UploadOptions,
};
pub use error::{EngineError, RemoteOp, TransportError};
pub use transport::{ExecChannel, ExecOutput, RemoteStat, Session, TransferChannel};
pub use ssh::SshSession;
pub use inspect::{inspect, path_exists};
pub use transfer::{
    delete_file, delete_tree, download_file, download_file_or_tree, upload_directory, upload_file,
};
pub use command::run_shell_command;
pub use progress::ProgressCallback;
pub use checksums::{ChecksumAlgorithm, ChecksumValue};
