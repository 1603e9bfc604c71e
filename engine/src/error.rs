//! Error types for the synchronization engine.
//!
//! `TransportError` classifies failures reported by the transport session
//! (SFTP status codes, session errors, stream I/O). `EngineError` is what the
//! public operations return: every failure aborts the current call and carries
//! the path that was being processed so the caller can decide on cleanup.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// SFTP status code for "no such file".
const SFTP_NO_SUCH_FILE: i32 = 2;
/// SFTP status code for "permission denied".
const SFTP_PERMISSION_DENIED: i32 = 3;
/// SFTP status code for "file already exists" (protocol v6, reported by some servers).
const SFTP_FILE_ALREADY_EXISTS: i32 = 11;

/// A failure reported by the transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote side reported that the path does not exist.
    #[error("no such file")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("permission denied")]
    PermissionDenied,

    /// Any other SFTP status code.
    #[error("sftp status {code}: {message}")]
    Sftp { code: i32, message: String },

    /// Session-level failure (channel, socket, protocol).
    #[error("session error {code}: {message}")]
    Session { code: i32, message: String },

    /// Stream-level failure while moving file contents.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True when the remote side reported "no such file".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<ssh2::Error> for TransportError {
    fn from(err: ssh2::Error) -> Self {
        match err.code() {
            ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => Self::NotFound,
            ssh2::ErrorCode::SFTP(SFTP_PERMISSION_DENIED) => Self::PermissionDenied,
            ssh2::ErrorCode::SFTP(SFTP_FILE_ALREADY_EXISTS) => Self::AlreadyExists,
            ssh2::ErrorCode::SFTP(code) => Self::Sftp {
                code,
                message: err.message().to_string(),
            },
            ssh2::ErrorCode::Session(code) => Self::Session {
                code,
                message: err.message().to_string(),
            },
        }
    }
}

/// The remote call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Stat,
    List,
    Read,
    Write,
    MakeDirectory,
    Remove,
    RemoveDirectory,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOp::Stat => "stat",
            RemoteOp::List => "list",
            RemoteOp::Read => "read",
            RemoteOp::Write => "write",
            RemoteOp::MakeDirectory => "mkdir",
            RemoteOp::Remove => "remove",
            RemoteOp::RemoveDirectory => "rmdir",
        };
        f.write_str(name)
    }
}

/// Errors returned by engine operations.
///
/// None of these are retried internally. A recursive operation that fails
/// leaves whatever it already transferred in place.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested remote path does not exist
    #[error("remote path not found: {path}")]
    RemotePathNotFound { path: String },

    /// Stat succeeded but reported no file type bits
    #[error("metadata unavailable for remote path: {path}")]
    MetadataUnavailable { path: String },

    /// A stat, list or read call failed
    #[error("remote {op} failed for {path}: {source}")]
    RemoteReadError {
        op: RemoteOp,
        path: String,
        #[source]
        source: TransportError,
    },

    /// A mkdir, write, remove or rmdir call failed
    #[error("remote {op} failed for {path}: {source}")]
    RemoteWriteError {
        op: RemoteOp,
        path: String,
        #[source]
        source: TransportError,
    },

    /// The file-transfer sub-channel could not be opened
    #[error("failed to open transfer channel: {source}")]
    TransferChannelError {
        #[source]
        source: TransportError,
    },

    /// The command-execution sub-channel could not be opened or used
    #[error("command channel failed for '{command}': {source}")]
    CommandChannelError {
        command: String,
        #[source]
        source: TransportError,
    },

    /// Failed to read from a local file
    #[error("failed to read local file: {}", path.display())]
    LocalReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write to a local file
    #[error("failed to write local file: {}", path.display())]
    LocalWriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to enumerate a local directory
    #[error("failed to enumerate directory: {}", path.display())]
    EnumerationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a local directory
    #[error("failed to create directory: {}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A local path is not usable for the requested operation
    #[error("invalid path: {} ({reason})", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// The transferred copy does not hash to the source's checksum
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    VerificationFailed {
        path: String,
        expected: String,
        actual: String,
    },
}
