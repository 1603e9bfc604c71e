//! Transport session contract.
//!
//! The engine never authenticates or manages connections. It consumes an
//! already-established session through these traits; `crate::ssh` binds
//! them to libssh2, and tests bind them to an in-memory tree.

use std::io::{Read, Write};

use crate::error::TransportError;

/// Attributes returned by a remote stat call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteStat {
    /// Mode bits including the file type (`S_IFMT`), if the server sent them
    pub perm: Option<u32>,
    pub size: Option<u64>,
    /// Modification time, seconds since the Unix epoch
    pub mtime: Option<u64>,
}

/// Captured output of one remote process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Meaningless when `signal` is set
    pub exit_code: i32,
    /// Signal name without the `SIG` prefix, if the process was killed
    pub signal: Option<String>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// An authenticated connection able to open sub-channels.
pub trait Session {
    type Transfer: TransferChannel;
    type Exec: ExecChannel;

    /// Open the file-transfer sub-channel (SFTP).
    fn open_transfer_channel(&self) -> Result<Self::Transfer, TransportError>;

    /// Open a command-execution sub-channel.
    fn open_exec_channel(&self) -> Result<Self::Exec, TransportError>;
}

/// File-transfer sub-channel. Every call is a blocking round trip.
pub trait TransferChannel {
    /// Attributes of `path`, following symlinks.
    fn stat(&mut self, path: &str) -> Result<RemoteStat, TransportError>;

    /// Attributes of `path` itself; a symlink is reported as a link.
    fn lstat(&mut self, path: &str) -> Result<RemoteStat, TransportError>;

    /// Names of the entries in `path`, excluding `.` and `..`.
    fn list(&mut self, path: &str) -> Result<Vec<String>, TransportError>;

    /// Stream the contents of `path` into `sink`, returning the byte count.
    fn read(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, TransportError>;

    /// Create or truncate `path` and fill it from `source`.
    fn write(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, TransportError>;

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError>;

    fn remove(&mut self, path: &str) -> Result<(), TransportError>;

    fn remove_directory(&mut self, path: &str) -> Result<(), TransportError>;
}

/// Command-execution sub-channel, good for one command.
pub trait ExecChannel {
    /// Ask for a pseudo-terminal before `execute`.
    fn request_pty(&mut self) -> Result<(), TransportError>;

    /// Run `command`, wait for it to exit and collect its output.
    fn execute(&mut self, command: &str) -> Result<ExecOutput, TransportError>;
}

/// Join a remote root and a slash-separated relative path.
///
/// An empty relative path denotes the root itself.
pub fn join_remote(root: &str, relative: &str) -> String {
    if relative.is_empty() {
        return root.to_string();
    }
    if root.is_empty() {
        return relative.to_string();
    }
    format!("{}/{}", root.trim_end_matches('/'), relative)
}

/// Extend a relative path with one more component.
pub(crate) fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/srv/data", ""), "/srv/data");
        assert_eq!(join_remote("/srv/data", "a.txt"), "/srv/data/a.txt");
        assert_eq!(join_remote("/srv/data/", "sub/b.txt"), "/srv/data/sub/b.txt");
        assert_eq!(join_remote("/", "etc"), "/etc");
        assert_eq!(join_remote("", "rel/path"), "rel/path");
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join_relative("", "a.txt"), "a.txt");
        assert_eq!(join_relative("sub", "b.txt"), "sub/b.txt");
    }
}
