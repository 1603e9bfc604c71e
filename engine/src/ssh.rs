//! Transport binding over libssh2.
//!
//! `SshSession` wraps an authenticated `ssh2::Session`. Each transfer call
//! opens its own SFTP channel, and each command opens its own exec channel.

use log::debug;
use std::io::{self, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::{ExecChannel, ExecOutput, RemoteStat, Session, TransferChannel};

const DIR_MODE: i32 = 0o755;
const FILE_MODE: i32 = 0o644;
const READ_CHUNK: usize = 32 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An authenticated SSH connection.
pub struct SshSession {
    session: ssh2::Session,
}

impl SshSession {
    /// Wrap a session that has completed handshake and authentication.
    pub fn new(session: ssh2::Session) -> Self {
        SshSession { session }
    }
}

impl Session for SshSession {
    type Transfer = SftpChannel;
    type Exec = SshExecChannel;

    fn open_transfer_channel(&self) -> Result<SftpChannel, TransportError> {
        let sftp = self.session.sftp()?;
        Ok(SftpChannel { sftp })
    }

    fn open_exec_channel(&self) -> Result<SshExecChannel, TransportError> {
        let channel = self.session.channel_session()?;
        Ok(SshExecChannel {
            session: self.session.clone(),
            channel,
        })
    }
}

/// SFTP sub-channel.
pub struct SftpChannel {
    sftp: ssh2::Sftp,
}

impl TransferChannel for SftpChannel {
    fn stat(&mut self, path: &str) -> Result<RemoteStat, TransportError> {
        let stat = self.sftp.stat(Path::new(path))?;
        Ok(RemoteStat {
            perm: stat.perm,
            size: stat.size,
            mtime: stat.mtime,
        })
    }

    fn lstat(&mut self, path: &str) -> Result<RemoteStat, TransportError> {
        let stat = self.sftp.lstat(Path::new(path))?;
        Ok(RemoteStat {
            perm: stat.perm,
            size: stat.size,
            mtime: stat.mtime,
        })
    }

    fn list(&mut self, path: &str) -> Result<Vec<String>, TransportError> {
        let entries = self.sftp.readdir(Path::new(path))?;
        let names = entries
            .into_iter()
            .filter_map(|(entry_path, _)| {
                entry_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .filter(|name| name != "." && name != "..")
            .collect();
        Ok(names)
    }

    fn read(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        let mut file = self.sftp.open(Path::new(path))?;
        let bytes = io::copy(&mut file, sink)?;
        Ok(bytes)
    }

    fn write(&mut self, path: &str, source: &mut dyn Read) -> Result<u64, TransportError> {
        let flags = ssh2::OpenFlags::WRITE | ssh2::OpenFlags::CREATE | ssh2::OpenFlags::TRUNCATE;
        let mut file = self
            .sftp
            .open_mode(Path::new(path), flags, FILE_MODE, ssh2::OpenType::File)?;
        let bytes = io::copy(source, &mut file)?;
        file.flush()?;
        Ok(bytes)
    }

    fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp.mkdir(Path::new(path), DIR_MODE)?;
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp.unlink(Path::new(path))?;
        Ok(())
    }

    fn remove_directory(&mut self, path: &str) -> Result<(), TransportError> {
        self.sftp.rmdir(Path::new(path))?;
        Ok(())
    }
}

/// Exec sub-channel; one command per channel.
pub struct SshExecChannel {
    session: ssh2::Session,
    channel: ssh2::Channel,
}

impl ExecChannel for SshExecChannel {
    fn request_pty(&mut self) -> Result<(), TransportError> {
        self.channel.request_pty("xterm", None, None)?;
        Ok(())
    }

    fn execute(&mut self, command: &str) -> Result<ExecOutput, TransportError> {
        self.channel.exec(command)?;

        // Blocking mode is shared by every channel on the session
        self.session.set_blocking(false);
        let streams = read_streams(&mut self.channel);
        self.session.set_blocking(true);
        let (stdout, stderr) = streams?;

        self.channel.wait_close()?;
        let exit_code = self.channel.exit_status()?;
        let signal = self.channel.exit_signal()?.exit_signal;
        debug!(
            "exec finished: status {} signal {:?} ({} bytes stdout, {} bytes stderr)",
            exit_code,
            signal,
            stdout.len(),
            stderr.len()
        );

        Ok(ExecOutput {
            exit_code,
            signal,
            stdout,
            stderr,
        })
    }
}

/// Drain stdout and stderr of a non-blocking channel until EOF.
///
/// The streams are read alternately: a command that fills the window with
/// output on one stream must not stall while the other one is being read.
fn read_streams(channel: &mut ssh2::Channel) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let out = read_available(&mut *channel, &mut buf, &mut stdout)?;
        let err = read_available(&mut channel.stderr(), &mut buf, &mut stderr)?;
        if out == 0 && err == 0 {
            if channel.eof() {
                return Ok((stdout, stderr));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// One read that treats "no data yet" as zero bytes.
fn read_available<R: Read>(reader: &mut R, buf: &mut [u8], out: &mut Vec<u8>) -> io::Result<usize> {
    match reader.read(buf) {
        Ok(n) => {
            out.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out scripted results, one per read.
    struct Scripted(Vec<io::Result<&'static [u8]>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.remove(0) {
                Ok(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                Err(e) => Err(e),
            }
        }
    }

    #[test]
    fn test_read_available_treats_would_block_as_empty() {
        let mut reader = Scripted(vec![
            Ok(&b"abc"[..]),
            Err(io::Error::from(io::ErrorKind::WouldBlock)),
            Err(io::Error::new(io::ErrorKind::Other, "channel closed")),
        ]);
        let mut buf = [0u8; 16];
        let mut out = Vec::new();

        assert_eq!(read_available(&mut reader, &mut buf, &mut out).unwrap(), 3);
        assert_eq!(read_available(&mut reader, &mut buf, &mut out).unwrap(), 0);
        assert!(read_available(&mut reader, &mut buf, &mut out).is_err());
        assert_eq!(out, b"abc");
    }
}
