//! Remote entry inspection.

use crate::error::{EngineError, RemoteOp};
use crate::model::EntryKind;
use crate::transport::{RemoteStat, Session, TransferChannel};

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFLNK: u32 = 0o120000;

/// A directory entry seen without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entry {
    Absent,
    File(RemoteStat),
    Directory,
    Symlink,
}

/// Resolve a remote path to a file, a directory, or nothing.
///
/// "No such file" is `Absent`. A stat that succeeds without type bits is
/// `MetadataUnavailable`: the caller cannot tell whether to recurse or
/// transfer, so it must not guess.
pub fn inspect<C>(channel: &mut C, path: &str) -> Result<EntryKind, EngineError>
where
    C: TransferChannel + ?Sized,
{
    classify(channel, path).map(|(kind, _)| kind)
}

/// `inspect`, also returning the stat attributes when the path exists.
pub(crate) fn classify<C>(
    channel: &mut C,
    path: &str,
) -> Result<(EntryKind, Option<RemoteStat>), EngineError>
where
    C: TransferChannel + ?Sized,
{
    let stat = match channel.stat(path) {
        Ok(stat) => stat,
        Err(e) if e.is_not_found() => return Ok((EntryKind::Absent, None)),
        Err(e) => {
            return Err(EngineError::RemoteReadError {
                op: RemoteOp::Stat,
                path: path.to_string(),
                source: e,
            })
        }
    };

    let kind = if file_type(&stat, path)? == S_IFDIR {
        EntryKind::Directory
    } else {
        EntryKind::File
    };
    Ok((kind, Some(stat)))
}

/// Classify a child of a tree being walked. Symlinks are reported as such
/// and never resolved, so a walk cannot leave its root or loop.
pub(crate) fn lstat_entry<C>(channel: &mut C, path: &str) -> Result<Entry, EngineError>
where
    C: TransferChannel + ?Sized,
{
    let stat = match channel.lstat(path) {
        Ok(stat) => stat,
        Err(e) if e.is_not_found() => return Ok(Entry::Absent),
        Err(e) => {
            return Err(EngineError::RemoteReadError {
                op: RemoteOp::Stat,
                path: path.to_string(),
                source: e,
            })
        }
    };

    Ok(match file_type(&stat, path)? {
        S_IFDIR => Entry::Directory,
        S_IFLNK => Entry::Symlink,
        _ => Entry::File(stat),
    })
}

fn file_type(stat: &RemoteStat, path: &str) -> Result<u32, EngineError> {
    stat.perm
        .map(|mode| mode & S_IFMT)
        .ok_or_else(|| EngineError::MetadataUnavailable {
            path: path.to_string(),
        })
}

/// Check whether a remote file or directory exists.
pub fn path_exists<S: Session>(session: &S, path: &str) -> Result<bool, EngineError> {
    let mut channel = session
        .open_transfer_channel()
        .map_err(|source| EngineError::TransferChannelError { source })?;

    match channel.stat(path) {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(EngineError::RemoteReadError {
            op: RemoteOp::Stat,
            path: path.to_string(),
            source: e,
        }),
    }
}
