//! Recursive transfer engine.
//!
//! This module provides the tree operations:
//! - Uploading a local directory tree (pre-order: directory before contents)
//! - Downloading a remote file or tree (pre-order)
//! - Deleting a remote tree (post-order: contents before directory)
//! - Single-file upload, download and delete
//!
//! Every operation opens one transfer channel and holds it for the whole
//! call. Traversal uses an explicit work stack, so deep trees do not grow the
//! call stack. The first failing remote or local call aborts the operation;
//! nothing already transferred is rolled back.
//!
//! Below the requested path, remote symlinks are never descended into. A
//! download copies links to files and skips the rest; a delete removes the
//! link itself.

use log::{debug, info, warn};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::checksums;
use crate::error::{EngineError, RemoteOp};
use crate::fs_ops::{self, TrackedIo};
use crate::inspect::{classify, lstat_entry, Entry};
use crate::model::{
    DownloadOptions, EntryKind, ExistingDirPolicy, ProgressEvent, TransferDirection,
    TransferSummary, UploadOptions,
};
use crate::progress::{report, ProgressCallback};
use crate::transport::{join_relative, join_remote, RemoteStat, Session, TransferChannel};

fn open_channel<S: Session>(session: &S) -> Result<S::Transfer, EngineError> {
    session
        .open_transfer_channel()
        .map_err(|source| EngineError::TransferChannelError { source })
}

/// Upload a local directory tree to `remote_root`.
///
/// Each directory (the root included) is created remotely before its files
/// are uploaded, and its files are uploaded before its subdirectories are
/// visited. `progress` receives each file's path relative to `local_root`
/// once the file is fully written.
///
/// # Errors
/// An existing remote directory is a `RemoteWriteError` unless
/// `options.existing_dirs` is `Merge`. Any failed call aborts the upload.
pub fn upload_directory<S: Session>(
    session: &S,
    local_root: &Path,
    remote_root: &str,
    options: &UploadOptions,
    mut progress: Option<&mut dyn ProgressCallback>,
) -> Result<TransferSummary, EngineError> {
    if !local_root.is_dir() {
        return Err(EngineError::InvalidPath {
            path: local_root.to_path_buf(),
            reason: "upload source must be an existing directory".to_string(),
        });
    }

    info!("Uploading {} to {}", local_root.display(), remote_root);
    let mut channel = open_channel(session)?;
    let mut summary = TransferSummary::default();
    let mut pending = vec![String::new()];

    while let Some(rel_dir) = pending.pop() {
        let remote_dir = join_remote(remote_root, &rel_dir);
        if make_remote_dir(&mut channel, &remote_dir, options.existing_dirs)? {
            summary.directories += 1;
        }

        let listing = fs_ops::list_local_dir(&fs_ops::local_path(local_root, &rel_dir))?;

        for name in &listing.files {
            let rel_path = join_relative(&rel_dir, name);
            let local = fs_ops::local_path(local_root, &rel_path);
            let remote = join_remote(remote_root, &rel_path);

            let bytes = put_file(&mut channel, &local, &remote)?;
            if let Some(algorithm) = options.verify {
                checksums::verify_remote_copy(&mut channel, &local, &remote, algorithm)?;
            }

            summary.files += 1;
            summary.bytes += bytes;
            report(
                &mut progress,
                ProgressEvent {
                    direction: TransferDirection::Upload,
                    relative_path: rel_path.clone(),
                    bytes,
                },
            );
        }

        // Reversed so the first subdirectory is visited next
        for name in listing.dirs.iter().rev() {
            pending.push(join_relative(&rel_dir, name));
        }
    }

    info!(
        "Upload finished: {} files, {} directories, {} bytes",
        summary.files, summary.directories, summary.bytes
    );
    Ok(summary)
}

/// Download `relative_path` under `remote_root` into the same relative
/// location under `local_root`.
///
/// A remote directory is mirrored recursively: the local directory is created
/// (or reused) before its children are fetched. A remote file is copied and
/// reported to `progress`. The requested path itself may be a symlink; links
/// found inside the tree are copied only when they point to a file.
///
/// # Errors
/// `RemotePathNotFound` if the requested path does not exist; nothing is
/// written locally in that case.
pub fn download_file_or_tree<S: Session>(
    session: &S,
    remote_root: &str,
    local_root: &Path,
    relative_path: &str,
    options: &DownloadOptions,
    mut progress: Option<&mut dyn ProgressCallback>,
) -> Result<TransferSummary, EngineError> {
    info!(
        "Downloading {} from {} to {}",
        display_relative(relative_path),
        remote_root,
        local_root.display()
    );
    let mut channel = open_channel(session)?;
    let mut summary = TransferSummary::default();
    let mut pending = vec![(relative_path.trim_matches('/').to_string(), true)];

    while let Some((rel_path, is_root)) = pending.pop() {
        let remote = join_remote(remote_root, &rel_path);
        let local = fs_ops::local_path(local_root, &rel_path);

        let (kind, stat) = if is_root {
            classify(&mut channel, &remote)?
        } else {
            match resolve_child(&mut channel, &remote)? {
                Some(resolved) => resolved,
                None => continue,
            }
        };
        match kind {
            EntryKind::Absent => return Err(EngineError::RemotePathNotFound { path: remote }),
            EntryKind::Directory => {
                fs_ops::ensure_dir(&local)?;
                summary.directories += 1;

                let mut names = channel
                    .list(&remote)
                    .map_err(|source| EngineError::RemoteReadError {
                        op: RemoteOp::List,
                        path: remote.clone(),
                        source,
                    })?;
                names.sort();
                for name in names.iter().rev() {
                    pending.push((join_relative(&rel_path, name), false));
                }
            }
            EntryKind::File => {
                fs_ops::ensure_parent_dir_exists(&local)?;
                let bytes = get_file(&mut channel, &remote, &local)?;

                if let Some(algorithm) = options.verify {
                    checksums::verify_remote_copy(&mut channel, &local, &remote, algorithm)?;
                }
                if options.preserve_mtime {
                    if let Some(mtime) = stat.and_then(|s| s.mtime) {
                        fs_ops::set_mtime(&local, mtime)?;
                    }
                }

                summary.files += 1;
                summary.bytes += bytes;
                report(
                    &mut progress,
                    ProgressEvent {
                        direction: TransferDirection::Download,
                        relative_path: progress_name(&rel_path, &remote).to_string(),
                        bytes,
                    },
                );
            }
        }
    }

    info!(
        "Download finished: {} files, {} directories, {} bytes",
        summary.files, summary.directories, summary.bytes
    );
    Ok(summary)
}

enum Visit {
    Enter(String),
    Leave(String),
}

/// Delete `relative_path` under `remote_root`, recursively.
///
/// Directory contents are removed before the directory itself. A path that
/// does not exist is already deleted, so this succeeds without doing
/// anything. Symlinks, including one at `relative_path`, are unlinked and
/// never followed. `progress` receives each removed file or link.
pub fn delete_tree<S: Session>(
    session: &S,
    remote_root: &str,
    relative_path: &str,
    mut progress: Option<&mut dyn ProgressCallback>,
) -> Result<TransferSummary, EngineError> {
    info!(
        "Deleting {} under {}",
        display_relative(relative_path),
        remote_root
    );
    let mut channel = open_channel(session)?;
    let mut summary = TransferSummary::default();
    let mut pending = vec![Visit::Enter(relative_path.trim_matches('/').to_string())];

    while let Some(visit) = pending.pop() {
        match visit {
            Visit::Enter(rel_path) => {
                let remote = join_remote(remote_root, &rel_path);
                match lstat_entry(&mut channel, &remote)? {
                    Entry::Absent => {
                        debug!("Nothing to delete at {}", remote);
                    }
                    Entry::File(_) | Entry::Symlink => {
                        channel
                            .remove(&remote)
                            .map_err(|source| EngineError::RemoteWriteError {
                                op: RemoteOp::Remove,
                                path: remote.clone(),
                                source,
                            })?;
                        debug!("Removed {}", remote);

                        summary.files += 1;
                        report(
                            &mut progress,
                            ProgressEvent {
                                direction: TransferDirection::Delete,
                                relative_path: progress_name(&rel_path, &remote).to_string(),
                                bytes: 0,
                            },
                        );
                    }
                    Entry::Directory => {
                        let names = channel
                            .list(&remote)
                            .map_err(|source| EngineError::RemoteReadError {
                                op: RemoteOp::List,
                                path: remote.clone(),
                                source,
                            })?;

                        // Leave sits below the children, so it pops after all of them
                        pending.push(Visit::Leave(rel_path.clone()));
                        for name in &names {
                            pending.push(Visit::Enter(join_relative(&rel_path, name)));
                        }
                    }
                }
            }
            Visit::Leave(rel_path) => {
                let remote = join_remote(remote_root, &rel_path);
                channel
                    .remove_directory(&remote)
                    .map_err(|source| EngineError::RemoteWriteError {
                        op: RemoteOp::RemoveDirectory,
                        path: remote.clone(),
                        source,
                    })?;
                debug!("Removed directory {}", remote);
                summary.directories += 1;
            }
        }
    }

    info!(
        "Delete finished: {} files, {} directories",
        summary.files, summary.directories
    );
    Ok(summary)
}

/// Upload a single local file to `remote`, returning the bytes written.
pub fn upload_file<S: Session>(session: &S, local: &Path, remote: &str) -> Result<u64, EngineError> {
    let mut channel = open_channel(session)?;
    put_file(&mut channel, local, remote)
}

/// Download a single remote file to `local`, returning the bytes read.
///
/// # Errors
/// `RemotePathNotFound` if `remote` does not exist, `InvalidPath` if it is a
/// directory. In both cases nothing is written locally.
pub fn download_file<S: Session>(session: &S, remote: &str, local: &Path) -> Result<u64, EngineError> {
    let mut channel = open_channel(session)?;
    match classify(&mut channel, remote)?.0 {
        EntryKind::Absent => Err(EngineError::RemotePathNotFound {
            path: remote.to_string(),
        }),
        EntryKind::Directory => Err(EngineError::InvalidPath {
            path: PathBuf::from(remote),
            reason: "remote path is a directory".to_string(),
        }),
        EntryKind::File => get_file(&mut channel, remote, local),
    }
}

/// Remove a single remote file.
///
/// Unlike `delete_tree`, a missing file is reported as a `RemoteWriteError`.
pub fn delete_file<S: Session>(session: &S, remote: &str) -> Result<(), EngineError> {
    let mut channel = open_channel(session)?;
    channel
        .remove(remote)
        .map_err(|source| EngineError::RemoteWriteError {
            op: RemoteOp::Remove,
            path: remote.to_string(),
            source,
        })
}

/// Classify an entry met below the root of a download. `None` means skip it.
fn resolve_child<C>(
    channel: &mut C,
    remote: &str,
) -> Result<Option<(EntryKind, Option<RemoteStat>)>, EngineError>
where
    C: TransferChannel + ?Sized,
{
    let resolved = match lstat_entry(channel, remote)? {
        Entry::Absent => (EntryKind::Absent, None),
        Entry::File(stat) => (EntryKind::File, Some(stat)),
        Entry::Directory => (EntryKind::Directory, None),
        Entry::Symlink => match classify(channel, remote)? {
            (EntryKind::File, stat) => (EntryKind::File, stat),
            (EntryKind::Directory, _) => {
                warn!("Skipping symlinked directory {}", remote);
                return Ok(None);
            }
            (EntryKind::Absent, _) => {
                warn!("Skipping dangling symlink {}", remote);
                return Ok(None);
            }
        },
    };
    Ok(Some(resolved))
}

/// Create a remote directory. Returns false if an existing one was reused.
fn make_remote_dir<C>(
    channel: &mut C,
    path: &str,
    policy: ExistingDirPolicy,
) -> Result<bool, EngineError>
where
    C: TransferChannel + ?Sized,
{
    match channel.make_directory(path) {
        Ok(()) => {
            debug!("Created directory {}", path);
            Ok(true)
        }
        Err(source) => {
            if policy == ExistingDirPolicy::Merge
                && classify(channel, path)?.0 == EntryKind::Directory
            {
                debug!("Reusing existing directory {}", path);
                return Ok(false);
            }
            Err(EngineError::RemoteWriteError {
                op: RemoteOp::MakeDirectory,
                path: path.to_string(),
                source,
            })
        }
    }
}

/// Stream a local file to a remote path.
fn put_file<C>(channel: &mut C, local: &Path, remote: &str) -> Result<u64, EngineError>
where
    C: TransferChannel + ?Sized,
{
    let file = File::open(local).map_err(|source| EngineError::LocalReadError {
        path: local.to_path_buf(),
        source,
    })?;
    let mut source = TrackedIo::new(file);

    match channel.write(remote, &mut source) {
        Ok(bytes) => {
            debug!("Wrote {} ({} bytes)", remote, bytes);
            Ok(bytes)
        }
        Err(e) => match source.take_error() {
            Some(local_error) => Err(EngineError::LocalReadError {
                path: local.to_path_buf(),
                source: local_error,
            }),
            None => Err(EngineError::RemoteWriteError {
                op: RemoteOp::Write,
                path: remote.to_string(),
                source: e,
            }),
        },
    }
}

/// Stream a remote file into a local path, creating or truncating it.
fn get_file<C>(channel: &mut C, remote: &str, local: &Path) -> Result<u64, EngineError>
where
    C: TransferChannel + ?Sized,
{
    let file = File::create(local).map_err(|source| EngineError::LocalWriteError {
        path: local.to_path_buf(),
        source,
    })?;
    let mut sink = TrackedIo::new(file);

    match channel.read(remote, &mut sink) {
        Ok(bytes) => {
            debug!("Read {} ({} bytes)", remote, bytes);
            Ok(bytes)
        }
        Err(e) => match sink.take_error() {
            Some(local_error) => Err(EngineError::LocalWriteError {
                path: local.to_path_buf(),
                source: local_error,
            }),
            None => Err(EngineError::RemoteReadError {
                op: RemoteOp::Read,
                path: remote.to_string(),
                source: e,
            }),
        },
    }
}

/// Name reported for a file. The root of a single-file transfer has an empty
/// relative path, so its base name is used instead.
fn progress_name<'a>(rel_path: &'a str, remote: &'a str) -> &'a str {
    if rel_path.is_empty() {
        remote.trim_end_matches('/').rsplit('/').next().unwrap_or(remote)
    } else {
        rel_path
    }
}

fn display_relative(relative_path: &str) -> &str {
    if relative_path.trim_matches('/').is_empty() {
        "."
    } else {
        relative_path
    }
}
