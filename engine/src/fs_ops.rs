//! Local filesystem operations.
//!
//! This module provides the local half of each transfer:
//! - Listing a directory split into files and subdirectories
//! - Creating directories (and parents) for downloads
//! - Applying modification times
//! - Wrapping local streams so their errors are not mistaken for transport errors

use log::warn;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use crate::error::EngineError;

/// Direct children of a local directory, sorted by name.
#[derive(Debug, Default)]
pub struct LocalListing {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

/// List a local directory, separating regular files from subdirectories.
///
/// Symlinks to files are listed as files. Symlinks to directories are not
/// followed. Names that are not valid UTF-8 cannot be expressed as remote
/// paths and are rejected.
pub fn list_local_dir(path: &Path) -> Result<LocalListing, EngineError> {
    let enumeration_failed = |source| EngineError::EnumerationFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut listing = LocalListing::default();

    for entry in fs::read_dir(path).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        let entry_path = entry.path();

        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| EngineError::InvalidPath {
                path: entry_path.clone(),
                reason: "file name is not valid UTF-8".to_string(),
            })?;

        let file_type = entry.file_type().map_err(enumeration_failed)?;

        if file_type.is_dir() {
            listing.dirs.push(name);
        } else if file_type.is_symlink() {
            match fs::metadata(&entry_path) {
                Ok(target) if target.is_file() => listing.files.push(name),
                Ok(_) => warn!("Skipping symlinked directory {}", entry_path.display()),
                Err(e) => warn!("Skipping dangling symlink {}: {}", entry_path.display(), e),
            }
        } else if file_type.is_file() {
            listing.files.push(name);
        }
    }

    listing.files.sort();
    listing.dirs.sort();
    Ok(listing)
}

/// Make sure `path` is a directory, creating it (and its parents) if absent.
///
/// An existing directory is reused. An existing non-directory is an error.
pub fn ensure_dir(path: &Path) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    match path.parent() {
        // Empty parent means a bare relative file name
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Map a slash-separated relative path onto a local root.
pub fn local_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Set a file's modification time from seconds since the Unix epoch.
pub fn set_mtime(path: &Path, mtime_secs: u64) -> Result<(), EngineError> {
    let mtime = filetime::FileTime::from_system_time(UNIX_EPOCH + Duration::from_secs(mtime_secs));
    filetime::set_file_mtime(path, mtime).map_err(|source| EngineError::LocalWriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// A local reader or writer that remembers its first I/O error.
///
/// Transport implementations see local failures as plain `io::Error`s. After a
/// failed transfer the engine checks `take_error` to report the local path
/// instead of blaming the remote side.
pub struct TrackedIo<T> {
    inner: T,
    error: Option<io::Error>,
}

impl<T> TrackedIo<T> {
    pub fn new(inner: T) -> Self {
        TrackedIo { inner, error: None }
    }

    /// The first error seen, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    fn track<R>(&mut self, result: io::Result<R>) -> io::Result<R> {
        if let Err(ref e) = result {
            if e.kind() != io::ErrorKind::Interrupted && self.error.is_none() {
                self.error = Some(io::Error::new(e.kind(), e.to_string()));
            }
        }
        result
    }
}

impl<T: Read> Read for TrackedIo<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        self.track(result)
    }
}

impl<T: Write> Write for TrackedIo<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let result = self.inner.write(buf);
        self.track(result)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.flush();
        self.track(result)
    }
}
