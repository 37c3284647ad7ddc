//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Measuring files and directory trees
//! - Copying files with metadata preservation
//! - Mirroring directory trees into an existing or new destination
//! - Creating directories recursively

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::FsError;
use crate::progress::ProgressCallback;

/// How leaf entries are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOptions {
    /// Copy access and modification times
    pub preserve_metadata: bool,
    /// Copy what symlinks point to instead of the links themselves
    pub follow_symlinks: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            preserve_metadata: true,
            follow_symlinks: false,
        }
    }
}

pub(crate) struct NoProgress;

impl ProgressCallback for NoProgress {
    fn update(&mut self, _bytes: u64, _file: Option<&str>) {}
    fn finish(&mut self) {}
}

/// Total size in bytes of a file, or of every regular file under a directory.
///
/// Symlinks are not followed and not counted.
pub fn total_size(path: &Path) -> io::Result<u64> {
    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }

    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Absolute form of `path` with symlinks resolved, even when its tail does
/// not exist yet.
///
/// The longest existing ancestor is canonicalized and the missing components
/// are appended to it unchanged.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(base) => {
                return Ok(missing.iter().rev().fold(base, |acc, name| acc.join(name)));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let name = existing.file_name().ok_or(e)?;
                missing.push(name.to_os_string());
                existing = match existing.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent,
                    _ => Path::new("."),
                };
            }
            Err(e) => return Err(e),
        }
    }
}

/// Whether `dst` already exists as the very file described by `src_metadata`.
#[cfg(unix)]
fn is_same_file(_src: &Path, src_metadata: &fs::Metadata, dst: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match fs::metadata(dst) {
        Ok(dst_metadata) => {
            src_metadata.dev() == dst_metadata.dev() && src_metadata.ino() == dst_metadata.ino()
        }
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_same_file(src: &Path, _src_metadata: &fs::Metadata, dst: &Path) -> bool {
    match (src.canonicalize(), dst.canonicalize()) {
        (Ok(src), Ok(dst)) => src == dst,
        _ => false,
    }
}

/// Copy a file from source to destination.
///
/// Contents and permissions are always copied; timestamps only when
/// `preserve_metadata` is set. An existing destination file is truncated,
/// unless it is the source itself (including through a hard link or
/// symlink), which is refused with [`FsError::SameFile`].
///
/// # Returns
/// Number of bytes copied
pub fn copy_file(src: &Path, dst: &Path, preserve_metadata: bool) -> Result<u64, FsError> {
    let mut src_file = fs::File::open(src).map_err(|e| FsError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    let src_metadata = src_file.metadata().map_err(|e| FsError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    if is_same_file(src, &src_metadata, dst) {
        return Err(FsError::SameFile {
            path: src.to_path_buf(),
        });
    }

    let mut dst_file = fs::File::create(dst).map_err(|e| FsError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            FsError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            }
        } else {
            FsError::ReadError {
                path: src.to_path_buf(),
                source: e,
            }
        }
    })?;
    drop(dst_file);

    fs::set_permissions(dst, src_metadata.permissions()).map_err(|e| {
        FsError::MetadataFailed {
            path: dst.to_path_buf(),
            source: e,
        }
    })?;

    if preserve_metadata {
        preserve_times(&src_metadata, dst).map_err(|e| FsError::MetadataFailed {
            path: dst.to_path_buf(),
            source: e,
        })?;
    }

    Ok(bytes_copied)
}

/// Recreate the symlink `src` at `dst`, replacing a non-directory entry there.
#[cfg(unix)]
pub fn copy_symlink(src: &Path, dst: &Path) -> Result<(), FsError> {
    let target = fs::read_link(src).map_err(|e| FsError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;

    if let Ok(existing) = fs::symlink_metadata(dst) {
        if !existing.is_dir() {
            fs::remove_file(dst).map_err(|e| FsError::SymlinkFailed {
                path: dst.to_path_buf(),
                source: e,
            })?;
        }
    }

    std::os::unix::fs::symlink(&target, dst).map_err(|e| FsError::SymlinkFailed {
        path: dst.to_path_buf(),
        source: e,
    })
}

/// Without unix symlinks, links are copied as the files they point to.
#[cfg(not(unix))]
pub fn copy_symlink(src: &Path, dst: &Path) -> Result<(), FsError> {
    copy_file(src, dst, true).map(|_| ())
}

/// Mirror the directory `src` into `dst`.
///
/// `dst` is created (with parents) if absent and merged into if it exists;
/// pre-existing entries that the source does not contain are left alone.
/// Each directory is listed before its destination is created, so `dst` may
/// lie inside `src` without being copied into itself.
/// Entries are copied one at a time and each regular file is reported to
/// `progress` under its file name.
///
/// # Returns
/// Number of file bytes copied
pub fn copy_tree(
    src: &Path,
    dst: &Path,
    options: CopyOptions,
    progress: Option<&mut dyn ProgressCallback>,
) -> Result<u64, FsError> {
    let mut silent = NoProgress;
    let progress: &mut dyn ProgressCallback = match progress {
        Some(progress) => progress,
        None => &mut silent,
    };
    mirror_dir(src, dst, options, progress)
}

fn mirror_dir(
    src: &Path,
    dst: &Path,
    options: CopyOptions,
    progress: &mut dyn ProgressCallback,
) -> Result<u64, FsError> {
    let entries = fs::read_dir(src)
        .and_then(|dir| dir.collect::<io::Result<Vec<_>>>())
        .map_err(|e| FsError::EnumerationFailed {
            path: src.to_path_buf(),
            source: e,
        })?;

    fs::create_dir_all(dst).map_err(|e| FsError::DirectoryCreationFailed {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let mut copied = 0;
    for entry in entries {
        let entry_path = entry.path();
        let target = dst.join(entry.file_name());

        let link_metadata = fs::symlink_metadata(&entry_path).map_err(|e| FsError::ReadError {
            path: entry_path.clone(),
            source: e,
        })?;

        if link_metadata.file_type().is_symlink() && !options.follow_symlinks {
            copy_symlink(&entry_path, &target)?;
            continue;
        }

        let metadata = fs::metadata(&entry_path).map_err(|e| FsError::ReadError {
            path: entry_path.clone(),
            source: e,
        })?;

        if metadata.is_dir() {
            copied += mirror_dir(&entry_path, &target, options, progress)?;
        } else {
            let bytes = copy_file(&entry_path, &target, options.preserve_metadata)?;
            copied += bytes;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            progress.update(bytes, Some(name.as_ref()));
        }
    }

    if options.preserve_metadata {
        let dir_times = fs::metadata(src).and_then(|m| preserve_times(&m, dst));
        if let Err(e) = dir_times {
            debug!(path = %dst.display(), error = %e, "could not preserve directory times");
        }
    }

    Ok(copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), FsError> {
    if let Some(parent) = path.parent() {
        // Skip if parent is empty path (relative root)
        if parent.as_os_str().is_empty() {
            return Ok(());
        }

        match fs::metadata(parent) {
            Ok(metadata) => {
                if metadata.is_dir() {
                    Ok(())
                } else {
                    Err(FsError::DirectoryCreationFailed {
                        path: parent.to_path_buf(),
                        source: io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "Parent path exists but is not a directory",
                        ),
                    })
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(parent).map_err(|e| FsError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })
            }
            Err(e) => Err(FsError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            }),
        }
    } else {
        Ok(())
    }
}

fn preserve_times(src_metadata: &fs::Metadata, dst: &Path) -> io::Result<()> {
    let atime = filetime::FileTime::from_last_access_time(src_metadata);
    let mtime = filetime::FileTime::from_last_modification_time(src_metadata);
    filetime::set_file_times(dst, atime, mtime)
}
