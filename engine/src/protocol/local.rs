//! Local filesystem backend.
//!
//! Both endpoints are plain paths on this machine. Single files are copied
//! (into the destination directory when one exists there), directories are
//! mirrored and merged into the destination.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::Protocol;
use crate::command::SystemRunner;
use crate::error::{Result, TransferError};
use crate::fs_ops::{self, CopyOptions};
use crate::model::{ProtocolKind, TransferOptions};
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::validators;

/// Copies between two local paths.
#[derive(Debug, Clone, Default)]
pub struct LocalProtocol {
    settings: TransferOptions,
}

impl LocalProtocol {
    pub fn new(settings: TransferOptions) -> Self {
        LocalProtocol { settings }
    }

    pub fn settings(&self) -> &TransferOptions {
        &self.settings
    }
}

impl Protocol for LocalProtocol {
    fn validate(&self, source: &str, destination: &str) -> Result<()> {
        validators::validate_source(ProtocolKind::Local, source)?;
        validators::validate_destination(
            ProtocolKind::Local,
            destination,
            &self.settings,
            &SystemRunner,
        )?;
        validators::validate_disk_space(ProtocolKind::Local, source, destination)
    }

    fn copy(&self, source: &str, destination: &str, options: &TransferOptions) -> Result<()> {
        let options = options.layered(&self.settings);
        let src = Path::new(source);
        let dst = Path::new(destination);
        let copy_options = CopyOptions {
            preserve_metadata: options.preserve_metadata(),
            follow_symlinks: options.follow_symlinks(),
        };

        info!(source, destination, ?copy_options, "local copy started");

        let mut reporter = if options.show_progress() {
            let total = fs_ops::total_size(src).unwrap_or(0);
            Some(ProgressReporter::stdout(total, "Copying"))
        } else {
            None
        };

        let result = copy_entry(
            src,
            dst,
            copy_options,
            reporter.as_mut().map(|r| r as &mut dyn ProgressCallback),
        );
        if let Err(e) = result {
            error!(source, destination, error = %e, "local copy failed");
            return Err(e);
        }

        if let Some(reporter) = reporter.as_mut() {
            reporter.finish();
        }
        info!(source, destination, "local copy completed");
        Ok(())
    }
}

fn copy_entry(
    src: &Path,
    dst: &Path,
    options: CopyOptions,
    progress: Option<&mut dyn ProgressCallback>,
) -> Result<()> {
    let link_metadata = fs::symlink_metadata(src).map_err(|e| {
        TransferError::protocol(format!("local copy failed: cannot read {}: {}", src.display(), e))
    })?;

    if link_metadata.file_type().is_symlink() && !options.follow_symlinks {
        let target = file_target(src, dst);
        ensure_not_overlapping(src, &target, false)?;
        fs_ops::copy_symlink(src, &target)?;
        return Ok(());
    }

    if src.is_dir() {
        ensure_not_overlapping(src, dst, true)?;
        fs_ops::copy_tree(src, dst, options, progress)?;
        return Ok(());
    }

    let target = file_target(src, dst);
    ensure_not_overlapping(src, &target, false)?;
    fs_ops::ensure_parent_dir_exists(&target)?;
    let bytes = fs_ops::copy_file(src, &target, options.preserve_metadata)?;
    if let Some(progress) = progress {
        let name = src.file_name().map(|n| n.to_string_lossy().into_owned());
        progress.update(bytes, name.as_deref());
    }
    Ok(())
}

/// Refuse a target that resolves to `src` itself or, for trees, lies inside it.
///
/// Paths that cannot be resolved are left to the copy to report.
fn ensure_not_overlapping(src: &Path, target: &Path, tree: bool) -> Result<()> {
    let (Ok(src_real), Ok(target_real)) = (fs_ops::resolve_path(src), fs_ops::resolve_path(target))
    else {
        return Ok(());
    };

    if src_real == target_real {
        return Err(TransferError::protocol(format!(
            "Source and destination are the same: {}",
            src_real.display()
        )));
    }
    if tree && target_real.starts_with(&src_real) {
        return Err(TransferError::protocol(format!(
            "Destination {} is inside the source directory {}",
            target_real.display(),
            src_real.display()
        )));
    }
    Ok(())
}

/// Where a single file lands: inside `dst` when it is an existing directory.
fn file_target(src: &Path, dst: &Path) -> PathBuf {
    match src.file_name() {
        Some(name) if dst.is_dir() => dst.join(name),
        _ => dst.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn quiet() -> TransferOptions {
        TransferOptions {
            show_progress: Some(false),
            ..Default::default()
        }
    }

    fn path_str(path: &Path) -> String {
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_copy_single_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a.txt");
        let dst = temp_dir.path().join("b.txt");
        fs::write(&src, "line1\nline2\n").expect("Failed to write source");

        let backend = LocalProtocol::new(quiet());
        backend
            .validate(&path_str(&src), &path_str(&dst))
            .expect("validation should pass");
        backend
            .copy(&path_str(&src), &path_str(&dst), &TransferOptions::default())
            .expect("copy should succeed");

        assert_eq!(fs::read_to_string(&dst).unwrap(), "line1\nline2\n");
    }

    #[test]
    fn test_copy_file_into_existing_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("report.csv");
        let dst = temp_dir.path().join("inbox");
        fs::write(&src, "a,b\n").expect("Failed to write source");
        fs::create_dir(&dst).expect("Failed to create dest dir");

        LocalProtocol::new(quiet())
            .copy(&path_str(&src), &path_str(&dst), &TransferOptions::default())
            .expect("copy should succeed");

        assert_eq!(fs::read_to_string(dst.join("report.csv")).unwrap(), "a,b\n");
    }

    #[test]
    fn test_copy_directory_and_merge() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("sub")).expect("Failed to create src tree");
        fs::write(src.join("one.txt"), "1").expect("Failed to write one");
        fs::write(src.join("sub").join("two.txt"), "2").expect("Failed to write two");

        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst");
        fs::write(dst.join("keep.txt"), "keep").expect("Failed to write keep");

        LocalProtocol::new(quiet())
            .copy(&path_str(&src), &path_str(&dst), &TransferOptions::default())
            .expect("copy should succeed");

        assert_eq!(fs::read_to_string(dst.join("one.txt")).unwrap(), "1");
        assert_eq!(fs::read_to_string(dst.join("sub").join("two.txt")).unwrap(), "2");
        assert_eq!(fs::read_to_string(dst.join("keep.txt")).unwrap(), "keep");
    }

    #[test]
    fn test_call_site_options_override_settings() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("old.txt");
        let dst = temp_dir.path().join("new.txt");
        fs::write(&src, "x").expect("Failed to write source");
        let old = filetime::FileTime::from_unix_time(1_000_000_000, 0);
        filetime::set_file_mtime(&src, old).expect("Failed to set mtime");

        let stored = TransferOptions {
            preserve_metadata: Some(true),
            show_progress: Some(false),
            ..Default::default()
        };
        let call_site = TransferOptions {
            preserve_metadata: Some(false),
            ..Default::default()
        };
        LocalProtocol::new(stored)
            .copy(&path_str(&src), &path_str(&dst), &call_site)
            .expect("copy should succeed");

        let meta = fs::metadata(&dst).unwrap();
        assert_ne!(filetime::FileTime::from_last_modification_time(&meta), old);
    }

    #[test]
    fn test_validate_rejects_missing_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = LocalProtocol::default()
            .validate(
                &path_str(&temp_dir.path().join("nope.txt")),
                &path_str(&temp_dir.path().join("out.txt")),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validate_rejects_directory_onto_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src");
        let dst = temp_dir.path().join("file.txt");
        fs::write(&dst, "occupied").expect("Failed to write dst");

        let err = LocalProtocol::default()
            .validate(&path_str(&src), &path_str(&dst))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fs::read_to_string(&dst).unwrap(), "occupied");
    }

    #[test]
    fn test_copy_missing_source_is_protocol_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = LocalProtocol::new(quiet())
            .copy(
                &path_str(&temp_dir.path().join("ghost")),
                &path_str(&temp_dir.path().join("out")),
                &TransferOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_copy_directory_onto_itself_is_refused() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("d");
        fs::create_dir(&dir).expect("Failed to create dir");
        fs::write(dir.join("precious.txt"), "important bytes").expect("Failed to write file");

        let backend = LocalProtocol::new(quiet());
        backend
            .validate(&path_str(&dir), &path_str(&dir))
            .expect("validation should pass");
        let err = backend
            .copy(&path_str(&dir), &path_str(&dir), &TransferOptions::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("same"));
        assert_eq!(
            fs::read_to_string(dir.join("precious.txt")).unwrap(),
            "important bytes"
        );
    }

    #[test]
    fn test_copy_file_into_its_own_directory_is_refused() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "important bytes").expect("Failed to write file");

        let err = LocalProtocol::new(quiet())
            .copy(
                &path_str(&file),
                &path_str(temp_dir.path()),
                &TransferOptions::default(),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(fs::read_to_string(&file).unwrap(), "important bytes");
    }

    #[test]
    fn test_copy_directory_into_own_subdirectory_is_refused() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a");
        fs::create_dir(&src).expect("Failed to create src");
        fs::write(src.join("data.txt"), "data").expect("Failed to write file");
        let backup = src.join("backup");

        let err = LocalProtocol::new(quiet())
            .copy(&path_str(&src), &path_str(&backup), &TransferOptions::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("inside the source directory"));
        assert!(!backup.exists());
    }

    #[test]
    fn test_copy_directory_to_sibling_with_shared_prefix() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("data");
        fs::create_dir(&src).expect("Failed to create src");
        fs::write(src.join("x.txt"), "x").expect("Failed to write file");
        let dst = temp_dir.path().join("data-copy");

        LocalProtocol::new(quiet())
            .copy(&path_str(&src), &path_str(&dst), &TransferOptions::default())
            .expect("sibling copy should succeed");

        assert_eq!(fs::read_to_string(dst.join("x.txt")).unwrap(), "x");
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_source_is_recreated_as_link() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let target = temp_dir.path().join("target.txt");
        fs::write(&target, "data").expect("Failed to write target");
        let link = temp_dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).expect("Failed to create symlink");
        let dst = temp_dir.path().join("copied-link.txt");

        LocalProtocol::new(quiet())
            .copy(&path_str(&link), &path_str(&dst), &TransferOptions::default())
            .expect("copy should succeed");

        assert!(fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&dst).unwrap(), target);
    }
}
