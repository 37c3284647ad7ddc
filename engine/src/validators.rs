//! Pre-flight validation.
//!
//! Stateless checks composed by each backend's `validate` before any byte is
//! transferred. Every failure is a `TransferError::Validation`.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::command::CommandRunner;
use crate::endpoint::{self, RemoteEndpoint};
use crate::error::{Result, TransferError};
use crate::fs_ops;
use crate::model::{ProtocolKind, TransferOptions, DEFAULT_SSH_PORT};
use crate::progress::format_size;

/// Connect timeout handed to `ssh` for the reachability probe.
pub const SSH_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Overall deadline of the reachability probe.
pub const SSH_PROBE_DEADLINE: Duration = Duration::from_secs(10);

/// Check that the source can be read.
///
/// Local paths must exist. Remote-looking sources are accepted unchecked; the
/// transport reports them later if they are truly absent.
pub fn validate_source(kind: ProtocolKind, source: &str) -> Result<()> {
    let remote = match kind {
        ProtocolKind::Local => false,
        ProtocolKind::Ssh | ProtocolKind::Sftp => endpoint::is_remote_address(source),
        ProtocolKind::Hdfs => endpoint::is_hdfs_path(source),
    };

    if remote {
        debug!(%kind, source, "remote source accepted without checks");
        return Ok(());
    }

    if !Path::new(source).exists() {
        return Err(TransferError::validation(format!(
            "Source does not exist: {}",
            source
        )));
    }
    Ok(())
}

/// Check that the destination can receive the transfer.
///
/// - Local: an existing directory must be writable; a missing path needs a
///   writable, existing parent; an existing file is rejected.
/// - SSH: remote destinations must answer a bounded `ssh ... echo ok` probe.
/// - SFTP: remote destinations must accept an authenticated session.
/// - HDFS: `hdfs version` is probed, but failures are only logged.
pub fn validate_destination(
    kind: ProtocolKind,
    destination: &str,
    settings: &TransferOptions,
    runner: &dyn CommandRunner,
) -> Result<()> {
    match kind {
        ProtocolKind::Local => validate_local_destination(Path::new(destination)),
        ProtocolKind::Ssh => match RemoteEndpoint::parse(destination) {
            Some(remote) => probe_ssh(&remote, settings, runner),
            None => Ok(()),
        },
        ProtocolKind::Sftp => {
            if endpoint::is_remote_address(destination) {
                crate::protocol::sftp::probe_session(destination, settings)
            } else {
                Ok(())
            }
        }
        ProtocolKind::Hdfs => {
            probe_hdfs(runner);
            Ok(())
        }
    }
}

/// Check that the destination filesystem has room for the source.
///
/// Only meaningful for local transfers; other kinds pass unchecked.
pub fn validate_disk_space(kind: ProtocolKind, source: &str, destination: &str) -> Result<()> {
    if kind != ProtocolKind::Local {
        return Ok(());
    }

    let required = fs_ops::total_size(Path::new(source)).map_err(|e| {
        TransferError::validation(format!("Cannot determine size of {}: {}", source, e))
    })?;

    let target = space_check_dir(Path::new(destination));
    let available = available_space(&target).map_err(|e| {
        TransferError::validation(format!(
            "Cannot determine free space on {}: {}",
            target.display(),
            e
        ))
    })?;

    check_space(required, available)
}

fn check_space(required: u64, available: u64) -> Result<()> {
    if required > available {
        return Err(TransferError::validation(format!(
            "Insufficient disk space. Required: {}, Available: {}",
            format_size(required),
            format_size(available)
        )));
    }
    Ok(())
}

fn validate_local_destination(dest: &Path) -> Result<()> {
    if dest.is_dir() {
        if !is_writable(dest) {
            return Err(TransferError::validation(format!(
                "No write permission on: {}",
                dest.display()
            )));
        }
        return Ok(());
    }

    if !dest.exists() {
        let parent = parent_or_current(dest);
        if !parent.exists() {
            return Err(TransferError::validation(format!(
                "Parent directory does not exist: {}",
                parent.display()
            )));
        }
        if !is_writable(&parent) {
            return Err(TransferError::validation(format!(
                "No write permission on: {}",
                parent.display()
            )));
        }
        return Ok(());
    }

    if dest.is_file() {
        return Err(TransferError::validation(format!(
            "Destination already exists as a file: {}",
            dest.display()
        )));
    }
    Ok(())
}

fn probe_ssh(
    remote: &RemoteEndpoint,
    settings: &TransferOptions,
    runner: &dyn CommandRunner,
) -> Result<()> {
    let remote = remote.clone().with_default_user(settings.user.as_deref());
    let authority = remote.authority();

    let mut args = vec![
        "-o".to_string(),
        format!("ConnectTimeout={}", SSH_CONNECT_TIMEOUT_SECS),
        "-o".to_string(),
        "BatchMode=yes".to_string(),
    ];
    let port = settings.port_or_default();
    if port != DEFAULT_SSH_PORT {
        args.push("-p".to_string());
        args.push(port.to_string());
    }
    if let Some(key_file) = &settings.key_file {
        args.push("-i".to_string());
        args.push(key_file.display().to_string());
    }
    args.push(authority.clone());
    args.push("echo".to_string());
    args.push("ok".to_string());

    debug!(host = %authority, "probing ssh reachability");
    match runner.run_with_timeout("ssh", &args, SSH_PROBE_DEADLINE) {
        Ok(Some(output)) if output.success() => Ok(()),
        Ok(Some(output)) => Err(TransferError::validation(format!(
            "Cannot connect to {}. Check SSH access: {}",
            authority,
            output.failure_detail()
        ))),
        Ok(None) => Err(TransferError::validation(format!(
            "Timeout connecting to {}",
            authority
        ))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(TransferError::validation(
            "Command 'ssh' not found",
        )),
        Err(e) => Err(TransferError::validation(format!(
            "Cannot run 'ssh' to probe {}: {}",
            authority, e
        ))),
    }
}

fn probe_hdfs(runner: &dyn CommandRunner) {
    match runner.run("hdfs", &["version".to_string()]) {
        Ok(output) if output.success() => debug!("hdfs command available"),
        Ok(output) => warn!(
            detail = %output.failure_detail(),
            "'hdfs version' failed; continuing without HDFS validation"
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("'hdfs' command not found; continuing without HDFS validation")
        }
        Err(e) => warn!(error = %e, "cannot run 'hdfs'; continuing without HDFS validation"),
    }
}

fn parent_or_current(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        Some(_) => PathBuf::from("."),
        None => path.to_path_buf(),
    }
}

fn space_check_dir(dest: &Path) -> PathBuf {
    if dest.is_dir() {
        dest.to_path_buf()
    } else {
        parent_or_current(dest)
    }
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};
    access(path, AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Free bytes available to unprivileged users on the filesystem holding `path`.
#[cfg(unix)]
pub fn available_space(path: &Path) -> io::Result<u64> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;
    Ok(stat.blocks_available() as u64 * stat.fragment_size() as u64)
}

/// Free bytes available on the filesystem holding `path`.
#[cfg(not(unix))]
pub fn available_space(path: &Path) -> io::Result<u64> {
    std::fs::metadata(path)?;
    Ok(u64::MAX)
}
