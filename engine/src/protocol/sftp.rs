//! SFTP backend.
//!
//! Sessions are opened with `ssh2` when the `sftp` feature is enabled (the
//! default). A local source that exists means upload, anything else means
//! download. Files stream in fixed-size chunks so progress advances
//! per chunk; directories are walked entry by entry.

use std::env;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

use super::Protocol;
use crate::command::SystemRunner;
use crate::endpoint::{self, RemoteEndpoint};
use crate::error::{Result, TransferError};
use crate::model::{ProtocolKind, TransferOptions};
use crate::progress::ProgressCallback;
use crate::validators;

/// Bytes read and written per transfer step.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Failures while opening or using an SFTP session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("SFTP transport unavailable: built without the 'sftp' feature")]
    Unavailable,

    #[error("invalid remote endpoint '{0}', expected [user@]host:/path")]
    InvalidEndpoint(String),

    #[error("no user for {host}: pass --user or set USER")]
    MissingUser { host: String },

    #[error("cannot resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },

    #[error("authentication failed for {user}@{host}")]
    Authentication { user: String, host: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("ssh: {0}")]
    Ssh(String),
}

#[cfg(feature = "sftp")]
impl From<ssh2::Error> for SessionError {
    fn from(err: ssh2::Error) -> Self {
        SessionError::Ssh(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upload,
    Download,
}

/// Copies to and from an SFTP server.
#[derive(Debug, Clone, Default)]
pub struct SftpProtocol {
    settings: TransferOptions,
}

impl SftpProtocol {
    pub fn new(settings: TransferOptions) -> Self {
        SftpProtocol { settings }
    }
}

impl Protocol for SftpProtocol {
    fn validate(&self, source: &str, destination: &str) -> Result<()> {
        if !cfg!(feature = "sftp") {
            return Err(TransferError::validation(SessionError::Unavailable.to_string()));
        }
        validators::validate_source(ProtocolKind::Sftp, source)?;
        validators::validate_destination(
            ProtocolKind::Sftp,
            destination,
            &self.settings,
            &SystemRunner,
        )?;
        // Downloads have a local destination; reach the remote source instead.
        if !endpoint::is_remote_address(destination) && endpoint::is_remote_address(source) {
            probe_session(source, &self.settings)?;
        }
        Ok(())
    }

    fn copy(&self, source: &str, destination: &str, options: &TransferOptions) -> Result<()> {
        let options = options.layered(&self.settings);
        let result = match direction(source) {
            Direction::Upload => {
                let remote = RemoteEndpoint::parse(destination)
                    .ok_or_else(|| SessionError::InvalidEndpoint(destination.to_string()));
                remote.and_then(|remote| session::upload(Path::new(source), &remote, &options))
            }
            Direction::Download => match RemoteEndpoint::parse(source) {
                None => Err(SessionError::InvalidEndpoint(source.to_string())),
                Some(_) if RemoteEndpoint::parse(destination).is_some() => {
                    return Err(TransferError::protocol(format!(
                        "One endpoint must be local: {} -> {}",
                        source, destination
                    )))
                }
                Some(remote) => session::download(&remote, Path::new(destination), &options),
            },
        };

        match result {
            Ok(()) => {
                info!(source, destination, "sftp copy completed");
                Ok(())
            }
            Err(e) => {
                error!(source, destination, error = %e, "sftp copy failed");
                Err(TransferError::protocol(format!("SFTP copy failed: {}", e)))
            }
        }
    }
}

/// Open and authenticate a session to `destination` without transferring
/// anything. Any failure is a validation error.
pub fn probe_session(destination: &str, settings: &TransferOptions) -> Result<()> {
    let remote = RemoteEndpoint::parse(destination).ok_or_else(|| {
        TransferError::validation(SessionError::InvalidEndpoint(destination.to_string()).to_string())
    })?;
    session::probe(&remote, settings).map_err(|e| {
        TransferError::validation(format!("Cannot open SFTP session to {}: {}", remote.host, e))
    })
}

fn direction(source: &str) -> Direction {
    if Path::new(source).exists() {
        Direction::Upload
    } else {
        Direction::Download
    }
}

/// The login name: explicit option, else the endpoint's user, else the
/// local account from `USER`/`USERNAME`.
#[cfg_attr(not(feature = "sftp"), allow(dead_code))]
fn resolve_user<F>(
    explicit: Option<&str>,
    endpoint_user: Option<&str>,
    host: &str,
    env_lookup: F,
) -> std::result::Result<String, SessionError>
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .or(endpoint_user)
        .map(str::to_string)
        .or_else(|| env_lookup("USER"))
        .or_else(|| env_lookup("USERNAME"))
        .filter(|user| !user.is_empty())
        .ok_or_else(|| SessionError::MissingUser {
            host: host.to_string(),
        })
}

#[cfg_attr(not(feature = "sftp"), allow(dead_code))]
fn local_user(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Copy `reader` into `writer` in `CHUNK_SIZE` steps, reporting each step.
#[cfg_attr(not(feature = "sftp"), allow(dead_code))]
fn stream<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    name: Option<&str>,
    progress: &mut dyn ProgressCallback,
) -> io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        copied += n as u64;
        progress.update(n as u64, name);
    }
    writer.flush()?;
    Ok(copied)
}

#[cfg(feature = "sftp")]
mod session {
    use super::{local_user, resolve_user, stream, SessionError};
    use crate::endpoint::RemoteEndpoint;
    use crate::fs_ops::{self, NoProgress};
    use crate::model::TransferOptions;
    use crate::progress::{ProgressCallback, ProgressReporter};
    use ssh2::{Session, Sftp};
    use std::fs;
    use std::io;
    use std::net::{TcpStream, ToSocketAddrs};
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tracing::debug;

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    const HANDSHAKE_TIMEOUT_MS: u32 = 15_000;
    const REMOTE_DIR_MODE: i32 = 0o755;

    type SessionResult<T> = std::result::Result<T, SessionError>;

    pub(super) fn probe(remote: &RemoteEndpoint, options: &TransferOptions) -> SessionResult<()> {
        let session = connect(remote, options)?;
        session.sftp()?;
        debug!(host = %remote.host, "sftp session probe succeeded");
        Ok(())
    }

    pub(super) fn upload(
        local: &Path,
        remote: &RemoteEndpoint,
        options: &TransferOptions,
    ) -> SessionResult<()> {
        let session = connect(remote, options)?;
        let sftp = session.sftp()?;
        let remote_path = PathBuf::from(&remote.path);

        let mut reporter = options.show_progress().then(|| {
            let total = fs_ops::total_size(local).unwrap_or(0);
            ProgressReporter::stdout(total, "Uploading")
        });
        let mut silent = NoProgress;
        let progress: &mut dyn ProgressCallback = match reporter.as_mut() {
            Some(reporter) => reporter,
            None => &mut silent,
        };

        if local.is_dir() {
            upload_dir(&sftp, local, &remote_path, progress)?;
        } else {
            let target = match (sftp.stat(&remote_path), local.file_name()) {
                (Ok(stat), Some(name)) if stat.is_dir() => remote_path.join(name),
                _ => remote_path,
            };
            upload_file(&sftp, local, &target, progress)?;
        }
        progress.finish();
        Ok(())
    }

    pub(super) fn download(
        remote: &RemoteEndpoint,
        local: &Path,
        options: &TransferOptions,
    ) -> SessionResult<()> {
        let session = connect(remote, options)?;
        let sftp = session.sftp()?;
        let remote_path = PathBuf::from(&remote.path);
        let stat = sftp.stat(&remote_path)?;

        let mut reporter = options.show_progress().then(|| {
            let total = if stat.is_dir() { 0 } else { stat.size.unwrap_or(0) };
            ProgressReporter::stdout(total, "Downloading")
        });
        let mut silent = NoProgress;
        let progress: &mut dyn ProgressCallback = match reporter.as_mut() {
            Some(reporter) => reporter,
            None => &mut silent,
        };

        if stat.is_dir() {
            download_dir(&sftp, &remote_path, local, progress)?;
        } else {
            let target = match remote_path.file_name() {
                Some(name) if local.is_dir() => local.join(name),
                _ => local.to_path_buf(),
            };
            download_file(&sftp, &remote_path, &target, progress)?;
        }
        progress.finish();
        Ok(())
    }

    fn connect(remote: &RemoteEndpoint, options: &TransferOptions) -> SessionResult<Session> {
        let user = resolve_user(
            options.user.as_deref(),
            remote.user.as_deref(),
            &remote.host,
            local_user,
        )?;
        let port = options.port_or_default();

        let addr = (remote.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|e| SessionError::Resolve {
                host: remote.host.clone(),
                source: e,
            })?
            .next()
            .ok_or_else(|| SessionError::Resolve {
                host: remote.host.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "no address found"),
            })?;

        debug!(host = %remote.host, port, user = %user, "opening sftp session");
        let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_compress(options.compress());
        session.set_timeout(HANDSHAKE_TIMEOUT_MS);
        session.handshake()?;

        if let Some(key_file) = &options.key_file {
            session.userauth_pubkey_file(&user, None, key_file, None)?;
        } else if let Some(password) = &options.password {
            session.userauth_password(&user, password)?;
        } else {
            session.userauth_agent(&user)?;
        }
        if !session.authenticated() {
            return Err(SessionError::Authentication {
                user,
                host: remote.host.clone(),
            });
        }

        // No deadline on the transfer itself
        session.set_timeout(0);
        Ok(session)
    }

    fn upload_file(
        sftp: &Sftp,
        local: &Path,
        remote: &Path,
        progress: &mut dyn ProgressCallback,
    ) -> SessionResult<()> {
        let mut src = fs::File::open(local)?;
        let mut dst = sftp.create(remote)?;
        let name = local.file_name().map(|n| n.to_string_lossy().into_owned());
        stream(&mut src, &mut dst, name.as_deref(), progress)?;
        Ok(())
    }

    fn upload_dir(
        sftp: &Sftp,
        local: &Path,
        remote: &Path,
        progress: &mut dyn ProgressCallback,
    ) -> SessionResult<()> {
        make_remote_dir(sftp, remote)?;
        for entry in fs::read_dir(local)? {
            let entry = entry?;
            let path = entry.path();
            let target = remote.join(entry.file_name());
            if path.is_dir() {
                upload_dir(sftp, &path, &target, progress)?;
            } else {
                upload_file(sftp, &path, &target, progress)?;
            }
        }
        Ok(())
    }

    /// Create `dir`; an already existing directory is not an error.
    fn make_remote_dir(sftp: &Sftp, dir: &Path) -> SessionResult<()> {
        match sftp.mkdir(dir, REMOTE_DIR_MODE) {
            Ok(()) => Ok(()),
            Err(e) => match sftp.stat(dir) {
                Ok(stat) if stat.is_dir() => Ok(()),
                _ => Err(e.into()),
            },
        }
    }

    fn download_file(
        sftp: &Sftp,
        remote: &Path,
        local: &Path,
        progress: &mut dyn ProgressCallback,
    ) -> SessionResult<()> {
        let mut src = sftp.open(remote)?;
        let mut dst = fs::File::create(local)?;
        let name = remote.file_name().map(|n| n.to_string_lossy().into_owned());
        stream(&mut src, &mut dst, name.as_deref(), progress)?;
        Ok(())
    }

    fn download_dir(
        sftp: &Sftp,
        remote: &Path,
        local: &Path,
        progress: &mut dyn ProgressCallback,
    ) -> SessionResult<()> {
        fs::create_dir_all(local)?;
        for (path, stat) in sftp.readdir(remote)? {
            let Some(name) = path.file_name() else {
                continue;
            };
            let target = local.join(name);
            if stat.is_dir() {
                download_dir(sftp, &path, &target, progress)?;
            } else {
                download_file(sftp, &path, &target, progress)?;
            }
        }
        Ok(())
    }
}

#[cfg(not(feature = "sftp"))]
mod session {
    use super::SessionError;
    use crate::endpoint::RemoteEndpoint;
    use crate::model::TransferOptions;
    use std::path::Path;

    pub(super) fn probe(_remote: &RemoteEndpoint, _options: &TransferOptions) -> Result<(), SessionError> {
        Err(SessionError::Unavailable)
    }

    pub(super) fn upload(
        _local: &Path,
        _remote: &RemoteEndpoint,
        _options: &TransferOptions,
    ) -> Result<(), SessionError> {
        Err(SessionError::Unavailable)
    }

    pub(super) fn download(
        _remote: &RemoteEndpoint,
        _local: &Path,
        _options: &TransferOptions,
    ) -> Result<(), SessionError> {
        Err(SessionError::Unavailable)
    }
}
