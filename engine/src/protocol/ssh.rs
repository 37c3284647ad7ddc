//! SSH backend, delegating to `scp`.
//!
//! Direction does not matter here: `scp -r` copies either way in one command.

use std::io;
use tracing::{error, info};

use super::Protocol;
use crate::command::{CommandRunner, SystemRunner};
use crate::endpoint::{self, RemoteEndpoint};
use crate::error::{Result, TransferError};
use crate::model::{ProtocolKind, TransferOptions, DEFAULT_SSH_PORT};
use crate::progress;
use crate::validators;

/// Copies with `scp`.
pub struct SshProtocol {
    settings: TransferOptions,
    runner: Box<dyn CommandRunner>,
}

impl SshProtocol {
    pub fn new(settings: TransferOptions) -> Self {
        Self::with_runner(settings, Box::new(SystemRunner))
    }

    /// Use `runner` for every `scp`/`ssh` invocation.
    pub fn with_runner(settings: TransferOptions, runner: Box<dyn CommandRunner>) -> Self {
        SshProtocol { settings, runner }
    }
}

impl Protocol for SshProtocol {
    fn validate(&self, source: &str, destination: &str) -> Result<()> {
        validators::validate_source(ProtocolKind::Ssh, source)?;
        validators::validate_destination(
            ProtocolKind::Ssh,
            destination,
            &self.settings,
            self.runner.as_ref(),
        )
    }

    fn copy(&self, source: &str, destination: &str, options: &TransferOptions) -> Result<()> {
        let options = options.layered(&self.settings);
        let args = scp_args(source, destination, &options);
        info!(command = %format!("scp {}", args.join(" ")), "running ssh copy");

        let output = self.runner.run("scp", &args).map_err(|e| {
            error!(error = %e, "cannot run scp");
            if e.kind() == io::ErrorKind::NotFound {
                TransferError::protocol("Command 'scp' not found")
            } else {
                TransferError::protocol(format!("SSH copy failed: {}", e))
            }
        })?;

        if !output.success() {
            let detail = output.failure_detail();
            error!(%detail, "scp failed");
            return Err(TransferError::protocol(format!("SSH copy failed: {}", detail)));
        }

        if options.show_progress() && !endpoint::is_remote_address(source) {
            progress::report_whole(source, "Copying");
        }
        info!(source, destination, "ssh copy completed");
        Ok(())
    }
}

/// The full `scp` argument list for one transfer.
fn scp_args(source: &str, destination: &str, options: &TransferOptions) -> Vec<String> {
    let mut args = vec!["-r".to_string()];

    let port = options.port_or_default();
    if port != DEFAULT_SSH_PORT {
        args.push("-P".to_string());
        args.push(port.to_string());
    }
    if let Some(key_file) = &options.key_file {
        args.push("-i".to_string());
        args.push(key_file.display().to_string());
    }
    if options.compress() {
        args.push("-C".to_string());
    }

    let user = options.user.as_deref();
    args.push(with_user(source, user));
    args.push(with_user(destination, user));
    args
}

fn with_user(endpoint: &str, user: Option<&str>) -> String {
    match RemoteEndpoint::parse(endpoint) {
        Some(remote) => remote.with_default_user(user).to_string(),
        None => endpoint.to_string(),
    }
}
