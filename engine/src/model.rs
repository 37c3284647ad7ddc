//! Core data model for transfers.
//!
//! This module defines the main data structures for describing a transfer:
//! - ProtocolKind: the built-in transport families
//! - TransferOptions: the optional settings bag shared by every backend
//! - TransferRequest: what the caller asked for
//! - TransferState, TransferOutcome, DryRunPlan: lifecycle and results

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Default port for SSH-based transports.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// The built-in transport families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    /// Plain filesystem copy on the local machine
    Local,
    /// `scp` subprocess
    Ssh,
    /// SFTP session
    Sftp,
    /// `hdfs dfs` subprocess
    Hdfs,
}

impl ProtocolKind {
    /// All built-in kinds, in registration order.
    pub const ALL: [ProtocolKind; 4] = [
        ProtocolKind::Local,
        ProtocolKind::Ssh,
        ProtocolKind::Hdfs,
        ProtocolKind::Sftp,
    ];

    /// The registry name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolKind::Local => "local",
            ProtocolKind::Ssh => "ssh",
            ProtocolKind::Sftp => "sftp",
            ProtocolKind::Hdfs => "hdfs",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional settings understood by the backends.
///
/// Every field is optional. Each backend reads only the subset relevant to it
/// and ignores the rest. The same record is used for per-invocation options
/// and for the persisted per-protocol configuration; `layered` resolves the
/// precedence between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOptions {
    /// Remote port (SSH/SFTP)
    pub port: Option<u16>,
    /// Remote user (SSH/SFTP)
    pub user: Option<String>,
    /// Password (SFTP)
    pub password: Option<String>,
    /// Private key file (SSH/SFTP)
    pub key_file: Option<PathBuf>,
    /// Compress the transport stream (SSH/SFTP)
    pub compress: Option<bool>,
    /// Replication factor applied after upload (HDFS)
    pub replication: Option<u16>,
    /// Overwrite existing destination files (HDFS)
    pub overwrite: Option<bool>,
    /// Permission mode applied after upload, e.g. "755" (HDFS)
    #[serde(deserialize_with = "deserialize_permission")]
    pub permission: Option<String>,
    /// Preserve timestamps (local), default true
    pub preserve_metadata: Option<bool>,
    /// Follow symlinks instead of copying them as links (local), default false
    pub follow_symlinks: Option<bool>,
    /// Render progress on stdout, default true
    #[serde(alias = "progress")]
    pub show_progress: Option<bool>,
}

impl TransferOptions {
    /// Resolve precedence: values set on `self` win, unset fields fall back
    /// to `lower`.
    pub fn layered(&self, lower: &TransferOptions) -> TransferOptions {
        TransferOptions {
            port: self.port.or(lower.port),
            user: self.user.clone().or_else(|| lower.user.clone()),
            password: self.password.clone().or_else(|| lower.password.clone()),
            key_file: self.key_file.clone().or_else(|| lower.key_file.clone()),
            compress: self.compress.or(lower.compress),
            replication: self.replication.or(lower.replication),
            overwrite: self.overwrite.or(lower.overwrite),
            permission: self.permission.clone().or_else(|| lower.permission.clone()),
            preserve_metadata: self.preserve_metadata.or(lower.preserve_metadata),
            follow_symlinks: self.follow_symlinks.or(lower.follow_symlinks),
            show_progress: self.show_progress.or(lower.show_progress),
        }
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    pub fn compress(&self) -> bool {
        self.compress.unwrap_or(false)
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite.unwrap_or(false)
    }

    pub fn preserve_metadata(&self) -> bool {
        self.preserve_metadata.unwrap_or(true)
    }

    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks.unwrap_or(false)
    }

    pub fn show_progress(&self) -> bool {
        self.show_progress.unwrap_or(true)
    }

    /// The fields that are set, as display pairs. The password is masked.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(port) = self.port {
            entries.push(("port", port.to_string()));
        }
        if let Some(user) = &self.user {
            entries.push(("user", user.clone()));
        }
        if self.password.is_some() {
            entries.push(("password", "****".to_string()));
        }
        if let Some(key_file) = &self.key_file {
            entries.push(("key_file", key_file.display().to_string()));
        }
        if let Some(compress) = self.compress {
            entries.push(("compress", compress.to_string()));
        }
        if let Some(replication) = self.replication {
            entries.push(("replication", replication.to_string()));
        }
        if let Some(overwrite) = self.overwrite {
            entries.push(("overwrite", overwrite.to_string()));
        }
        if let Some(permission) = &self.permission {
            entries.push(("permission", permission.clone()));
        }
        if let Some(preserve) = self.preserve_metadata {
            entries.push(("preserve_metadata", preserve.to_string()));
        }
        if let Some(follow) = self.follow_symlinks {
            entries.push(("follow_symlinks", follow.to_string()));
        }
        if let Some(progress) = self.show_progress {
            entries.push(("show_progress", progress.to_string()));
        }
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// Accept `permission: 755` as well as `permission: "755"`.
fn deserialize_permission<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Mode {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Mode>::deserialize(deserializer)?.map(|mode| match mode {
        Mode::Text(text) => text,
        Mode::Number(number) => number.to_string(),
    }))
}

/// A caller's request: protocol name, endpoints and per-invocation options.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Registry name of the protocol
    pub protocol: String,

    /// Source endpoint, opaque until handed to the backend
    pub source: String,

    /// Destination endpoint, opaque until handed to the backend
    pub destination: String,

    /// Options given for this invocation only
    pub options: TransferOptions,

    /// Validate only, skip the copy
    pub dry_run: bool,
}

impl TransferRequest {
    pub fn new(
        protocol: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        TransferRequest {
            protocol: protocol.into(),
            source: source.into(),
            destination: destination.into(),
            options: TransferOptions::default(),
            dry_run: false,
        }
    }

    pub fn with_options(mut self, options: TransferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// The state of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Created, backend resolved, not yet validated
    Pending,
    /// Validation passed
    Validated,
    /// Copy finished or dry-run reported
    Completed,
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Data was copied
    Copied,
    /// Dry-run: validation passed and nothing was copied
    Simulated(DryRunPlan),
}

/// The operation a dry-run would have executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunPlan {
    pub protocol: String,
    pub source: String,
    pub destination: String,
    pub options: TransferOptions,
}

impl fmt::Display for DryRunPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[DRY-RUN] Operation that would be executed:")?;
        writeln!(f, "  Protocol: {}", self.protocol)?;
        writeln!(f, "  Source: {}", self.source)?;
        write!(f, "  Destination: {}", self.destination)?;
        let entries = self.options.entries();
        if !entries.is_empty() {
            let rendered: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", key, value))
                .collect();
            write!(f, "\n  Options: {{{}}}", rendered.join(", "))?;
        }
        Ok(())
    }
}
