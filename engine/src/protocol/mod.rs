//! The protocol contract and the registry of backends.
//!
//! Every transport implements [`Protocol`]. The [`ProtocolRegistry`] maps a
//! protocol name to a constructor and is the single extension point for new
//! transports: register a name, then `create` it with a settings bag.

pub mod hdfs;
pub mod local;
pub mod sftp;
pub mod ssh;

use crate::error::{Result, TransferError};
use crate::model::{ProtocolKind, TransferOptions};

pub use hdfs::HdfsProtocol;
pub use local::LocalProtocol;
pub use sftp::SftpProtocol;
pub use ssh::SshProtocol;

/// A transport backend.
///
/// `validate` must be called, and succeed, before `copy`. Backends keep the
/// settings bag they were constructed with and read only the keys they know.
pub trait Protocol {
    /// Check the preconditions of a transfer without moving any byte.
    ///
    /// Network reachability probes are allowed; the destination's contents
    /// are never touched.
    fn validate(&self, source: &str, destination: &str) -> Result<()>;

    /// Perform the transfer.
    ///
    /// `options` are per-invocation values; they take precedence over the
    /// settings the backend was constructed with.
    fn copy(&self, source: &str, destination: &str, options: &TransferOptions) -> Result<()>;
}

/// Builds a backend from its settings bag.
pub type ProtocolConstructor = Box<dyn Fn(TransferOptions) -> Box<dyn Protocol> + Send + Sync>;

/// Name → constructor mapping, in registration order.
#[derive(Default)]
pub struct ProtocolRegistry {
    entries: Vec<(String, ProtocolConstructor)>,
}

impl ProtocolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in backends: local, ssh, hdfs, sftp.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ProtocolKind::Local.name(), |settings| {
            Box::new(LocalProtocol::new(settings)) as Box<dyn Protocol>
        });
        registry.register(ProtocolKind::Ssh.name(), |settings| {
            Box::new(SshProtocol::new(settings)) as Box<dyn Protocol>
        });
        registry.register(ProtocolKind::Hdfs.name(), |settings| {
            Box::new(HdfsProtocol::new(settings)) as Box<dyn Protocol>
        });
        registry.register(ProtocolKind::Sftp.name(), |settings| {
            Box::new(SftpProtocol::new(settings)) as Box<dyn Protocol>
        });
        registry
    }

    /// Register a constructor under `name`.
    ///
    /// Registering an existing name replaces its constructor and keeps its
    /// position in `list()`.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(TransferOptions) -> Box<dyn Protocol> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(protocol = %name, "protocol registered");
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = Box::new(constructor),
            None => self.entries.push((name, Box::new(constructor))),
        }
    }

    /// Construct the backend registered under `name` with `settings`.
    pub fn create(&self, name: &str, settings: TransferOptions) -> Result<Box<dyn Protocol>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, constructor)| constructor(settings))
            .ok_or_else(|| TransferError::protocol(format!("Unsupported protocol: {}", name)))
    }

    /// Registered names, in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }
}
