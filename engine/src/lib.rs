//! # CopyWay Engine - Uniform File Transfer Library
//!
//! One copy command over several transports: the local filesystem, SSH
//! (`scp`), SFTP and HDFS (`hdfs dfs`). Whatever backend moves the bytes, a
//! transfer gets the same validation, dry-run preview, progress reporting and
//! error taxonomy.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{execute, ProtocolConfig, ProtocolRegistry, TransferOutcome, TransferRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ProtocolRegistry::with_builtins();
//! let config = ProtocolConfig::load(None)?;
//!
//! let request = TransferRequest::new("local", "/data/report.csv", "/backup/report.csv");
//! match execute(&registry, &config, request)? {
//!     TransferOutcome::Copied => println!("done"),
//!     TransferOutcome::Simulated(plan) => println!("{}", plan),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (TransferOptions, TransferRequest, outcomes)
//! - **error**: Error taxonomy (validation, protocol, configuration)
//! - **config**: Per-protocol settings loaded from YAML
//! - **endpoint**: Local vs remote endpoint classification
//! - **command**: External command execution for delegating backends
//! - **validators**: Pre-flight checks
//! - **progress**: Progress callback trait and console reporter
//! - **fs_ops**: Low-level filesystem operations
//! - **protocol**: Protocol trait, registry and the built-in backends
//! - **job**: Transfer orchestration (create, validate, run)

pub mod command;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod progress;
pub mod protocol;
pub mod validators;

// Re-export main types and functions
pub use config::ProtocolConfig;
pub use error::{ErrorKind, FsError, TransferError};
pub use job::{create_transfer, execute, run_transfer, validate_transfer, Transfer};
pub use model::{
    DryRunPlan, ProtocolKind, TransferOptions, TransferOutcome, TransferRequest, TransferState,
};
pub use progress::{ProgressCallback, ProgressReporter};
pub use protocol::{Protocol, ProtocolRegistry};
