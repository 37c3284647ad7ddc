//! Transfer orchestration.
//!
//! This module provides the transfer lifecycle functions:
//! - Creating a transfer (resolving the protocol and injecting its settings)
//! - Validating a transfer (the backend's pre-flight checks)
//! - Running a transfer (the copy, or the dry-run report)
//!
//! A transfer moves Pending → Validated → Completed. `run_transfer` refuses a
//! transfer that has not been validated, so validation always precedes the
//! copy, dry-run included.

use std::fmt;
use std::time::{Duration, SystemTime};
use tracing::{error, info, info_span, Span};
use uuid::Uuid;

use crate::config::ProtocolConfig;
use crate::error::{Result, TransferError};
use crate::model::{DryRunPlan, TransferOptions, TransferOutcome, TransferRequest, TransferState};
use crate::protocol::{Protocol, ProtocolRegistry};

/// One transfer, from creation to completion.
pub struct Transfer {
    /// Unique identifier, recorded on every log line of this transfer
    pub id: Uuid,

    /// Registry name of the protocol
    pub protocol: String,

    pub source: String,

    pub destination: String,

    /// Per-invocation options, as given by the caller
    pub options: TransferOptions,

    /// Validate only, skip the copy
    pub dry_run: bool,

    pub state: TransferState,

    /// When `run_transfer` started
    pub start_time: Option<SystemTime>,

    /// When `run_transfer` finished
    pub end_time: Option<SystemTime>,

    backend: Box<dyn Protocol>,
}

impl Transfer {
    /// Wall time spent in `run_transfer`, once finished.
    pub fn elapsed(&self) -> Option<Duration> {
        let start = self.start_time?;
        let end = self.end_time?;
        end.duration_since(start).ok()
    }

    fn span(&self) -> Span {
        info_span!("transfer", id = %self.id, protocol = %self.protocol)
    }

    fn require_state(&self, expected: TransferState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(TransferError::protocol(format!(
                "Transfer must be {:?} to {}; current state: {:?}",
                expected, action, self.state
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("dry_run", &self.dry_run)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Create a transfer for `request`.
///
/// The backend is constructed here with the call-site options layered over
/// the stored settings for the protocol.
///
/// # Errors
/// Returns a protocol error if the protocol name is not registered; nothing
/// has been validated or copied at that point.
pub fn create_transfer(
    registry: &ProtocolRegistry,
    config: &ProtocolConfig,
    request: TransferRequest,
) -> Result<Transfer> {
    let settings = request.options.layered(&config.settings_for(&request.protocol));
    let backend = registry
        .create(&request.protocol, settings)
        .map_err(|e| {
            error!(protocol = %request.protocol, error = %e, "cannot create backend");
            e
        })?;

    let transfer = Transfer {
        id: Uuid::new_v4(),
        protocol: request.protocol,
        source: request.source,
        destination: request.destination,
        options: request.options,
        dry_run: request.dry_run,
        state: TransferState::Pending,
        start_time: None,
        end_time: None,
        backend,
    };
    info!(
        id = %transfer.id,
        protocol = %transfer.protocol,
        source = %transfer.source,
        destination = %transfer.destination,
        dry_run = transfer.dry_run,
        "transfer created"
    );
    Ok(transfer)
}

/// Run the backend's pre-flight checks.
///
/// Transitions Pending → Validated. On failure the transfer stays Pending.
pub fn validate_transfer(transfer: &mut Transfer) -> Result<()> {
    let _span = transfer.span().entered();
    transfer.require_state(TransferState::Pending, "validate")?;

    transfer
        .backend
        .validate(&transfer.source, &transfer.destination)
        .map_err(|e| {
            error!(kind = %e.kind(), error = %e, "validation failed");
            e
        })?;

    transfer.state = TransferState::Validated;
    info!("validation passed");
    Ok(())
}

/// Run a validated transfer.
///
/// A dry-run returns the plan without calling the backend's `copy`.
/// Transitions Validated → Completed on success.
///
/// # Errors
/// Returns a protocol error if the transfer was not validated, or whatever
/// the backend's `copy` reports.
pub fn run_transfer(transfer: &mut Transfer) -> Result<TransferOutcome> {
    let _span = transfer.span().entered();
    transfer.require_state(TransferState::Validated, "run")?;
    transfer.start_time = Some(SystemTime::now());

    let outcome = if transfer.dry_run {
        info!("dry-run: copy skipped");
        TransferOutcome::Simulated(DryRunPlan {
            protocol: transfer.protocol.clone(),
            source: transfer.source.clone(),
            destination: transfer.destination.clone(),
            options: transfer.options.clone(),
        })
    } else {
        transfer
            .backend
            .copy(&transfer.source, &transfer.destination, &transfer.options)
            .map_err(|e| {
                error!(kind = %e.kind(), error = %e, "copy failed");
                e
            })?;
        TransferOutcome::Copied
    };

    transfer.end_time = Some(SystemTime::now());
    transfer.state = TransferState::Completed;
    info!(elapsed = ?transfer.elapsed(), "transfer completed");
    Ok(outcome)
}

/// Create, validate and run a transfer in one call.
pub fn execute(
    registry: &ProtocolRegistry,
    config: &ProtocolConfig,
    request: TransferRequest,
) -> Result<TransferOutcome> {
    let mut transfer = create_transfer(registry, config, request)?;
    validate_transfer(&mut transfer)?;
    run_transfer(&mut transfer)
}
