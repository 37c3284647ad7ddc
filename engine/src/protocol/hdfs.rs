//! HDFS backend, delegating to the `hdfs dfs` command line.
//!
//! Exactly one endpoint must be an HDFS path (see
//! [`is_hdfs_path`](crate::endpoint::is_hdfs_path)). Uploads run `-put`, then
//! the optional `-setrep` and `-chmod` follow-ups. A failing follow-up fails
//! the copy but the uploaded data stays in place.

use std::io;
use tracing::{error, info};

use super::Protocol;
use crate::command::{CommandRunner, SystemRunner};
use crate::endpoint;
use crate::error::{Result, TransferError};
use crate::model::{ProtocolKind, TransferOptions};
use crate::progress;
use crate::validators;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upload,
    Download,
}

/// Copies between the local filesystem and HDFS.
pub struct HdfsProtocol {
    settings: TransferOptions,
    runner: Box<dyn CommandRunner>,
}

impl HdfsProtocol {
    pub fn new(settings: TransferOptions) -> Self {
        Self::with_runner(settings, Box::new(SystemRunner))
    }

    /// Use `runner` for every `hdfs` invocation.
    pub fn with_runner(settings: TransferOptions, runner: Box<dyn CommandRunner>) -> Self {
        HdfsProtocol { settings, runner }
    }

    fn upload(&self, source: &str, destination: &str, options: &TransferOptions) -> Result<()> {
        let mut args = vec!["-put".to_string()];
        if options.overwrite() {
            args.push("-f".to_string());
        }
        args.push(source.to_string());
        args.push(destination.to_string());
        self.dfs(&args).map_err(|detail| {
            TransferError::protocol(format!("HDFS upload failed: {}", detail))
        })?;

        if let Some(replication) = options.replication {
            let args = [
                "-setrep".to_string(),
                replication.to_string(),
                destination.to_string(),
            ];
            self.dfs(&args)
                .map_err(|detail| follow_up_failed(destination, "setting replication", &detail))?;
        }

        if let Some(permission) = &options.permission {
            let args = [
                "-chmod".to_string(),
                permission.clone(),
                destination.to_string(),
            ];
            self.dfs(&args)
                .map_err(|detail| follow_up_failed(destination, "setting permissions", &detail))?;
        }
        Ok(())
    }

    fn download(&self, source: &str, destination: &str, options: &TransferOptions) -> Result<()> {
        let mut args = vec!["-get".to_string()];
        if options.overwrite() {
            args.push("-f".to_string());
        }
        args.push(source.to_string());
        args.push(destination.to_string());
        self.dfs(&args).map_err(|detail| {
            TransferError::protocol(format!("HDFS download failed: {}", detail))
        })
    }

    /// Run `hdfs dfs <args>`; the error is a human-readable detail.
    fn dfs(&self, args: &[String]) -> std::result::Result<(), String> {
        let mut full = vec!["dfs".to_string()];
        full.extend(args.iter().cloned());
        info!(command = %format!("hdfs {}", full.join(" ")), "running hdfs command");

        match self.runner.run("hdfs", &full) {
            Ok(output) if output.success() => Ok(()),
            Ok(output) => {
                let detail = output.failure_detail();
                error!(%detail, "hdfs command failed");
                Err(detail)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err("Command 'hdfs' not found".to_string())
            }
            Err(e) => Err(e.to_string()),
        }
    }
}

impl Protocol for HdfsProtocol {
    fn validate(&self, source: &str, destination: &str) -> Result<()> {
        validators::validate_source(ProtocolKind::Hdfs, source)?;
        validators::validate_destination(
            ProtocolKind::Hdfs,
            destination,
            &self.settings,
            self.runner.as_ref(),
        )
    }

    fn copy(&self, source: &str, destination: &str, options: &TransferOptions) -> Result<()> {
        let options = options.layered(&self.settings);
        match direction(source, destination)? {
            Direction::Upload => {
                self.upload(source, destination, &options)?;
                if options.show_progress() {
                    progress::report_whole(source, "Uploading");
                }
            }
            Direction::Download => self.download(source, destination, &options)?,
        }
        info!(source, destination, "hdfs copy completed");
        Ok(())
    }
}

fn direction(source: &str, destination: &str) -> Result<Direction> {
    match (endpoint::is_hdfs_path(source), endpoint::is_hdfs_path(destination)) {
        (false, true) => Ok(Direction::Upload),
        (true, false) => Ok(Direction::Download),
        _ => Err(TransferError::protocol(format!(
            "Exactly one of source and destination must be an HDFS path: {} -> {}",
            source, destination
        ))),
    }
}

fn follow_up_failed(destination: &str, step: &str, detail: &str) -> TransferError {
    TransferError::protocol(format!(
        "Data was already uploaded to {} but {} failed: {}",
        destination, step, detail
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::{RecordingRunner, Reply};
    use crate::error::ErrorKind;

    fn quiet() -> TransferOptions {
        TransferOptions {
            show_progress: Some(false),
            ..Default::default()
        }
    }

    fn backend(settings: TransferOptions, runner: &RecordingRunner) -> HdfsProtocol {
        HdfsProtocol::with_runner(settings, Box::new(runner.clone()))
    }

    fn line(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_direction_detection() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let local = temp_dir.path().to_string_lossy().to_string();

        assert_eq!(direction(&local, "hdfs://nn/data").unwrap(), Direction::Upload);
        assert_eq!(direction("/not/here/at/all", &local).unwrap(), Direction::Download);
        assert_eq!(
            direction("relative.txt", "/user/data/in").unwrap(),
            Direction::Upload
        );
    }

    #[test]
    fn test_ambiguous_direction_is_protocol_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let local = temp_dir.path().to_string_lossy().to_string();

        let both_local = direction(&local, "relative/out").unwrap_err();
        assert_eq!(both_local.kind(), ErrorKind::Protocol);

        let both_hdfs = direction("hdfs://nn/a", "/missing/locally/b").unwrap_err();
        assert_eq!(both_hdfs.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_upload_with_follow_ups() {
        let runner = RecordingRunner::new();
        let settings = TransferOptions {
            replication: Some(3),
            permission: Some("755".to_string()),
            show_progress: Some(false),
            ..Default::default()
        };
        let call_site = TransferOptions {
            overwrite: Some(true),
            ..Default::default()
        };
        backend(settings, &runner)
            .copy("data.csv", "hdfs://nn/user/data.csv", &call_site)
            .expect("upload should succeed");

        assert_eq!(
            runner.calls(),
            vec![
                line(&["hdfs", "dfs", "-put", "-f", "data.csv", "hdfs://nn/user/data.csv"]),
                line(&["hdfs", "dfs", "-setrep", "3", "hdfs://nn/user/data.csv"]),
                line(&["hdfs", "dfs", "-chmod", "755", "hdfs://nn/user/data.csv"]),
            ]
        );
    }

    #[test]
    fn test_download_command() {
        let runner = RecordingRunner::new();
        backend(quiet(), &runner)
            .copy("hdfs://nn/user/data.csv", "data.csv", &TransferOptions::default())
            .expect("download should succeed");

        assert_eq!(
            runner.calls(),
            vec![line(&["hdfs", "dfs", "-get", "hdfs://nn/user/data.csv", "data.csv"])]
        );
    }

    #[test]
    fn test_failed_follow_up_reports_partial_upload() {
        let runner =
            RecordingRunner::with_replies(vec![Reply::Exit(0, ""), Reply::Exit(1, "quota exceeded")]);
        let settings = TransferOptions {
            replication: Some(5),
            permission: Some("700".to_string()),
            show_progress: Some(false),
            ..Default::default()
        };
        let err = backend(settings, &runner)
            .copy("data.csv", "hdfs://nn/out", &TransferOptions::default())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("already uploaded"));
        assert!(err.to_string().contains("quota exceeded"));
        // chmod never ran
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_missing_hdfs_tool_is_protocol_error() {
        let runner = RecordingRunner::with_replies(vec![Reply::Missing]);
        let err = backend(quiet(), &runner)
            .copy("hdfs://nn/a", "a", &TransferOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_validate_tolerates_missing_tool() {
        let runner = RecordingRunner::with_replies(vec![Reply::Missing]);
        backend(quiet(), &runner)
            .validate("hdfs://nn/a", "out")
            .expect("hdfs probe failures are not fatal");
    }
}
