//! File transfer orchestration
//!
//! Runs the copies for one [`TransferRequest`] strictly in input order over a
//! [`RemoteCopy`] implementation. The first failure ends the run; files copied
//! before it stay where they are.

mod error;
pub mod path_utils;
mod sftp;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Direction, Settings};
use path_utils::{join_local_path, join_remote_path, local_file_name, remote_file_name};

pub use error::{CopyError, TransferError};
pub use sftp::SftpCopier;

/// The remote-copy primitive
#[async_trait]
pub trait RemoteCopy: Send + Sync {
    /// Copy a local file to the remote host, returning the bytes written
    async fn upload(&self, local: &str, remote: &str) -> Result<u64, CopyError>;

    /// Copy a remote file to the local host, returning the bytes written
    async fn download(&self, remote: &str, local: &str) -> Result<u64, CopyError>;
}

/// What to copy and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: Direction,
    /// Ordered, non-empty
    pub sources: Vec<String>,
    /// Exact destination for one source, destination directory otherwise
    pub target: String,
}

impl TransferRequest {
    pub fn new(direction: Direction, sources: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            direction,
            sources,
            target: target.into().trim().to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.direction,
            settings.sources.clone(),
            settings.target_path.as_str(),
        )
    }

    /// Destination for `source`.
    ///
    /// A single source is renamed to the target verbatim; with several sources
    /// the source's file name is joined onto the target directory.
    pub fn destination_for(&self, source: &str) -> Result<String, TransferError> {
        if self.sources.len() == 1 {
            return Ok(self.target.clone());
        }

        match self.direction {
            Direction::Upload => local_file_name(source)
                .map(|name| join_remote_path(&self.target, &name))
                .ok_or_else(|| TransferError::NoFileName(source.to_string())),
            Direction::Download => remote_file_name(source)
                .map(|name| join_local_path(&self.target, &name))
                .ok_or_else(|| TransferError::NoFileName(source.to_string())),
        }
    }
}

/// One completed copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLogEntry {
    pub source: String,
    pub target: String,
    pub bytes: u64,
}

/// Outcome of a fully successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferResult {
    pub log: Vec<TransferLogEntry>,
}

impl TransferResult {
    /// Number of files transferred
    pub fn count(&self) -> usize {
        self.log.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.log.iter().map(|entry| entry.bytes).sum()
    }
}

/// Copy every source in order, stopping at the first failure
pub async fn copy<C>(copier: &C, request: &TransferRequest) -> Result<TransferResult, TransferError>
where
    C: RemoteCopy + ?Sized,
{
    let mut result = TransferResult::default();

    for source in &request.sources {
        let target = request.destination_for(source)?;

        let copied = match request.direction {
            Direction::Upload => copier.upload(source, &target).await,
            Direction::Download => copier.download(source, &target).await,
        };

        let bytes = copied.map_err(|error| TransferError::Copy {
            direction: request.direction,
            from: source.clone(),
            to: target.clone(),
            completed: result.count(),
            error,
        })?;

        info!("{} → {} ({} bytes)", source, target, bytes);
        result.log.push(TransferLogEntry {
            source: source.clone(),
            target,
            bytes,
        });
    }

    info!(
        "Transferred {} file(s) ({} bytes)",
        result.count(),
        result.total_bytes()
    );
    Ok(result)
}
