//! Transfer error types

use thiserror::Error;

use crate::config::Direction;

/// Failure of a single copy primitive call
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SFTP error: {0}")]
    Sftp(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("SFTP subsystem not available: {0}")]
    SubsystemNotAvailable(String),
}

impl From<russh_sftp::client::error::Error> for CopyError {
    fn from(err: russh_sftp::client::error::Error) -> Self {
        CopyError::Sftp(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("cannot derive a file name from source {0:?}")]
    NoFileName(String),

    #[error("{direction} of {from} -> {to} failed after {completed} file(s): {error}")]
    Copy {
        direction: Direction,
        from: String,
        to: String,
        /// Files that finished before this one
        completed: usize,
        #[source]
        error: CopyError,
    },

    #[error("Failed to open SFTP session: {0}")]
    Session(#[source] CopyError),
}
