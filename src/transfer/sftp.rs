//! SFTP implementation of the remote-copy primitive

use std::io;
use std::path::Path;

use async_trait::async_trait;
use russh_sftp::client::SftpSession;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::error::CopyError;
use super::RemoteCopy;
use crate::ssh::SshHandle;

/// Copies files over one SFTP subsystem channel of the target session
pub struct SftpCopier {
    sftp: SftpSession,
}

impl SftpCopier {
    /// Open the SFTP subsystem on an authenticated session
    pub async fn open(handle: &SshHandle) -> Result<Self, CopyError> {
        info!("Opening SFTP subsystem");

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| CopyError::Channel(e.to_string()))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            CopyError::SubsystemNotAvailable(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| CopyError::SubsystemNotAvailable(e.to_string()))?;

        debug!("SFTP subsystem ready");
        Ok(Self { sftp })
    }

    /// Close the SFTP channel
    pub async fn close(self) {
        if let Err(e) = self.sftp.close().await {
            debug!("Failed to close SFTP session: {}", e);
        }
    }
}

#[async_trait]
impl RemoteCopy for SftpCopier {
    async fn upload(&self, local: &str, remote: &str) -> Result<u64, CopyError> {
        debug!("Uploading {} to {}", local, remote);

        let source = tokio::fs::File::open(local).await?;
        let destination = self.sftp.create(remote).await?;

        Ok(stream(source, destination).await?)
    }

    async fn download(&self, remote: &str, local: &str) -> Result<u64, CopyError> {
        debug!("Downloading {} to {}", remote, local);

        let source = self.sftp.open(remote).await?;
        let destination = create_local(Path::new(local)).await?;

        Ok(stream(source, destination).await?)
    }
}

/// Create (or truncate) a local file, creating missing parent directories
async fn create_local(path: &Path) -> io::Result<tokio::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::File::create(path).await
}

/// Copy everything from `source` into `destination`, then shut the writer down so
/// buffered bytes are flushed and remote handles are closed.
async fn stream<R, W>(mut source: R, mut destination: W) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bytes = tokio::io::copy(&mut source, &mut destination).await?;
    destination.shutdown().await?;
    Ok(bytes)
}
