//! ssh-copy-action - copy files to or from a host over SSH
//!
//! The pipeline runs once per process: settings → connection profiles →
//! (optional jump host) → target session → SFTP copies → ordered teardown, all
//! under a single action deadline.

pub mod config;
pub mod deadline;
pub mod error;
pub mod ssh;
pub mod transfer;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Settings;
use error::ActionError;
use ssh::{ConnectionProfile, RusshConnector, SshHandle};
use transfer::{SftpCopier, TransferError, TransferRequest, TransferResult};

/// Install the global tracing subscriber (`RUST_LOG` overrides the `info` default)
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the whole action under the configured deadline
pub async fn run(settings: &Settings) -> Result<TransferResult, ActionError> {
    deadline::guard(settings.action_timeout, execute(settings)).await?
}

async fn execute(settings: &Settings) -> Result<TransferResult, ActionError> {
    let target = ConnectionProfile::from_endpoint(&settings.target, settings.timeout)?;
    let proxy = settings
        .proxy
        .as_ref()
        .map(|proxy| ConnectionProfile::from_endpoint(proxy, settings.timeout))
        .transpose()?;

    let request = TransferRequest::from_settings(settings);
    info!(
        "Starting {} of {} file(s) to {}",
        request.direction,
        request.sources.len(),
        request.target
    );

    let connector = RusshConnector::new();
    let transport = ssh::connect(&connector, &target, proxy.as_ref()).await?;

    let result = transfer_over(transport.session(), &request).await;

    transport.close(&connector).await;
    result
}

async fn transfer_over(
    handle: &SshHandle,
    request: &TransferRequest,
) -> Result<TransferResult, ActionError> {
    let copier = SftpCopier::open(handle)
        .await
        .map_err(TransferError::Session)?;

    let result = transfer::copy(&copier, request).await;

    copier.close().await;
    Ok(result?)
}
