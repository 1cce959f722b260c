//! SSH Client implementation using russh

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::{Algorithm, HashAlg, PublicKey};
use russh::{ChannelStream, Disconnect};
use tracing::{debug, info, warn};

use super::auth::AuthMechanism;
use super::config::ConnectionProfile;
use super::error::SshError;
use super::host_key::HostKeyPolicy;
use super::proxy::Connector;

/// Client handler for russh callbacks
///
/// Checks the server's host key against the hop's [`HostKeyPolicy`]. A rejection
/// aborts the handshake before any channel can be opened.
pub struct ClientHandler {
    /// Host being verified
    host: String,
    /// Port being verified
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host, port, policy }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        self.policy
            .verify(&self.host, self.port, server_public_key)
            .map(|()| true)
    }
}

/// Authenticated russh session
pub type SshHandle = Handle<ClientHandler>;

/// Production [`Connector`] backed by russh
#[derive(Debug, Clone)]
pub struct RusshConnector {
    keepalive_interval: Duration,
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

impl RusshConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_config(&self) -> Arc<client::Config> {
        Arc::new(client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(self.keepalive_interval),
            keepalive_max: 3,
            ..Default::default()
        })
    }

    fn handler(profile: &ConnectionProfile) -> ClientHandler {
        ClientHandler::new(
            profile.host.clone(),
            profile.port,
            profile.host_key.clone(),
        )
    }

    async fn dial_inner(&self, profile: &ConnectionProfile) -> Result<SshHandle, SshError> {
        let addr = profile.address();

        let socket_addr = tokio::net::lookup_host(addr.as_str())
            .await
            .map_err(|e| SshError::ConnectionFailed(format!("Failed to resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| SshError::ConnectionFailed(format!("No address found for {}", addr)))?;

        info!("Connecting to {} host at {} ({})", profile.role, addr, socket_addr);

        let mut handle = client::connect(self.client_config(), socket_addr, Self::handler(profile))
            .await
            .map_err(|e| handshake_error(&addr, e))?;

        debug!("SSH handshake with {} completed", addr);

        authenticate(&mut handle, profile).await?;
        Ok(handle)
    }

    async fn handshake_inner(
        &self,
        stream: ChannelStream<client::Msg>,
        profile: &ConnectionProfile,
    ) -> Result<SshHandle, SshError> {
        let addr = profile.address();
        info!("Connecting via stream to {} (SSH-over-SSH)", addr);

        let mut handle =
            client::connect_stream(self.client_config(), stream, Self::handler(profile))
                .await
                .map_err(|e| handshake_error(&addr, e))?;

        debug!("SSH handshake via stream with {} completed", addr);

        authenticate(&mut handle, profile).await?;
        Ok(handle)
    }
}

#[async_trait]
impl Connector for RusshConnector {
    type Session = SshHandle;
    type Stream = ChannelStream<client::Msg>;

    async fn dial(&self, profile: &ConnectionProfile) -> Result<SshHandle, SshError> {
        tokio::time::timeout(profile.timeout, self.dial_inner(profile))
            .await
            .map_err(|_| SshError::Timeout(format!("Connection to {} timed out", profile.address())))?
    }

    async fn forward(
        &self,
        via: &SshHandle,
        target: &ConnectionProfile,
    ) -> Result<Self::Stream, SshError> {
        info!("Opening tunnel to {} {}", target.role, target.address());

        let channel = tokio::time::timeout(
            target.timeout,
            via.channel_open_direct_tcpip(target.host.clone(), target.port as u32, "127.0.0.1", 0),
        )
        .await
        .map_err(|_| SshError::Timeout(format!("Tunnel to {} timed out", target.address())))?
        .map_err(|e| SshError::TunnelFailed {
            target: target.address(),
            reason: e.to_string(),
        })?;

        Ok(channel.into_stream())
    }

    async fn handshake(
        &self,
        stream: Self::Stream,
        profile: &ConnectionProfile,
    ) -> Result<SshHandle, SshError> {
        tokio::time::timeout(profile.timeout, self.handshake_inner(stream, profile))
            .await
            .map_err(|_| {
                SshError::Timeout(format!(
                    "Connection to {} via stream timed out",
                    profile.address()
                ))
            })?
    }

    async fn close(&self, session: SshHandle) {
        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!("Disconnect failed (session already gone?): {}", e);
        }
    }
}

/// Keep host key rejections distinct; everything else is a connection failure.
fn handshake_error(addr: &str, err: SshError) -> SshError {
    match err {
        err @ SshError::HostKeyMismatch { .. } => err,
        other => SshError::ConnectionFailed(format!("Failed to connect to {}: {}", addr, other)),
    }
}

/// Hash for an RSA signature given what the server advertised in `server-sig-algs`.
///
/// `None` means the server sent no extension info; assume rsa-sha2-256 then.
fn rsa_signature_hash(advertised: Option<Option<HashAlg>>) -> Option<HashAlg> {
    match advertised {
        Some(negotiated) => negotiated,
        None => Some(HashAlg::Sha256),
    }
}

/// Try each mechanism in order until the server accepts one
async fn authenticate(handle: &mut SshHandle, profile: &ConnectionProfile) -> Result<(), SshError> {
    for mechanism in &profile.auth {
        info!(
            "Authenticating to {} as {} with {}",
            profile.address(),
            profile.username,
            mechanism.name()
        );

        let result = match mechanism {
            AuthMechanism::PublicKey(key) => {
                let hash_alg = if matches!(key.algorithm(), Algorithm::Rsa { .. }) {
                    let advertised = handle.best_supported_rsa_hash().await.map_err(|e| {
                        SshError::ProtocolError(format!("RSA hash negotiation failed: {}", e))
                    })?;
                    rsa_signature_hash(advertised)
                } else {
                    None
                };
                let key_with_hash = PrivateKeyWithHashAlg::new(key.clone(), hash_alg);
                handle
                    .authenticate_publickey(&profile.username, key_with_hash)
                    .await
            }
            AuthMechanism::Password(password) => {
                handle
                    .authenticate_password(&profile.username, password.as_str())
                    .await
            }
        }
        .map_err(|e| SshError::ProtocolError(format!("authentication exchange failed: {}", e)))?;

        if result.success() {
            info!("Authenticated to {} host {}", profile.role, profile.address());
            return Ok(());
        }

        warn!(
            "{} authentication rejected by {}",
            mechanism.name(),
            profile.address()
        );
    }

    Err(SshError::AuthenticationFailed(format!(
        "Authentication to {} rejected",
        profile.address()
    )))
}
