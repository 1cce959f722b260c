//! ProxyJump transport construction
//!
//! Builds the session to the target either directly or through one jump host:
//!
//! ```text
//! Client --SSH--> [Proxy] --direct-tcpip--> [Target]
//!    \__________________SSH over the channel_____^
//! ```
//!
//! The proxy session carries the target's byte stream, so it must stay open for
//! as long as the target session does and is always released after it.

use async_trait::async_trait;
use tracing::{debug, info};

use super::config::ConnectionProfile;
use super::error::SshError;
use crate::config::EndpointRole;
use crate::error::ActionError;

/// The transport operations the builder needs from an SSH implementation
#[async_trait]
pub trait Connector: Send + Sync {
    /// An authenticated session
    type Session: Send + Sync;
    /// A byte stream forwarded through a session
    type Stream: Send;

    /// Dial, verify and authenticate a host directly
    async fn dial(&self, profile: &ConnectionProfile) -> Result<Self::Session, SshError>;

    /// Open a TCP stream from `via` to the host described by `target`
    async fn forward(
        &self,
        via: &Self::Session,
        target: &ConnectionProfile,
    ) -> Result<Self::Stream, SshError>;

    /// Verify and authenticate a host over an already open stream
    async fn handshake(
        &self,
        stream: Self::Stream,
        profile: &ConnectionProfile,
    ) -> Result<Self::Session, SshError>;

    /// Release a session
    async fn close(&self, session: Self::Session);
}

/// Sessions owned by one run.
///
/// Field order matters: `target` is declared first so an abnormal drop also
/// releases it before the proxy that carries it.
pub struct Transport<S> {
    target: S,
    proxy: Option<S>,
}

impl<S> Transport<S> {
    /// The session file copies run on
    pub fn session(&self) -> &S {
        &self.target
    }

    /// Whether the target is tunnelled through a proxy
    pub fn is_proxied(&self) -> bool {
        self.proxy.is_some()
    }

    /// Close the target session, then the proxy session
    pub async fn close<C>(self, connector: &C)
    where
        C: Connector<Session = S>,
    {
        let Transport { target, proxy } = self;

        debug!("Closing target session");
        connector.close(target).await;

        if let Some(proxy) = proxy {
            debug!("Closing proxy session");
            connector.close(proxy).await;
        }
    }
}

/// Connect to the target, through `proxy` when given.
///
/// The proxy is fully authenticated before the target handshake starts. If any
/// later step fails the proxy session is closed before the error is returned.
pub async fn connect<C: Connector>(
    connector: &C,
    target: &ConnectionProfile,
    proxy: Option<&ConnectionProfile>,
) -> Result<Transport<C::Session>, ActionError> {
    let Some(proxy) = proxy else {
        info!(
            "Connecting directly to {}@{}",
            target.username,
            target.address()
        );
        let session = connector
            .dial(target)
            .await
            .map_err(|e| ActionError::from_ssh(EndpointRole::Target, e))?;

        return Ok(Transport {
            target: session,
            proxy: None,
        });
    };

    info!(
        "Connecting to {}@{} via jump host {}@{}",
        target.username,
        target.address(),
        proxy.username,
        proxy.address()
    );

    let proxy_session = connector
        .dial(proxy)
        .await
        .map_err(|e| ActionError::from_ssh(EndpointRole::Proxy, e))?;

    let stream = match connector.forward(&proxy_session, target).await {
        Ok(stream) => stream,
        Err(e) => {
            connector.close(proxy_session).await;
            return Err(ActionError::from_ssh(EndpointRole::Target, e));
        }
    };

    let target_session = match connector.handshake(stream, target).await {
        Ok(session) => session,
        Err(e) => {
            connector.close(proxy_session).await;
            return Err(ActionError::from_ssh(EndpointRole::Target, e));
        }
    };

    info!("Target connection established through {}", proxy.address());

    Ok(Transport {
        target: target_session,
        proxy: Some(proxy_session),
    })
}
