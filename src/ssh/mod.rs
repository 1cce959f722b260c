//! SSH module - builds authenticated, identity-verified sessions
//!
//! This module provides the transport side of the action using the russh library.
//!
//! # Features
//! - Direct SSH connections
//! - ProxyJump through a single jump host (SSH-over-SSH via `direct-tcpip`)
//! - Host key pinning by SHA256 fingerprint, with an explicit insecure bypass
//! - Public key (optionally passphrase protected) or password authentication

mod auth;
mod client;
mod config;
mod error;
pub mod host_key;
mod proxy;

pub use auth::{build_auth_methods, AuthError, AuthMechanism};
pub use client::{ClientHandler, RusshConnector, SshHandle};
pub use config::ConnectionProfile;
pub use error::SshError;
pub use host_key::{fingerprint, HostKeyPolicy};
pub use proxy::{connect, Connector, Transport};
