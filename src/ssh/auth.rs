//! SSH Authentication
//!
//! Turns the configured credentials into an ordered list of mechanisms:
//! - Private key (OpenSSH or PEM), optionally protected by a passphrase
//! - Password, only when no key is given

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use russh::keys::PrivateKey;
use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Errors that can occur while resolving credentials
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credentials: provide a private key or a password")]
    MissingCredentials,

    #[error("Failed to read key file {path}: {source}")]
    KeyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse private key: {0}")]
    KeyParse(String),

    #[error("Failed to parse passphrase protected private key: {0}")]
    ProtectedKeyParse(String),

    #[error("server rejected authentication: {0}")]
    Rejected(String),
}

/// One way of proving identity to a server
#[derive(Clone)]
pub enum AuthMechanism {
    /// Public key authentication
    PublicKey(Arc<PrivateKey>),
    /// Password authentication (discouraged)
    Password(Zeroizing<String>),
}

impl AuthMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMechanism::PublicKey(_) => "publickey",
            AuthMechanism::Password(_) => "password",
        }
    }
}

impl fmt::Debug for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMechanism::PublicKey(key) => f
                .debug_tuple("PublicKey")
                .field(&key.algorithm().to_string())
                .finish(),
            AuthMechanism::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
        }
    }
}

/// Build the mechanisms for one endpoint.
///
/// A key always wins over a password. Key parse failures are returned, never
/// retried with another mechanism.
pub fn build_auth_methods(
    key: &str,
    passphrase: &str,
    password: &str,
) -> Result<Vec<AuthMechanism>, AuthError> {
    if !key.trim().is_empty() {
        let material = resolve_key_material(key)?;
        let private_key = if passphrase.is_empty() {
            debug!("Parsing unprotected private key");
            russh::keys::decode_secret_key(&material, None)
                .map_err(|e| AuthError::KeyParse(e.to_string()))?
        } else {
            debug!("Parsing passphrase protected private key");
            russh::keys::decode_secret_key(&material, Some(passphrase))
                .map_err(|e| AuthError::ProtectedKeyParse(e.to_string()))?
        };

        info!("Loaded {} private key", private_key.algorithm());
        return Ok(vec![AuthMechanism::PublicKey(Arc::new(private_key))]);
    }

    if !password.is_empty() {
        warn!(
            "Using password authentication. Passwords are weaker than keys; \
             configure a private key instead."
        );
        return Ok(vec![AuthMechanism::Password(Zeroizing::new(
            password.to_string(),
        ))]);
    }

    Err(AuthError::MissingCredentials)
}

/// KEY holds either the key itself or a path to it
fn resolve_key_material(key: &str) -> Result<Zeroizing<String>, AuthError> {
    if key.contains("-----BEGIN") {
        return Ok(Zeroizing::new(key.to_string()));
    }

    let path = expand_tilde(Path::new(key.trim()));
    debug!("Loading key from: {:?}", path);
    std::fs::read_to_string(&path)
        .map(Zeroizing::new)
        .map_err(|source| AuthError::KeyRead { path, source })
}

/// Expand ~ to home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    path.to_path_buf()
}
