//! Host key verification against a pinned fingerprint
//!
//! The expected fingerprint is the OpenSSH `SHA256:` form printed by
//! `ssh-keygen -lf`, compared as an exact string.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use russh::keys::{PublicKey, PublicKeyBase64};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::error::SshError;
use crate::config::{ConfigError, EndpointRole, EndpointSettings};

/// How a server's host key is checked during the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept only the key whose fingerprint equals `expected`
    Strict { expected: String },
    /// Accept any key. Every use is logged as a warning.
    InsecureSkip,
}

impl HostKeyPolicy {
    /// Pin a fingerprint. An empty fingerprint is refused rather than matched.
    pub fn strict(
        expected: impl Into<String>,
        role: EndpointRole,
    ) -> Result<Self, ConfigError> {
        let expected = expected.into();
        if expected.trim().is_empty() {
            return Err(ConfigError::EmptyFingerprint { role });
        }
        Ok(HostKeyPolicy::Strict { expected })
    }

    /// Pick the policy for an endpoint. Skipping only happens when the
    /// dedicated insecure flag is set.
    pub fn from_endpoint(endpoint: &EndpointSettings) -> Result<Self, ConfigError> {
        if endpoint.insecure_ignore_fingerprint {
            Ok(HostKeyPolicy::InsecureSkip)
        } else {
            Self::strict(endpoint.fingerprint.clone(), endpoint.role)
        }
    }

    /// Verify a presented host key
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> Result<(), SshError> {
        self.verify_fingerprint(host, port, &fingerprint(key))
    }

    /// Verify an already computed fingerprint
    pub fn verify_fingerprint(&self, host: &str, port: u16, actual: &str) -> Result<(), SshError> {
        match self {
            HostKeyPolicy::Strict { expected } => {
                if actual == expected {
                    info!("Host key verified for {}:{} ({})", host, port, actual);
                    Ok(())
                } else {
                    warn!(
                        "Host key mismatch for {}:{}! Expected {}, got {}",
                        host, port, expected, actual
                    );
                    Err(SshError::HostKeyMismatch {
                        host: format!("{}:{}", host, port),
                        expected: expected.clone(),
                        actual: actual.to_string(),
                    })
                }
            }
            HostKeyPolicy::InsecureSkip => {
                warn!(
                    "Host key verification DISABLED for {}:{}; accepting {} without checking. \
                     The connection is open to man-in-the-middle attacks.",
                    host, port, actual
                );
                Ok(())
            }
        }
    }
}

/// Compute SHA256 fingerprint of public key
pub fn fingerprint(key: &PublicKey) -> String {
    let fp = fingerprint_of_blob(&key.public_key_bytes());
    debug!("Computed host key fingerprint {}", fp);
    fp
}

/// Fingerprint of a wire-format public key blob
pub fn fingerprint_of_blob(blob: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(blob);
    let hash = hasher.finalize();
    format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const FIXTURE_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/id_ed25519"
    ));
    // ssh-keygen -lf tests/fixtures/id_ed25519.pub
    const FIXTURE_FINGERPRINT: &str = "SHA256:uvxAp6A1Bg6vUv4GSCBmld28Se5+l6AgQSCeGLG/ATA";

    fn fixture_public_key() -> PublicKey {
        russh::keys::decode_secret_key(FIXTURE_KEY, None)
            .unwrap()
            .public_key()
            .clone()
    }

    #[test]
    fn test_fingerprint_matches_ssh_keygen() {
        assert_eq!(fingerprint(&fixture_public_key()), FIXTURE_FINGERPRINT);
    }

    #[test]
    fn test_fingerprint_of_empty_blob() {
        assert_eq!(
            fingerprint_of_blob(&[]),
            "SHA256:47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU"
        );
    }

    #[test]
    fn test_strict_accepts_exact_match() {
        let policy = HostKeyPolicy::strict(FIXTURE_FINGERPRINT, EndpointRole::Target).unwrap();
        assert!(policy
            .verify("example.com", 22, &fixture_public_key())
            .is_ok());
    }

    #[test]
    fn test_strict_rejects_mismatch() {
        let policy = HostKeyPolicy::strict("SHA256:AAA", EndpointRole::Target).unwrap();
        let err = policy
            .verify_fingerprint("example.com", 22, "SHA256:BBB")
            .unwrap_err();

        assert!(err.is_host_key_rejection());
        assert!(err.to_string().contains("SHA256:BBB"));
    }

    #[test]
    fn test_strict_requires_prefix() {
        let bare = FIXTURE_FINGERPRINT.trim_start_matches("SHA256:");
        let policy = HostKeyPolicy::strict(bare, EndpointRole::Target).unwrap();
        assert!(policy
            .verify("example.com", 22, &fixture_public_key())
            .is_err());
    }

    #[test]
    fn test_empty_expected_fingerprint_is_refused() {
        assert_eq!(
            HostKeyPolicy::strict("", EndpointRole::Proxy).unwrap_err(),
            ConfigError::EmptyFingerprint {
                role: EndpointRole::Proxy
            }
        );
        assert!(HostKeyPolicy::strict("   ", EndpointRole::Target).is_err());
    }

    #[traced_test]
    #[test]
    fn test_insecure_skip_accepts_and_warns() {
        let policy = HostKeyPolicy::InsecureSkip;
        assert!(policy
            .verify_fingerprint("example.com", 22, "SHA256:anything")
            .is_ok());
        assert!(policy
            .verify("example.com", 22, &fixture_public_key())
            .is_ok());
        assert!(logs_contain("Host key verification DISABLED"));
    }
}
