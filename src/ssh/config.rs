//! SSH connection profiles

use std::time::Duration;

use super::auth::{build_auth_methods, AuthMechanism};
use super::host_key::HostKeyPolicy;
use crate::config::{EndpointRole, EndpointSettings};
use crate::error::ActionError;

/// Everything needed to dial and authenticate one hop
#[derive(Debug, Clone)]
pub struct ConnectionProfile {
    pub role: EndpointRole,

    /// Remote host address
    pub host: String,

    /// SSH port
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Authentication mechanisms, tried in order (never empty)
    pub auth: Vec<AuthMechanism>,

    /// Host key verification policy
    pub host_key: HostKeyPolicy,

    /// Connect + handshake + authentication timeout
    pub timeout: Duration,
}

impl ConnectionProfile {
    /// Build a profile from endpoint settings.
    ///
    /// Fails on an empty pinned fingerprint or when no credential resolves.
    pub fn from_endpoint(
        endpoint: &EndpointSettings,
        timeout: Duration,
    ) -> Result<Self, ActionError> {
        let host_key = HostKeyPolicy::from_endpoint(endpoint)?;

        let auth = build_auth_methods(&endpoint.key, &endpoint.passphrase, &endpoint.password)
            .map_err(|source| ActionError::Authentication {
                role: endpoint.role,
                source,
            })?;

        Ok(Self {
            role: endpoint.role,
            host: endpoint.host.clone(),
            port: endpoint.port,
            username: endpoint.username.clone(),
            auth,
            host_key,
            timeout,
        })
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ssh::auth::AuthError;
    use zeroize::Zeroizing;

    const PLAIN_KEY: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/id_ed25519"
    ));

    pub(crate) fn endpoint(role: EndpointRole, host: &str) -> EndpointSettings {
        EndpointSettings {
            role,
            host: host.to_string(),
            port: 22,
            username: "deploy".to_string(),
            key: Zeroizing::new(PLAIN_KEY.to_string()),
            passphrase: Zeroizing::new(String::new()),
            password: Zeroizing::new(String::new()),
            fingerprint: "SHA256:pinned".to_string(),
            insecure_ignore_fingerprint: false,
        }
    }

    /// Profile with a password mechanism, for tests that never authenticate
    pub(crate) fn profile(role: EndpointRole, host: &str, port: u16) -> ConnectionProfile {
        ConnectionProfile {
            role,
            host: host.to_string(),
            port,
            username: "deploy".to_string(),
            auth: vec![AuthMechanism::Password(Zeroizing::new("pw".to_string()))],
            host_key: HostKeyPolicy::InsecureSkip,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_profile_from_endpoint() {
        let profile = ConnectionProfile::from_endpoint(
            &endpoint(EndpointRole::Target, "example.com"),
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(profile.address(), "example.com:22");
        assert_eq!(profile.username, "deploy");
        assert_eq!(profile.auth.len(), 1);
        assert_eq!(
            profile.host_key,
            HostKeyPolicy::Strict {
                expected: "SHA256:pinned".to_string()
            }
        );
        assert_eq!(profile.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_insecure_flag_selects_skip() {
        let mut settings = endpoint(EndpointRole::Proxy, "bastion");
        settings.fingerprint.clear();
        settings.insecure_ignore_fingerprint = true;

        let profile = ConnectionProfile::from_endpoint(&settings, Duration::from_secs(1)).unwrap();
        assert_eq!(profile.host_key, HostKeyPolicy::InsecureSkip);
    }

    #[test]
    fn test_empty_fingerprint_fails_before_auth() {
        let mut settings = endpoint(EndpointRole::Target, "example.com");
        settings.fingerprint.clear();
        settings.key = Zeroizing::new(String::new());

        let err = ConnectionProfile::from_endpoint(&settings, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ActionError::Configuration(_)));
    }

    #[test]
    fn test_missing_credentials() {
        let mut settings = endpoint(EndpointRole::Proxy, "bastion");
        settings.key = Zeroizing::new(String::new());

        let err = ConnectionProfile::from_endpoint(&settings, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(
            err,
            ActionError::Authentication {
                role: EndpointRole::Proxy,
                source: AuthError::MissingCredentials,
            }
        ));
    }
}
