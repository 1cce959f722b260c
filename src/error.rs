//! Action error taxonomy
//!
//! Each pipeline stage reports its own error type; [`ActionError`] names the stage
//! so that the single fatal log line in `main` says where the run stopped.

use thiserror::Error;

use crate::config::{ConfigError, EndpointRole};
use crate::deadline::DeadlineExceeded;
use crate::ssh::{AuthError, SshError};
use crate::transfer::TransferError;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Authentication error ({role}): {source}")]
    Authentication {
        role: EndpointRole,
        #[source]
        source: AuthError,
    },

    #[error("Host verification error ({role}): {source}")]
    Verification {
        role: EndpointRole,
        #[source]
        source: SshError,
    },

    #[error("Connection error ({role}): {source}")]
    Connectivity {
        role: EndpointRole,
        #[source]
        source: SshError,
    },

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("{0}")]
    Deadline(#[from] DeadlineExceeded),
}

impl ActionError {
    /// Classify a transport error raised while reaching `role`
    pub fn from_ssh(role: EndpointRole, err: SshError) -> Self {
        match err {
            err @ SshError::HostKeyMismatch { .. } => ActionError::Verification { role, source: err },
            SshError::AuthenticationFailed(reason) => ActionError::Authentication {
                role,
                source: AuthError::Rejected(reason),
            },
            other => ActionError::Connectivity {
                role,
                source: other,
            },
        }
    }

    /// Short stage name for logs
    pub fn stage(&self) -> &'static str {
        match self {
            ActionError::Configuration(_) => "configuration",
            ActionError::Authentication { .. } => "authentication",
            ActionError::Verification { .. } => "verification",
            ActionError::Connectivity { .. } => "connection",
            ActionError::Transfer(_) => "transfer",
            ActionError::Deadline(_) => "deadline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_key_mismatch_is_verification() {
        let err = ActionError::from_ssh(
            EndpointRole::Target,
            SshError::HostKeyMismatch {
                host: "example.com:22".into(),
                expected: "SHA256:AAA".into(),
                actual: "SHA256:BBB".into(),
            },
        );
        assert_eq!(err.stage(), "verification");
        assert!(err.to_string().contains("target"));
        assert!(err.to_string().contains("SHA256:BBB"));
    }

    #[test]
    fn test_rejected_auth_is_authentication() {
        let err = ActionError::from_ssh(
            EndpointRole::Proxy,
            SshError::AuthenticationFailed("no more methods".into()),
        );
        assert!(matches!(
            err,
            ActionError::Authentication {
                role: EndpointRole::Proxy,
                source: AuthError::Rejected(_),
            }
        ));
    }

    #[test]
    fn test_other_errors_are_connectivity() {
        let err = ActionError::from_ssh(
            EndpointRole::Target,
            SshError::Timeout("Connection to example.com:22 timed out".into()),
        );
        assert_eq!(err.stage(), "connection");
    }
}
