//! Action configuration
//!
//! All inputs are read once at startup into an immutable [`Settings`] value. Nothing
//! else in the crate looks at the process environment.

mod duration;

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

pub use duration::parse_duration;

/// Default SSH port used when PORT / PROXY_PORT is empty
pub const DEFAULT_PORT: u16 = 22;

/// Configuration errors, all detected before any network activity
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse direction: {0:?} (must be either upload or download)")]
    InvalidDirection(String),

    #[error("Failed to parse {setting}: {reason}")]
    InvalidDuration {
        setting: &'static str,
        reason: String,
    },

    #[error("{setting} must be greater than zero")]
    ZeroDuration { setting: &'static str },

    #[error("{setting} must not be empty")]
    Missing { setting: &'static str },

    #[error("Failed to parse {setting}: {value:?} is not a valid port")]
    InvalidPort { setting: &'static str, value: String },

    #[error("Failed to parse {setting}: {value:?} (expected \"true\" or \"false\")")]
    InvalidFlag { setting: &'static str, value: String },

    #[error("SOURCE must list at least one path")]
    NoSources,

    #[error("{role} host fingerprint must not be empty (set the fingerprint or explicitly disable verification)")]
    EmptyFingerprint { role: EndpointRole },
}

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local files to the remote target
    Upload,
    /// Remote files to the local target
    Download,
}

impl Direction {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "upload" => Ok(Direction::Upload),
            "download" => Ok(Direction::Download),
            other => Err(ConfigError::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => f.write_str("upload"),
            Direction::Download => f.write_str("download"),
        }
    }
}

/// Which hop an endpoint describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Target,
    Proxy,
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRole::Target => f.write_str("target"),
            EndpointRole::Proxy => f.write_str("proxy"),
        }
    }
}

/// Setting names for one endpoint
struct EndpointKeys {
    host: &'static str,
    port: &'static str,
    username: &'static str,
    key: &'static str,
    passphrase: &'static str,
    password: &'static str,
    fingerprint: &'static str,
    ignore_fingerprint: &'static str,
}

const TARGET_KEYS: EndpointKeys = EndpointKeys {
    host: "HOST",
    port: "PORT",
    username: "USERNAME",
    key: "KEY",
    passphrase: "PASSPHRASE",
    password: "INSECURE_PASSWORD",
    fingerprint: "FINGERPRINT",
    ignore_fingerprint: "INSECURE_IGNORE_FINGERPRINT",
};

const PROXY_KEYS: EndpointKeys = EndpointKeys {
    host: "PROXY_HOST",
    port: "PROXY_PORT",
    username: "PROXY_USERNAME",
    key: "PROXY_KEY",
    passphrase: "PROXY_PASSPHRASE",
    password: "INSECURE_PROXY_PASSWORD",
    fingerprint: "PROXY_FINGERPRINT",
    ignore_fingerprint: "INSECURE_PROXY_IGNORE_FINGERPRINT",
};

/// Connection settings for one hop (target or proxy)
#[derive(Clone)]
pub struct EndpointSettings {
    pub role: EndpointRole,
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Private key material, or a path to it
    pub key: Zeroizing<String>,
    pub passphrase: Zeroizing<String>,
    pub password: Zeroizing<String>,
    pub fingerprint: String,
    pub insecure_ignore_fingerprint: bool,
}

impl fmt::Debug for EndpointSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSettings")
            .field("role", &self.role)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("key", &redacted(&self.key))
            .field("passphrase", &redacted(&self.passphrase))
            .field("password", &redacted(&self.password))
            .field("fingerprint", &self.fingerprint)
            .field("insecure_ignore_fingerprint", &self.insecure_ignore_fingerprint)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

impl EndpointSettings {
    /// `host:port` form used in log lines
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Complete, validated action configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub direction: Direction,
    /// Overall deadline for connect + transfer
    pub action_timeout: Duration,
    /// Per-dial timeout for the target and proxy connections
    pub timeout: Duration,
    pub target: EndpointSettings,
    pub proxy: Option<EndpointSettings>,
    /// Ordered source paths
    pub sources: Vec<String>,
    /// Destination file (one source) or directory (several sources)
    pub target_path: String,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary lookup, e.g. a map in tests
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).unwrap_or_default();

        let direction = Direction::parse(get("DIRECTION").trim())?;
        let action_timeout = duration_setting("ACTION_TIMEOUT", &get("ACTION_TIMEOUT"))?;
        let timeout = duration_setting("TIMEOUT", &get("TIMEOUT"))?;

        let target = endpoint(EndpointRole::Target, &TARGET_KEYS, &get)?;

        let proxy = if get(PROXY_KEYS.host).trim().is_empty() {
            None
        } else {
            Some(endpoint(EndpointRole::Proxy, &PROXY_KEYS, &get)?)
        };

        let sources = parse_sources(&get("SOURCE"))?;

        let target_path = get("TARGET").trim().to_string();
        if target_path.is_empty() {
            return Err(ConfigError::Missing { setting: "TARGET" });
        }

        Ok(Self {
            direction,
            action_timeout,
            timeout,
            target,
            proxy,
            sources,
            target_path,
        })
    }
}

fn duration_setting(setting: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let duration =
        parse_duration(value).map_err(|reason| ConfigError::InvalidDuration { setting, reason })?;
    if duration.is_zero() {
        return Err(ConfigError::ZeroDuration { setting });
    }
    Ok(duration)
}

fn endpoint(
    role: EndpointRole,
    keys: &EndpointKeys,
    get: &dyn Fn(&str) -> String,
) -> Result<EndpointSettings, ConfigError> {
    let host = get(keys.host).trim().to_string();
    if host.is_empty() {
        return Err(ConfigError::Missing { setting: keys.host });
    }

    let port = parse_port(keys.port, &get(keys.port))?;

    let username = get(keys.username).trim().to_string();
    if username.is_empty() {
        return Err(ConfigError::Missing {
            setting: keys.username,
        });
    }

    Ok(EndpointSettings {
        role,
        host,
        port,
        username,
        key: Zeroizing::new(get(keys.key)),
        passphrase: Zeroizing::new(get(keys.passphrase)),
        password: Zeroizing::new(get(keys.password)),
        fingerprint: get(keys.fingerprint).trim().to_string(),
        insecure_ignore_fingerprint: parse_flag(
            keys.ignore_fingerprint,
            &get(keys.ignore_fingerprint),
        )?,
    })
}

fn parse_port(setting: &'static str, value: &str) -> Result<u16, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(DEFAULT_PORT);
    }
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort {
            setting,
            value: value.to_string(),
        }),
    }
}

/// Only the exact strings `true` and `false` are flags; empty means `false`.
fn parse_flag(setting: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "" | "false" => Ok(false),
        "true" => Ok(true),
        other => Err(ConfigError::InvalidFlag {
            setting,
            value: other.to_string(),
        }),
    }
}

/// Split SOURCE into ordered paths, dropping blank lines
pub fn parse_sources(value: &str) -> Result<Vec<String>, ConfigError> {
    let sources: Vec<String> = value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if sources.is_empty() {
        return Err(ConfigError::NoSources);
    }
    Ok(sources)
}
