use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use uuid::Uuid;
use zeroize::Zeroizing;

use crate::notify::RetryPolicy;

/// Application-level constants
pub const APP_NAME: &str = "OptiDoc";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);
pub const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_EMAIL_FROM: &str = "no-reply@optidoc.local";
pub const DEFAULT_EMAIL_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EMAIL_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_EMAIL_BACKOFF_SECS: u64 = 30;
pub const DEFAULT_EMAIL_POLL_SECS: u64 = 15;

/// Per-user data directory, `OptiDoc/` under the platform data dir.
/// Falls back to the working directory when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("optidoc.db")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "optidoc=info,optidoc_lib=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("Bootstrap admin needs OPTIDOC_BOOTSTRAP_ADMIN_NAME, _EMAIL and _PASSWORD together")]
    IncompleteBootstrapAdmin,
}

/// Outgoing email settings.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    /// Provider endpoint; `None` logs emails instead of sending them.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub poll_secs: u64,
}

impl EmailSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_backoff: Duration::from_secs(self.backoff_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
}

/// First admin account, created when the admins table is empty.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub name: String,
    pub email: String,
    pub password: Zeroizing<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    /// Admins notified of patient and doctor actions. Empty: every admin.
    pub admin_recipients: Vec<Uuid>,
    pub session_ttl: Duration,
    pub email: EmailSettings,
    pub cors_origins: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    /// Read `OPTIDOC_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr: SocketAddr =
            parse_or("OPTIDOC_BIND_ADDR", get("OPTIDOC_BIND_ADDR"), DEFAULT_BIND_ADDR)?;
        let database_path = get("OPTIDOC_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let admin_recipients = split_list(get("OPTIDOC_ADMIN_RECIPIENTS"))
            .into_iter()
            .map(|raw| {
                Uuid::parse_str(&raw).map_err(|e| ConfigError::Invalid {
                    key: "OPTIDOC_ADMIN_RECIPIENTS",
                    value: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let session_ttl_secs: u64 = parse_or(
            "OPTIDOC_SESSION_TTL_SECS",
            get("OPTIDOC_SESSION_TTL_SECS"),
            DEFAULT_SESSION_TTL_SECS,
        )?;

        let email = EmailSettings {
            endpoint: get("OPTIDOC_EMAIL_ENDPOINT"),
            api_key: get("OPTIDOC_EMAIL_API_KEY"),
            from: get("OPTIDOC_EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            timeout_secs: parse_or(
                "OPTIDOC_EMAIL_TIMEOUT_SECS",
                get("OPTIDOC_EMAIL_TIMEOUT_SECS"),
                DEFAULT_EMAIL_TIMEOUT_SECS,
            )?,
            max_attempts: parse_or(
                "OPTIDOC_EMAIL_MAX_ATTEMPTS",
                get("OPTIDOC_EMAIL_MAX_ATTEMPTS"),
                DEFAULT_EMAIL_MAX_ATTEMPTS,
            )?,
            backoff_secs: parse_or(
                "OPTIDOC_EMAIL_BACKOFF_SECS",
                get("OPTIDOC_EMAIL_BACKOFF_SECS"),
                DEFAULT_EMAIL_BACKOFF_SECS,
            )?,
            poll_secs: parse_or(
                "OPTIDOC_EMAIL_POLL_SECS",
                get("OPTIDOC_EMAIL_POLL_SECS"),
                DEFAULT_EMAIL_POLL_SECS,
            )?,
        };
        if email.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "OPTIDOC_EMAIL_MAX_ATTEMPTS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        let bootstrap_admin = match (
            get("OPTIDOC_BOOTSTRAP_ADMIN_NAME"),
            get("OPTIDOC_BOOTSTRAP_ADMIN_EMAIL"),
            get("OPTIDOC_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (None, None, None) => None,
            (Some(name), Some(email), Some(password)) => Some(BootstrapAdmin {
                name,
                email,
                password: Zeroizing::new(password),
            }),
            _ => return Err(ConfigError::IncompleteBootstrapAdmin),
        };

        Ok(Self {
            bind_addr,
            database_path,
            admin_recipients,
            session_ttl: Duration::from_secs(session_ttl_secs),
            email,
            cors_origins: split_list(get("OPTIDOC_CORS_ORIGINS")),
            bootstrap_admin,
        })
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
