use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Reseta";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lifetime of a patient self-registration link.
pub const REGISTRATION_TOKEN_TTL_MINUTES: i64 = 15;

/// Lifetime of a doctor bearer session.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Audit entries older than this are pruned at startup.
pub const AUDIT_RETENTION_DAYS: i64 = 365;

/// Front-end route a signed-out doctor is sent to.
pub const SIGN_IN_PATH: &str = "/login";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Get the application data directory
/// ~/Reseta/ on all platforms, falling back to the working directory
/// when no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the SQLite database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("reseta.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "reseta=info,reseta_lib=info,tower_http=info"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address {value:?}: {reason}")]
    InvalidBindAddr { value: String, reason: String },
    #[error("{0} is set but empty")]
    Empty(&'static str),
}

/// Runtime configuration, read from `RESETA_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `RESETA_BIND_ADDR`
    pub bind_addr: SocketAddr,
    /// `RESETA_DATABASE_PATH`
    pub database_path: PathBuf,
    /// `RESETA_IDENTITY_SECRET`. Sign-in is disabled while unset.
    pub identity_secret: Option<String>,
    /// `RESETA_ALLOWED_ORIGIN`. Enables CORS for the browser front-end.
    pub allowed_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database_path: default_database_path(),
            identity_secret: None,
            allowed_origin: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("RESETA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBindAddr {
                value: raw_addr.clone(),
                reason: e.to_string(),
            })?;

        let database_path = lookup("RESETA_DATABASE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let identity_secret = non_empty(&lookup, "RESETA_IDENTITY_SECRET")?;
        let allowed_origin = non_empty(&lookup, "RESETA_ALLOWED_ORIGIN")?;

        Ok(Self {
            bind_addr,
            database_path,
            identity_secret,
            allowed_origin,
        })
    }
}

fn non_empty<F>(lookup: &F, key: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Err(ConfigError::Empty(key)),
        Some(v) => Ok(Some(v.trim().to_string())),
    }
}
