//! Service configuration from `ZMETA_`-prefixed environment variables.
//!
//! Every value has a default; anything present but malformed is a fatal
//! [`ConfigError`].  A retention of zero or less is rejected rather than
//! silently disabling pruning — unset or empty disables it.

use std::path::PathBuf;
use std::time::Duration;

pub const APP_TITLE: &str = "ZMeta Backend";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub udp_host: String,
    pub udp_port: u16,
    pub udp_queue_max: usize,
    pub http_bind: String,
    pub ui_base_url: String,
    pub ws_greeting: String,
    /// CORS allow-list.  Unset means `["*"]`; a variable set to the empty
    /// string means an empty allow-list, not wildcard.
    pub allowed_origins: Vec<String>,
    pub auth_header: String,
    /// Empty disables authentication.
    pub shared_secret: String,
    pub environment: String,
    pub ws_queue_max: usize,
    pub record_dir: PathBuf,
    pub rules_path: PathBuf,
    /// `ZMETA_RECORDER_RETENTION_HOURS`; `None` disables pruning.
    pub retention: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup, so tests never touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Config {
            udp_host: lookup("ZMETA_UDP_HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            udp_port: parse(&lookup, "ZMETA_UDP_PORT", 5005)?,
            udp_queue_max: parse(&lookup, "ZMETA_UDP_QUEUE_MAX", 4096)?,
            http_bind: lookup("ZMETA_HTTP_BIND").unwrap_or_else(|| "0.0.0.0:8000".to_owned()),
            ui_base_url: lookup("ZMETA_UI_BASE_URL")
                .unwrap_or_else(|| "http://127.0.0.1:8000".to_owned()),
            ws_greeting: lookup("ZMETA_WS_GREETING")
                .unwrap_or_else(|| "Connected to ZMeta WebSocket".to_owned()),
            allowed_origins: parse_csv(lookup("ZMETA_CORS_ORIGINS")),
            auth_header: lookup("ZMETA_AUTH_HEADER").unwrap_or_else(|| "x-zmeta-secret".to_owned()),
            shared_secret: lookup("ZMETA_SHARED_SECRET").unwrap_or_default().trim().to_owned(),
            environment: lookup("ZMETA_ENV").unwrap_or_else(|| "dev".to_owned()),
            ws_queue_max: parse(&lookup, "ZMETA_WS_QUEUE", 64)?,
            record_dir: lookup("ZMETA_RECORD_DIR")
                .map_or_else(|| PathBuf::from("data/records"), PathBuf::from),
            rules_path: lookup("ZMETA_RULES_PATH")
                .map_or_else(|| PathBuf::from("config/rules.yaml"), PathBuf::from),
            retention: parse_retention(lookup("ZMETA_RECORDER_RETENTION_HOURS"))?,
        })
    }

    pub fn auth_enabled(&self) -> bool {
        !self.shared_secret.is_empty()
    }

    /// True when auth is disabled or the provided secret matches.
    pub fn verify_shared_secret(&self, provided: Option<&str>) -> bool {
        if !self.auth_enabled() {
            return true;
        }
        provided == Some(self.shared_secret.as_str())
    }

    pub fn ui_url(&self, path: &str) -> String {
        format!("{}{}", self.ui_base_url.trim_end_matches('/'), path)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e| ConfigError::Invalid {
            name,
            reason: format!("{e} ({raw:?})"),
        }),
    }
}

/// Unset → wildcard default; set-but-empty → empty allow-list.
fn parse_csv(raw: Option<String>) -> Vec<String> {
    match raw {
        None => vec!["*".to_owned()],
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
    }
}

fn parse_retention(raw: Option<String>) -> Result<Option<Duration>, ConfigError> {
    const NAME: &str = "ZMETA_RECORDER_RETENTION_HOURS";
    let Some(raw) = raw else { return Ok(None) };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let hours: f64 = raw.parse().map_err(|e| ConfigError::Invalid {
        name: NAME,
        reason: format!("{e} ({raw:?})"),
    })?;
    if hours <= 0.0 || !hours.is_finite() {
        return Err(ConfigError::Invalid {
            name: NAME,
            reason: format!("must be a positive number of hours, got {raw:?}"),
        });
    }
    Ok(Some(Duration::from_secs_f64(hours * 3600.0)))
}
