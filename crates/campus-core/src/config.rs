use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// How long before the estimated arrival a reminder becomes due.
pub const DEFAULT_LEAD_WINDOW_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_NOTIFY_ATTEMPTS: u32 = 3;
pub const DEFAULT_NOTIFY_BACKOFF_MS: u64 = 250;
pub const DEFAULT_PUSH_TIMEOUT_MS: u64 = 3_000;

/// Top-level config (campus.toml + CAMPUS_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampusConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub transit: Option<TransitConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Tuning for the bus-arrival reminder engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Seconds before the estimated arrival at which a reminder is due.
    #[serde(default = "default_lead_window_secs")]
    pub lead_window_secs: u64,
    /// Period of the in-process check loop. `0` disables the loop and leaves
    /// triggering entirely to external callers of the check endpoint.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on candidates processed concurrently within one cycle.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Attempts to persist a Notification after a successful claim.
    #[serde(default = "default_notify_attempts")]
    pub notify_attempts: u32,
    /// Linear backoff step between persistence attempts.
    #[serde(default = "default_notify_backoff_ms")]
    pub notify_backoff_ms: u64,
    /// Deadline for a single realtime push.
    #[serde(default = "default_push_timeout_ms")]
    pub push_timeout_ms: u64,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            lead_window_secs: DEFAULT_LEAD_WINDOW_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            notify_attempts: DEFAULT_NOTIFY_ATTEMPTS,
            notify_backoff_ms: DEFAULT_NOTIFY_BACKOFF_MS,
            push_timeout_ms: DEFAULT_PUSH_TIMEOUT_MS,
        }
    }
}

/// Shared secret for the reminder check endpoint.
///
/// When `secret` is unset the endpoint accepts any caller; use that only on
/// trusted networks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub secret: Option<String>,
}

/// Realtime push provider. Both fields are required for pushes to be sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    /// Provider endpoint receiving `{channel, event, data}` JSON bodies.
    pub endpoint: Option<String>,
    /// HMAC-SHA256 signing secret for the request body.
    pub secret: Option<String>,
}

/// External transit API (OAuth2 client credentials).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitConfig {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub city: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_lead_window_secs() -> u64 {
    DEFAULT_LEAD_WINDOW_SECS
}
fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}
fn default_notify_attempts() -> u32 {
    DEFAULT_NOTIFY_ATTEMPTS
}
fn default_notify_backoff_ms() -> u64 {
    DEFAULT_NOTIFY_BACKOFF_MS
}
fn default_push_timeout_ms() -> u64 {
    DEFAULT_PUSH_TIMEOUT_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.campus/campus.db", home)
}

impl CampusConfig {
    /// Load config from a TOML file with CAMPUS_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.campus/campus.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(Toml::file(&path)).extract().map_err(|e| {
            crate::error::CampusError::Config(e.to_string())
        })
    }

    /// Parse config from an in-memory TOML document (no env overrides).
    pub fn from_toml_str(toml: &str) -> crate::error::Result<Self> {
        Figment::from(Serialized::defaults(CampusConfig::default()))
            .merge(Toml::string(toml))
            .extract()
            .map_err(|e| crate::error::CampusError::Config(e.to_string()))
    }

    // Double underscore separates nesting so snake_case keys survive:
    // CAMPUS_REMINDERS__LEAD_WINDOW_SECS -> reminders.lead_window_secs
    fn figment(file: impl figment::Provider) -> Figment {
        Figment::from(Serialized::defaults(CampusConfig::default()))
            .merge(file)
            .merge(Env::prefixed("CAMPUS_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.campus/campus.toml", home)
}
