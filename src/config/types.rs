use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::streaming::bitrate::DEFAULT_FALLBACK_BYTES_PER_SECOND;
use crate::streaming::throttle::{DEFAULT_DELAY_MS_PER_SECOND_JUMP, DEFAULT_MAX_DELAY_MS};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub throttle: ThrottleConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory video resources are served from.
    #[serde(default = "default_video_root")]
    pub video_root: PathBuf,

    /// Optional directory of static assets served for unmatched routes.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Derive the client origin from `X-Forwarded-For` (only behind a proxy
    /// that overwrites it).
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_video_root() -> PathBuf {
    PathBuf::from("./videos")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            video_root: default_video_root(),
            static_dir: None,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleConfig {
    /// Delay charged per second of content skipped forward.
    #[serde(default = "default_delay_ms_per_second_jump")]
    pub delay_ms_per_second_jump: u64,

    /// Upper bound on any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Bitrate assumed for resources without a configured estimate.
    #[serde(default = "default_fallback_bytes_per_second")]
    pub fallback_bytes_per_second: f64,

    /// Per-resource bitrate estimates (resource name -> bytes per second).
    #[serde(default)]
    pub bitrates: HashMap<String, f64>,
}

fn default_delay_ms_per_second_jump() -> u64 {
    DEFAULT_DELAY_MS_PER_SECOND_JUMP
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_fallback_bytes_per_second() -> f64 {
    DEFAULT_FALLBACK_BYTES_PER_SECOND
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            delay_ms_per_second_jump: default_delay_ms_per_second_jump(),
            max_delay_ms: default_max_delay_ms(),
            fallback_bytes_per_second: default_fallback_bytes_per_second(),
            bitrates: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Reject requests that present no credential.
    #[serde(default = "default_auth_required")]
    pub required: bool,

    /// Static API keys accepted for every resource (Authorization: Bearer).
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Secret for resource-scoped signed tokens (generate with
    /// `seekgate generate-secret`).
    #[serde(default)]
    pub signing_secret: Option<String>,
}

fn default_auth_required() -> bool {
    true
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: default_auth_required(),
            api_keys: Vec::new(),
            signing_secret: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionsConfig {
    /// Forget clients idle for this long (unset = keep for process lifetime).
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

fn default_cleanup_interval() -> u64 {
    60
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: None,
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per minute allowed per client (0 = unlimited).
    #[serde(default)]
    pub requests_per_minute: u32,
}
