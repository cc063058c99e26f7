mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./seekgate.toml",
        "./config.toml",
        "~/.config/seekgate/config.toml",
        "/etc/seekgate/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Load config (file or defaults), then apply environment overrides.
pub fn load_effective_config(custom_path: Option<&Path>) -> Result<Config> {
    let mut config = load_config_or_default(custom_path)?;
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Apply overrides from the process environment.
///
/// Recognised variables: `PORT`, `VIDEO_ROOT`, `DELAY_MS_PER_SECOND_JUMP`,
/// `MAX_DELAY_MS`, `AUTH_REQUIRED`, `SIGNING_SECRET`.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary lookup (the environment in production).
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        config.server.port = parse_var("PORT", &port)?;
    }
    if let Some(root) = lookup("VIDEO_ROOT") {
        config.server.video_root = PathBuf::from(shellexpand::tilde(&root).as_ref());
    }
    if let Some(delay) = lookup("DELAY_MS_PER_SECOND_JUMP") {
        config.throttle.delay_ms_per_second_jump = parse_var("DELAY_MS_PER_SECOND_JUMP", &delay)?;
    }
    if let Some(max) = lookup("MAX_DELAY_MS") {
        config.throttle.max_delay_ms = parse_var("MAX_DELAY_MS", &max)?;
    }
    if let Some(required) = lookup("AUTH_REQUIRED") {
        config.auth.required = parse_bool("AUTH_REQUIRED", &required)?;
    }
    if let Some(secret) = lookup("SIGNING_SECRET") {
        config.auth.signing_secret = Some(secret).filter(|s| !s.is_empty());
    }
    Ok(())
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {name}: {value:?}"))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("Invalid value for {name}: {value:?} (expected true/false)"),
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate server config
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if !config.server.video_root.exists() {
        tracing::warn!("Video root does not exist: {:?}", config.server.video_root);
    }

    // Validate throttle config
    let fallback = config.throttle.fallback_bytes_per_second;
    if !fallback.is_finite() || fallback <= 0.0 {
        anyhow::bail!("throttle.fallback_bytes_per_second must be positive, got {fallback}");
    }
    for (name, bps) in &config.throttle.bitrates {
        if !bps.is_finite() || *bps <= 0.0 {
            anyhow::bail!("Bitrate for '{name}' must be positive, got {bps}");
        }
    }

    // Validate auth config
    if config.auth.required
        && config.auth.api_keys.is_empty()
        && config.auth.signing_secret.is_none()
    {
        tracing::warn!("Auth is required but no api_keys or signing_secret are configured; every request will be rejected");
    }

    Ok(())
}
