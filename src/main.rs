mod cli;

use seekgate::{
    auth::{self, SignedTokenChecker},
    config, server,
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_effective_config(config_path)?;

    // CLI flags win over file and environment
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting Seekgate server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "seekgate=trace,seekgate_common=debug,tower_http=debug".to_string()
        } else {
            "seekgate=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::SignToken { resource, ttl_secs } => {
            sign_token(&resource, ttl_secs, cli.config.as_deref())
        }
        Commands::Version => {
            println!("seekgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::GenerateApiKey => {
            println!("{}", auth::generate_api_key());
            Ok(())
        }
        Commands::GenerateSecret => {
            println!("{}", auth::generate_secret());
            Ok(())
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Video root: {}", config.server.video_root.display());
    println!(
        "  Throttle: {} ms per second skipped, capped at {} ms",
        config.throttle.delay_ms_per_second_jump, config.throttle.max_delay_ms
    );
    println!("  Bitrate overrides: {}", config.throttle.bitrates.len());
    println!("  Auth required: {}", config.auth.required);
    println!("  API keys: {}", config.auth.api_keys.len());
    println!(
        "  Signed tokens: {}",
        if config.auth.signing_secret.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    match config.sessions.ttl_secs {
        Some(ttl) => println!("  Session TTL: {}s", ttl),
        None => println!("  Session TTL: none"),
    }

    Ok(())
}

fn sign_token(resource: &str, ttl_secs: u64, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_effective_config(config_path)?;
    let secret = config
        .auth
        .signing_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .context("No signing secret configured (set auth.signing_secret or SIGNING_SECRET)")?;

    let token = SignedTokenChecker::new(secret).sign(resource, auth::expiry_from_now(ttl_secs));
    println!("{}", token);
    Ok(())
}
