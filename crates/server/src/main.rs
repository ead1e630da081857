//! Folio server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use folio_core::config::AppConfig;
use folio_server::{create_router, AppState};
use folio_signer::CdnUrlSigner;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Folio - protected audiobook media delivery server
#[derive(Parser, Debug)]
#[command(name = "foliod")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "FOLIO_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Folio v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    // FOLIO_CONFIG is just the path, not configuration content
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("FOLIO_") && key != "FOLIO_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: foliod --config /path/to/config.toml\n  \
             2. Environment variables: FOLIO_SERVER__BIND=0.0.0.0:8080 \
             FOLIO_AUTH__BYPASS_ENABLED=true foliod\n\n\
             Set FOLIO_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("FOLIO_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid configuration")?;

    // Load the CDN signer if configured; S3-backed streaming URLs are
    // then signed for the distribution instead of presigned.
    let cdn_signer = match &config.cdn {
        Some(cdn_config) => {
            let signer = CdnUrlSigner::from_config(cdn_config)
                .context("failed to load CDN signing key")?;
            tracing::info!(domain = %signer.domain(), "CDN URL signing enabled");
            Some(Arc::new(signer))
        }
        None => {
            tracing::info!("No CDN configured, streaming URLs use storage-native signing");
            None
        }
    };

    // Initialize storage backend
    let storage = folio_storage::from_config(
        &config.storage,
        &config.server.public_base_url,
        cdn_signer,
    )
    .await
    .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    // Verify storage connectivity before accepting requests.
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!("Storage backend connectivity verified");

    // Initialize chapter store
    let chapters = folio_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize chapter store")?;
    chapters
        .health_check()
        .await
        .context("chapter store health check failed")?;
    tracing::info!("Chapter store initialized");

    if config.auth.bypass_enabled {
        tracing::warn!("Auth bypass is enabled, do not use this in production");
    }

    let bind = config.server.bind.clone();
    let state = AppState::new(config, storage, chapters);
    let app = create_router(state);

    let addr: SocketAddr = bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
