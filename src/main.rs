use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use vault_core::constants::{DEFAULT_REST_ADDR, ENV_REST_ADDR};
use vault_core::{ConfigValues, VaultService, resolve_config};

/// Main entry point for the media vault server
///
/// Resolves configuration from the environment once, opens the vault and
/// serves the REST API until interrupted.
///
/// # Environment Variables
/// - `VAULT_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `VAULT_DATA_DIR`: Root for the metadata index and local blobs
/// - `VAULT_STORAGE_MODE`: `local` or `remote`
/// - `VAULT_REMOTE_URL`: Object store URL when the mode is `remote`
/// - `VAULT_THUMBNAIL_SIZES`: `small,medium,large` pixel bounds
/// - `VAULT_STREAM_BUFFER`: Streaming chunk size in bytes
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vault=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = resolve_config(ConfigValues::from_lookup(|key| std::env::var(key).ok()))?;
    let rest_addr = std::env::var(ENV_REST_ADDR).unwrap_or_else(|_| DEFAULT_REST_ADDR.into());

    tracing::info!(
        "++ Opening vault at {} ({} storage)",
        cfg.data_dir().display(),
        cfg.storage_mode()
    );
    let vault = tokio::task::spawn_blocking(move || VaultService::open(&cfg)).await??;

    let app = api_rest::router(AppState::new(Arc::new(vault)));

    tracing::info!("++ Starting vault REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("-- Shutting down vault REST");
        })
        .await?;

    Ok(())
}
