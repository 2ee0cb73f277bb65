//! Registration server - Entry point.

use anyhow::{Context, Result};
use object_storage::{CloudinaryClient, MemoryObjectStorage, ObjectStorage};
use registration_server::{
    api::{create_router, create_router_with_rate_limit, ApiSettings, AppState, RateLimitState},
    config::{Config, StorageBackend},
    RegistrationService,
};
use registration_store::{Persistence, RegistrationRepository, RegistrationStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_logging(&config);

    info!(
        environment = %config.server.environment,
        "Starting registration server"
    );

    let storage = build_storage(&config)?;

    let persistence = if config.registry.persist {
        Persistence::file(config.registry.path.clone())
    } else {
        info!("Persistence disabled, using in-memory storage");
        Persistence::memory()
    };
    let store = RegistrationRepository::open(persistence)
        .await
        .context("Failed to load registrations")?;
    info!(count = store.count().await?, "Registrations loaded");

    tokio::fs::create_dir_all(&config.upload.temp_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", config.upload.temp_dir))?;

    let service = RegistrationService::new(Arc::new(store), storage, config.storage.folder.clone());

    let settings = ApiSettings {
        expose_error_details: !config.is_production(),
        temp_dir: config.upload.temp_dir.clone(),
        redact_list_tokens: config.registration.redact_list_tokens,
        max_body_bytes: config.server.max_body_bytes,
        cors_max_age: config.cors.max_age,
    };

    let state = AppState::new(service, settings);
    let app = match RateLimitState::per_minute(config.rate_limit.global_per_minute) {
        Some(rate_limit) => {
            info!(
                per_minute = config.rate_limit.global_per_minute,
                "Global rate limit enabled"
            );
            create_router_with_rate_limit(state, rate_limit)
        }
        None => create_router(state),
    };

    let addr = SocketAddr::new(
        config.server.listen_addr.parse().unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_storage(config: &Config) -> Result<Arc<dyn ObjectStorage>> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackend::Memory => {
            warn!("Using in-memory object storage; uploads are not durable");
            Ok(Arc::new(MemoryObjectStorage::new(storage.memory_base_url.clone())))
        }
        StorageBackend::Cloudinary => {
            let (Some(cloud_name), Some(api_key), Some(api_secret)) = (
                storage.cloud_name.clone(),
                storage.api_key.clone(),
                storage.api_secret.clone(),
            ) else {
                anyhow::bail!("Cloudinary credentials are not configured");
            };

            let client = CloudinaryClient::new(
                storage.api_url.clone(),
                cloud_name.clone(),
                api_key,
                api_secret,
                storage.timeout,
            )
            .context("Failed to create Cloudinary client")?;

            info!(cloud_name = %cloud_name, folder = %storage.folder, "Using Cloudinary object storage");
            Ok(Arc::new(client))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
