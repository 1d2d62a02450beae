//! examhub-api - exam administration HTTP service
//!
//! Resolves bootstrap configuration, opens the document store, wires the
//! blob and identity collaborators and serves the API until Ctrl+C/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use examhub_common::config::{RootFolderInitializer, RootFolderResolver, TomlConfig};
use examhub_common::db::{init_database, init_memory_database};
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use examhub_api::identity::{HttpIdentityGateway, IdentityGateway, LocalIdentityGateway};
use examhub_api::services::accounts;
use examhub_api::storage::{BlobStore, LocalBlobStore};
use examhub_api::{build_router, with_request_timeout, AppState};

/// Command-line arguments for examhub-api
#[derive(Parser, Debug)]
#[command(name = "examhub-api")]
#[command(about = "Exam administration API service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "EXAMHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "EXAMHUB_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long, env = "EXAMHUB_BIND")]
    bind: Option<String>,

    /// Root folder holding the database and uploaded files
    /// (EXAMHUB_ROOT_FOLDER is honored by the root folder resolver)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Database file (default `<root>/examhub.db`)
    #[arg(short, long, env = "EXAMHUB_DATABASE")]
    database: Option<PathBuf>,

    /// Fail startup when the database cannot be opened
    #[arg(long, env = "EXAMHUB_PRODUCTION")]
    production: bool,

    /// Bearer key for the identity provider
    #[arg(long, env = "EXAMHUB_IDENTITY_API_KEY", hide_env_values = true)]
    identity_api_key: Option<String>,
}

fn default_filter(level: &str) -> String {
    format!(
        "examhub_api={level},examhub_common={level},tower_http={level}",
        level = level
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting examhub-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let port = args.port.unwrap_or(config.port);
    let bind = args.bind.clone().unwrap_or_else(|| config.bind_address.clone());
    let production = args.production || config.production;

    let root_folder =
        RootFolderResolver::new(args.root_folder.clone(), config.root_folder.clone()).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to create root folder")?;
    info!("Root folder: {}", initializer.root().display());

    let db_path = args
        .database
        .clone()
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(|| initializer.database_path());

    let db = match init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) if production => {
            error!("Failed to open database {}: {}", db_path.display(), e);
            return Err(e).context("Database unavailable in production mode");
        }
        Err(e) => {
            warn!(
                "Failed to open database {} ({}); continuing with an in-memory database",
                db_path.display(),
                e
            );
            init_memory_database()
                .await
                .context("Failed to open in-memory database")?
        }
    };

    let blob_root = config
        .storage
        .root
        .clone()
        .unwrap_or_else(|| initializer.blob_root());
    tokio::fs::create_dir_all(&blob_root)
        .await
        .with_context(|| format!("Failed to create storage root {}", blob_root.display()))?;
    let public_base_url = config.storage.public_base_url_or_default(port);
    info!("Blob storage: {} ({})", blob_root.display(), public_base_url);
    let blobs: Arc<dyn BlobStore> =
        Arc::new(LocalBlobStore::new(blob_root.clone(), public_base_url));

    let identity: Arc<dyn IdentityGateway> = match &config.identity.endpoint {
        Some(endpoint) => {
            let api_key = args
                .identity_api_key
                .clone()
                .or_else(|| config.identity.api_key.clone());
            Arc::new(HttpIdentityGateway::new(endpoint.clone(), api_key))
        }
        None => {
            info!("No identity provider configured, using in-process accounts");
            Arc::new(LocalIdentityGateway::new())
        }
    };

    if let Some(admin) = &config.admin {
        accounts::bootstrap_admin(&db, identity.as_ref(), admin).await;
    }

    let state = AppState::new(db, blobs, identity, Some(blob_root));
    let app = with_request_timeout(
        build_router(state)
            .layer(cors_layer(&config.http.allowed_origins))
            .layer(DefaultBodyLimit::max(config.http.max_body_bytes)),
        Duration::from_secs(config.http.request_timeout_secs),
    )
    .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("examhub-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
