//! Simaling - neighbourhood administration backend

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{BootstrapConfig, Config, LoggingConfig};
use simaling_api::{AppState, UploadStore, create_router};
use simaling_auth::{BlacklistSweeper, JwtManager};
use simaling_db::{Database, NewUser, Role};

/// Simaling - neighbourhood administration backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "SIMALING_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "SIMALING_PORT")]
    port: Option<u16>,

    /// SQLite database path
    #[arg(long, env = "SIMALING_DB_PATH")]
    db_path: Option<String>,

    /// Token signing secret
    #[arg(long, env = "SIMALING_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Base URL for absolute image links
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,
}

impl Args {
    /// Command-line and environment values take precedence over the file
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = self.db_path {
            config.database.path = path;
        }
        if let Some(secret) = self.jwt_secret {
            config.auth.jwt_secret = Some(secret);
        }
        if let Some(base_url) = self.base_url {
            config.uploads.base_url = base_url;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config_path = args.config.clone();

    let mut config = Config::load(&config_path)?;
    args.apply(&mut config);

    init_logging(&config.logging);
    config.validate()?;

    info!("Starting Simaling v{}", env!("CARGO_PKG_VERSION"));

    // Create data directories
    if let Some(parent) = std::path::Path::new(&config.database.path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Initialize database
    let db = Database::new(&config.database.url()).await?;
    bootstrap_admin(&db, &config.bootstrap).await?;

    // Initialize upload storage
    let uploads = Arc::new(UploadStore::new(&config.uploads.dir, &config.uploads.base_url));
    uploads
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create uploads directory {}", config.uploads.dir))?;

    // Initialize JWT manager
    let secret = config.auth.jwt_secret.as_deref().unwrap_or_default();
    let token_ttl = config
        .auth
        .token_ttl()
        .context("auth.token_ttl_hours is out of range")?;
    let jwt = Arc::new(JwtManager::new(secret, token_ttl));

    let metrics_handle = if config.metrics.enabled {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Metrics exposed at /metrics");
        Some(Arc::new(handle))
    } else {
        None
    };

    // Background blacklist cleanup
    let shutdown = CancellationToken::new();
    let sweeper = BlacklistSweeper::new(db.clone(), config.auth.sweep_interval());
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    let state = AppState::new(db, jwt, uploads);

    let app = create_router(state, metrics_handle)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .with_context(|| "Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = sweeper_task.await {
        warn!("Blacklist sweeper did not stop cleanly: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Create the initial administrator when none exists and a password is configured
async fn bootstrap_admin(db: &Database, bootstrap: &BootstrapConfig) -> Result<()> {
    if db.has_admin().await? {
        return Ok(());
    }

    let Some(password) = bootstrap.admin_password.as_deref() else {
        warn!("No administrator exists and bootstrap.admin_password is not set");
        return Ok(());
    };

    info!("Creating initial administrator");
    let password_hash = simaling_auth::hash_password(password)?;
    db.insert_user(
        NewUser {
            phone_no: bootstrap.admin_phone.clone(),
            nik: None,
            email: None,
            password_hash,
            name: bootstrap.admin_name.clone(),
            address: String::new(),
            role: Role::Admin,
        },
        Vec::new(),
    )
    .await?;
    info!("Administrator created (phone: {})", bootstrap.admin_phone);
    Ok(())
}

/// Wait for a shutdown signal or an internal cancellation
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for CTRL+C: {}", e);
                shutdown.cancelled().await;
            }
        }
        _ = shutdown.cancelled() => {}
    }
    info!("Shutdown signal received");
}
