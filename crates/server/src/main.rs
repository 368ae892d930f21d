use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::Notify;
use tracing::{info, warn};

use imagehoster_gallery::GalleryBuilder;
use imagehoster_server::api::{AppState, router};
use imagehoster_server::config::{ImageHosterConfig, SESSION_SECRET_ENV};
use imagehoster_server::session::SessionManager;
use imagehoster_server::store_factory::create_store;

/// ImageHoster HTTP server.
#[derive(Parser, Debug)]
#[command(name = "imagehoster-server", about = "Image sharing web application")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "imagehoster.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run database migrations for the configured store backend, then exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration from TOML file, or use defaults if the file does not exist.
    let config_exists = Path::new(&cli.config).exists();
    let mut config: ImageHosterConfig = if config_exists {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        ImageHosterConfig::default()
    };
    if !config_exists {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    if let Ok(secret) = std::env::var(SESSION_SECRET_ENV) {
        config.session.secret = Some(secret);
    }

    if let Some(Commands::Migrate) = cli.command {
        return run_migrate(&config).await;
    }

    let store = create_store(&config.store).await?;
    info!(backend = %config.store.backend, "store initialized");

    let gallery = GalleryBuilder::new()
        .store(Arc::clone(&store))
        .config(config.gallery.clone())
        .build()?;
    let sessions = SessionManager::new(&config.session, store);

    let state = AppState {
        gallery: Arc::new(gallery),
        sessions: Arc::new(sessions),
        max_upload_bytes: config.server.max_upload_bytes,
    };
    let app = router(state);

    // Resolve the bind address (CLI overrides take precedence).
    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "imagehoster-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM, bounded by the
    // configured timeout once the signal arrives.
    let draining = Arc::new(Notify::new());
    let signal = Arc::clone(&draining);
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.notify_one();
        })
        .into_future();
    tokio::pin!(serve);

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    tokio::select! {
        result = &mut serve => result?,
        () = draining.notified() => {
            info!(
                timeout_secs = config.server.shutdown_timeout_seconds,
                "waiting for in-flight requests..."
            );
            match tokio::time::timeout(shutdown_timeout, &mut serve).await {
                Ok(result) => result?,
                Err(_) => warn!("shutdown timed out, dropping remaining connections"),
            }
        }
    }

    info!("imagehoster-server stopped");
    Ok(())
}

/// Run the `migrate` subcommand: constructing the store applies its schema.
async fn run_migrate(config: &ImageHosterConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(backend = %config.store.backend, "running store migrations...");
    let _store = create_store(&config.store).await?;
    info!(backend = %config.store.backend, "store migrations complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
