//! NeuroLink server - main entry point
//!
//! Resolves configuration, opens the session database, starts the broadcast
//! scheduler and serves the WebSocket gateway and admin API until Ctrl+C or
//! SIGTERM.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use neurolink_common::config::{
    resolve_root_folder, ServiceConfig, CONFIG_FILE_NAME, DATABASE_FILE_NAME, ROOT_FOLDER_ENV,
};
use neurolink_common::db::{init::init_database, SessionStore, SqliteSessionStore};
use neurolink_common::kpi::{KpiEngine, NoiseSource, RandomNoise};
use neurolink_server::classifier::{DeepFaceHttpClassifier, EmotionClassifier, UnavailableClassifier};
use neurolink_server::scheduler::BroadcastScheduler;
use neurolink_server::{build_router, AppState};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for neurolink-server
#[derive(Parser, Debug)]
#[command(name = "neurolink-server")]
#[command(about = "Live emotion KPI service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "NEUROLINK_PORT")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "NEUROLINK_BIND")]
    bind: IpAddr,

    /// Folder holding the database and configuration file
    #[arg(short, long, env = "NEUROLINK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Database file (default: <root-folder>/neurolink.db)
    #[arg(long, env = "NEUROLINK_DATABASE")]
    database: Option<PathBuf>,

    /// Configuration file (default: <root-folder>/neurolink.toml)
    #[arg(short, long, env = "NEUROLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of a DeepFace-compatible classifier (overrides the config file)
    #[arg(long, env = "NEUROLINK_CLASSIFIER_URL")]
    classifier_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "neurolink_server=info,neurolink_common=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting NeuroLink server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    // CLI flag and env var are both handled by clap
    let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV);
    info!("Root folder: {}", root_folder.display());

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| root_folder.join(CONFIG_FILE_NAME));
    let mut config = ServiceConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    if let Some(url) = args.classifier_url.clone() {
        config.classifier.url = Some(url);
    }

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| root_folder.join(DATABASE_FILE_NAME));
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());
    let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(pool));

    let classifier: Arc<dyn EmotionClassifier> = match config.classifier.url.as_deref() {
        Some(url) => {
            let client = DeepFaceHttpClassifier::new(
                url,
                Duration::from_millis(config.classifier.timeout_ms),
            )
            .context("Failed to create classifier client")?;
            info!("Classifier endpoint: {}", client.analyze_url());
            Arc::new(client)
        }
        None => {
            warn!("No classifier configured; frames will be dropped and KPIs stay neutral");
            Arc::new(UnavailableClassifier)
        }
    };

    let state = AppState::new(Arc::clone(&store), classifier, &config);

    let noise: Box<dyn NoiseSource> = match config.kpi.seed {
        Some(seed) => Box::new(RandomNoise::seeded(seed)),
        None => Box::new(RandomNoise::from_entropy()),
    };
    let scheduler = BroadcastScheduler::new(
        state.registry.clone(),
        state.classification.clone(),
        store,
        KpiEngine::new(config.kpi.policy()),
        noise,
    )
    .with_tick_period(config.broadcast.tick_period())
    .with_persist_interval(config.broadcast.persist_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_rx));

    let app = build_router(state);
    let addr = SocketAddr::new(args.bind, args.port);
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        error!("Broadcast scheduler task failed: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
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
