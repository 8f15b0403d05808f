use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archivist_core::{
    default_notifiers, load_config, validate_config, ChannelRegistry, ChannelSyncer, EventBus,
    EventSink, LibraryPaths, LoftyTagStore, SettingsStore, SyncOptions, SyncScheduler,
    SyncTrigger, TagStore, YtDlpCatalog, YtDlpFetcher,
};

use archivist_server::api::create_router;
use archivist_server::state::AppState;

const CHANNEL_LIST_FILE: &str = "channel_list.json";
const SETTINGS_FILE: &str = "settings_config.json";

/// How long shutdown waits for an active run.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("ARCHIVIST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration before logging so the verbose flag picks the default filter
    let config = load_config(&config_path);
    let default_filter = config
        .as_ref()
        .map(|c| c.logging.default_filter())
        .unwrap_or("info,tower_http=debug");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Loading configuration from {:?}", config_path);
    let config =
        config.with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Config directory: {:?}", config.paths.config_dir);
    info!(
        "Library roots: video {:?}, audio {:?}",
        config.paths.video_dir, config.paths.audio_dir
    );

    tokio::fs::create_dir_all(&config.paths.config_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", config.paths.config_dir))?;

    // Persisted state; malformed files fall back to defaults
    let registry = Arc::new(
        ChannelRegistry::load(
            config.paths.config_dir.join(CHANNEL_LIST_FILE),
            LibraryPaths::from(&config.paths),
        )
        .await,
    );
    let settings = Arc::new(SettingsStore::load(config.paths.config_dir.join(SETTINGS_FILE)).await);
    let loaded = registry.len().await;
    info!("Loaded {} channels", loaded);

    let events = EventBus::default();
    let sink: Arc<dyn EventSink> = Arc::new(events.clone());

    let tags: Arc<dyn TagStore> = Arc::new(LoftyTagStore::new());
    let catalog = Arc::new(YtDlpCatalog::new(config.ytdlp.clone()));
    let fetcher = Arc::new(YtDlpFetcher::new(config.ytdlp.clone(), Arc::clone(&tags)));
    info!("Using yt-dlp at {:?}", config.ytdlp.binary);

    let syncer = Arc::new(ChannelSyncer::new(
        Arc::clone(&registry),
        Arc::clone(&settings),
        catalog,
        fetcher,
        tags,
        Arc::clone(&sink),
        SyncOptions::from_config(&config),
    ));

    let scheduler = Arc::new(SyncScheduler::new(
        Arc::clone(&registry),
        Arc::clone(&settings),
        syncer,
        default_notifiers(),
        sink,
        config.sync.thread_limit,
    ));

    let trigger = Arc::new(SyncTrigger::new(
        Arc::clone(&scheduler),
        Arc::clone(&settings),
        Duration::from_secs(config.sync.schedule_check_interval_secs),
    ));
    let trigger_handle = trigger.spawn();
    info!(
        "Sync trigger started (thread limit {})",
        config.sync.thread_limit
    );

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        registry,
        settings,
        scheduler,
        events,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    trigger.stop();
    let mut trigger_handle = trigger_handle;
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut trigger_handle).await {
        Ok(Ok(())) => info!("Sync trigger stopped"),
        Ok(Err(e)) => error!("Sync trigger task failed: {}", e),
        Err(_) => {
            // A run is still going; its channels reload as Incomplete next start
            info!("Sync run still active after {:?}, aborting", SHUTDOWN_GRACE);
            trigger_handle.abort();
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
