use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use multisafepay_connector as connector;
use multisafepay_connector::client::MultiSafepayClient;
use multisafepay_connector::handlers::AppServices;
use multisafepay_connector::logging::{setup_logger, LoggerConfig, LoggingState, SlogOperatorLog};
use multisafepay_connector::repositories::{InMemoryStore, SeedData};
use multisafepay_connector::settings::InMemorySettings;

#[derive(Parser)]
#[command(
    name = "multisafepay-connector",
    about = "MultiSafepay payment bridge for OpenCart storefronts",
    version
)]
struct Cli {
    #[arg(long, help = "JSON file used to seed orders, catalog and settings")]
    seed: Option<String>,
    #[arg(long, help = "Override the configured listen port")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = connector::config::load_config()?;
    if let Some(seed) = cli.seed {
        cfg.seed_path = Some(seed);
    }
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    connector::config::init_tracing(cfg.log_level(), cfg.log_json);
    connector::handlers::health::init_start_time();

    let logger = setup_logger(LoggerConfig {
        use_color: cfg.operator_log_color,
        ..LoggerConfig::default()
    });
    let operator_log = Arc::new(SlogOperatorLog::new(logger.clone()));

    // Seed the in-memory repositories
    let (store, settings) = match &cfg.seed_path {
        Some(path) => {
            let seed = SeedData::load(path)
                .await
                .with_context(|| format!("loading seed data from {}", path))?;
            let settings = seed.settings();
            (InMemoryStore::from_seed(seed), settings)
        }
        None => {
            warn!("No seed_path configured; starting with an empty store");
            (InMemoryStore::new(), InMemorySettings::new())
        }
    };

    let client = MultiSafepayClient::from_config(&cfg).context("building vendor client")?;

    let services = AppServices::new(
        &cfg,
        Arc::new(store),
        Arc::new(settings),
        Arc::new(client),
        operator_log,
    );

    let state = connector::AppState {
        config: cfg.clone(),
        services,
    };

    let cors = if cfg.is_development() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let app = connector::app_router(state)
        .layer(axum::middleware::from_fn_with_state(
            Arc::new(LoggingState::new(logger)),
            connector::logging::logging_middleware,
        ))
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("multisafepay-connector listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
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
    info!("shutdown signal received");
}
