//! HF/VHF Propagation Report - Backend Server

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use propagation_report::{
    build_report_service, build_storage, config::Config, create_app, services::report::render_chart_test_page,
    services::ReportComposer, AppState, Deployment,
};

const TEST_CHARTS_FILE: &str = "test_charts.html";

#[derive(Debug, Parser)]
#[command(name = "propagation-server", version, about = "HF/VHF propagation report server")]
struct Cli {
    /// Where report bundles are stored
    #[arg(long, value_enum, default_value_t = Deployment::Local)]
    deployment: Deployment,

    /// Render every chart from the sample dataset into test_charts.html and exit
    #[arg(long)]
    test_charts: bool,
}

/// Accept single-dash long flags (`-deployment=gcs`) as well as `--deployment=gcs`
fn normalize_legacy_flags(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let is_long_single_dash = i > 0
                && arg.starts_with('-')
                && !arg.starts_with("--")
                && arg.len() > 2
                && arg[1..].starts_with(|c: char| c.is_ascii_alphabetic());
            if is_long_single_dash {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "propagation_report={level},propagation_server={level},tower_http={level}",
            level = config.logging.filter_level()
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args()));

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("loading configuration")?;
    init_tracing(&config);

    if cli.test_charts {
        let composer = ReportComposer::new()?;
        let page = render_chart_test_page(&composer, Utc::now())?;
        tokio::fs::write(TEST_CHARTS_FILE, page)
            .await
            .with_context(|| format!("writing {}", TEST_CHARTS_FILE))?;
        tracing::info!("Chart test page written to {}", TEST_CHARTS_FILE);
        return Ok(());
    }

    config.validate(cli.deployment)?;

    tracing::info!("Starting propagation report server");
    tracing::info!("Environment: {}", config.environment);
    if config.api_key.is_none() {
        tracing::warn!("REPORT_API_KEY is not set; /generate is open to anyone");
    }

    let storage = build_storage(&config, cli.deployment)?;
    let reports = build_report_service(&config, storage.clone())?;

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        storage: storage.clone(),
        reports: Arc::new(reports),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.server.host, config.server.port))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = storage.close().await {
        tracing::warn!(error = %e, "Storage close failed");
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
