use anyhow::Result;
use rtcperf_core::{config::AppConfig, metrics::init_prometheus_recorder, runtime::Aggregator};
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod middleware;
mod router;

/// Initializes the logging system based on the configuration.
///
/// `RUST_LOG` takes precedence; `debug` and `trace` are shorthands that
/// raise only this workspace's crates.
fn init_logging(config: &AppConfig) {
    let filter = match std::env::var("RUST_LOG").as_deref() {
        Ok("debug") => EnvFilter::new("warn,rtcperf_core=debug,rtcperf_agent=debug"),
        Ok("trace") => EnvFilter::new("warn,rtcperf_core=trace,rtcperf_agent=trace"),
        Ok(_) => EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| {
            EnvFilter::new("warn,rtcperf_core=debug,rtcperf_agent=debug")
        }),
        Err(_) => EnvFilter::new(format!(
            "warn,rtcperf_core={level},rtcperf_agent={level}",
            level = config.logging.level
        )),
    };

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    init_logging(&config);
    info!("Starting rtcperf agent");
    debug!(
        interval_s = config.stats.interval_seconds,
        ingest_enabled = config.ingest.enabled,
        gateway = !config.gateway.url.is_empty(),
        push = !config.push.url.is_empty(),
        "Configuration loaded"
    );

    let metrics = init_prometheus_recorder();
    let aggregator = Arc::new(Aggregator::builder().with_config(config.clone()).build()?);
    aggregator.start().await;

    if config.ingest.enabled {
        let addr = config.ingest_addr()?;
        let app = router::create_app(
            router::AppState { aggregator: Arc::clone(&aggregator), metrics },
            &config.push.secret,
        );
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(address = %addr, "Ingestion server listening");

        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await {
            error!(error = %e, "Ingestion server error occurred");
        }
    } else {
        shutdown_signal().await;
    }

    aggregator.stop().await;
    info!("Agent shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                () = std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received, stopping aggregator");
}
