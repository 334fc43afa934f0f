use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scd4x_exporter::{load_config, LogFormat};

#[tokio::main]
async fn main() {
    let config_path =
        std::env::var("EXPORTER_CONFIG").unwrap_or_else(|_| "config/exporter.toml".to_string());
    let config = load_config(&config_path).expect("failed to load configuration");

    init_tracing(config.log_format);
    info!(path = %config_path, "[scd4x-exporter] starting up");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = scd4x_exporter::run(config, shutdown_rx).await {
        error!(error = %e, "exporter failed");
        std::process::exit(1);
    }
}

/// Level comes from RUST_LOG (default info), format from configuration.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    match format {
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
