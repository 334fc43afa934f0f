pub mod bus;
pub mod config;
pub mod errors;
pub mod http_service;
pub mod metrics;
pub mod poller;
pub mod registry;
pub mod sensor;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{load_config, ExporterConfig, LogFormat};
pub use errors::{SensorError, StartupError, TransportError};
pub use metrics::ExporterMetrics;
pub use poller::{PollOutcome, Poller};
pub use sensor::{Measurement, Sensor};

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::http_service::HttpState;

/// Runs the exporter until the shutdown signal fires: initializes the
/// sensor (fatal on failure), spawns the polling task, and serves the
/// metrics/health surface. Shutdown ordering: the polling task stops
/// first, then the final stop command goes to the sensor, then the bus
/// is released.
pub async fn run(
    config: ExporterConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<(), StartupError> {
    let metrics = Arc::new(ExporterMetrics::new()?);
    let healthy = Arc::new(AtomicBool::new(false));

    let sensor = registry::init_sensor(&config).await?;

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "exporter listening");

    let poller = Poller::new(
        sensor,
        metrics.clone(),
        healthy.clone(),
        Duration::from_millis(config.poll_interval_ms),
        config.failure_threshold,
    );
    let poll_task = tokio::spawn(poller.run(shutdown.clone()));

    let router = http_service::router(HttpState { metrics, healthy });
    let mut server_shutdown = shutdown;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
            info!("shutting down HTTP server");
        })
        .await?;

    match poll_task.await {
        Ok(mut sensor) => {
            if let Err(e) = sensor.stop().await {
                error!(error = %e, "sensor stop failed");
            } else {
                info!("sensor stopped successfully");
            }
        }
        Err(e) => error!(error = %e, "polling task panicked"),
    }

    Ok(())
}
