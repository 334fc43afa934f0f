use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::metrics::ExporterMetrics;
use crate::sensor::Sensor;

/// Classification of a single poll tick. The reaction table in `tick`
/// must stay exhaustive over these three cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    ReadSuccess,
    DataNotReady,
    ReadFailed,
}

/// Periodic poll loop: classifies each tick, tracks consecutive failures
/// and drives the stop/re-init recovery sequence once the failure
/// threshold is crossed. Sole owner of the sensor (and through it the
/// bus); no concurrent bus transactions are ever issued.
pub struct Poller<S> {
    sensor: S,
    metrics: Arc<ExporterMetrics>,
    healthy: Arc<AtomicBool>,
    poll_interval: Duration,
    failure_threshold: u32,
    consecutive_failures: u32,
}

impl<S: Sensor> Poller<S> {
    pub fn new(
        sensor: S,
        metrics: Arc<ExporterMetrics>,
        healthy: Arc<AtomicBool>,
        poll_interval: Duration,
        failure_threshold: u32,
    ) -> Self {
        Self {
            sensor,
            metrics,
            healthy,
            poll_interval,
            failure_threshold,
            consecutive_failures: 0,
        }
    }

    /// Drives the sensor until the shutdown signal fires. Cancellation
    /// takes priority over the ticker and cuts a tick short at the next
    /// protocol step; a dispatched bus transaction is never aborted.
    /// Returns the sensor so the caller can issue the final stop command
    /// after the loop is done.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> S {
        info!("sensor polling started");

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = self.tick() => {}
            }
        }

        info!("sensor polling stopped");
        self.sensor
    }

    /// One full classify-and-react cycle. Counter and health updates for
    /// a tick happen before any recovery action of the same tick.
    async fn tick(&mut self) {
        match self.poll_once().await {
            PollOutcome::ReadSuccess => {
                self.consecutive_failures = 0;
            }
            PollOutcome::DataNotReady => {
                // not a failure: no counter or health change
                debug!("sensor data not ready, skipping update");
            }
            PollOutcome::ReadFailed => {
                self.consecutive_failures += 1;
                warn!(
                    consecutive_failures = self.consecutive_failures,
                    "sensor read failed"
                );

                if self.consecutive_failures >= self.failure_threshold {
                    if self.recover().await {
                        self.consecutive_failures = 0;
                    } else {
                        warn!("sensor recovery failed, will retry later");
                    }
                }
            }
        }
    }

    /// Ask the sensor for readiness, then read. Updates health flag and
    /// error counter as a side effect of classification.
    async fn poll_once(&mut self) -> PollOutcome {
        let ready = match self.sensor.is_measuring().await {
            Ok(ready) => ready,
            Err(e) => {
                error!(error = %e, "sensor status check failed");
                self.metrics.inc_read_error();
                self.healthy.store(false, Ordering::Relaxed);
                return PollOutcome::ReadFailed;
            }
        };

        if !ready {
            return PollOutcome::DataNotReady;
        }

        match self.sensor.read().await {
            Ok(measurement) => {
                self.healthy.store(true, Ordering::Relaxed);
                self.metrics.record(&measurement);
                debug!(
                    co2_ppm = measurement.co2_ppm,
                    temperature_c = measurement.temperature_c,
                    humidity_pct = measurement.humidity_pct,
                    "sensor data updated"
                );
                PollOutcome::ReadSuccess
            }
            Err(e) => {
                error!(error = %e, "failed to read sensor data");
                self.metrics.inc_read_error();
                self.healthy.store(false, Ordering::Relaxed);
                PollOutcome::ReadFailed
            }
        }
    }

    /// Stop (best-effort), re-init, then confirm the sensor actually
    /// reports active. Only a confirmed-active sensor counts as
    /// recovered; anything else leaves the counter at or above the
    /// threshold so the next qualifying tick retries.
    async fn recover(&mut self) -> bool {
        warn!("attempting to recover sensor");

        if let Err(e) = self.sensor.stop().await {
            debug!(error = %e, "stop before re-init failed");
        }
        if let Err(e) = self.sensor.init().await {
            error!(error = %e, "sensor re-init failed");
            return false;
        }

        match self.sensor.is_measuring().await {
            Ok(true) => {
                info!("sensor re-initialized successfully");
                true
            }
            Ok(false) => {
                error!("sensor still not measuring after re-init");
                false
            }
            Err(e) => {
                error!(error = %e, "sensor still not measuring after re-init");
                false
            }
        }
    }
}
