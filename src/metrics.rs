use prometheus::{Encoder, GaugeVec, IntCounter, Opts, Registry, TextEncoder};

use crate::sensor::Measurement;

/// Prometheus series owned by the exporter instance. Nothing here is
/// process-global: the registry lives and dies with the application.
pub struct ExporterMetrics {
    registry: Registry,
    pub(crate) sensor_values: GaugeVec,
    pub(crate) read_errors: IntCounter,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sensor_values = GaugeVec::new(
            Opts::new("scd41_value", "SCD41 sensor values with type and unit labels"),
            &["type", "unit"],
        )?;
        let read_errors = IntCounter::new(
            "sensor_read_errors_total",
            "Total number of failed sensor reads",
        )?;

        registry.register(Box::new(sensor_values.clone()))?;
        registry.register(Box::new(read_errors.clone()))?;

        Ok(Self {
            registry,
            sensor_values,
            read_errors,
        })
    }

    pub fn record(&self, m: &Measurement) {
        self.sensor_values
            .with_label_values(&["co2", "ppm"])
            .set(m.co2_ppm as f64);
        self.sensor_values
            .with_label_values(&["temperature", "°C"])
            .set(m.temperature_c as f64);
        self.sensor_values
            .with_label_values(&["humidity", "%"])
            .set(m.humidity_pct as f64);
    }

    pub fn inc_read_error(&self) {
        self.read_errors.inc();
    }

    /// Text exposition of every registered series.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        // Writing to a Vec cannot fail
        let _ = encoder.encode(&self.registry.gather(), &mut buf);
        buf
    }
}
