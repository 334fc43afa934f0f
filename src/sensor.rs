pub mod scd4x;

use async_trait::async_trait;

use crate::errors::SensorResult;

/// One decoded reading. Produced once per successful poll and handed to
/// the metrics sink; the poller keeps no reference to it afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// CO2 concentration in parts per million.
    pub co2_ppm: f32,
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
    /// Relative humidity in percent. Not clamped: the raw conversion can
    /// mathematically exceed 0-100.
    pub humidity_pct: f32,
}

#[async_trait]
pub trait Sensor: Send {
    /// Bring the sensor into periodic measurement mode.
    async fn init(&mut self) -> SensorResult<()>;

    /// Leave periodic measurement mode. Callers must not issue further
    /// operations before this returns; the implementation enforces the
    /// mandated settle time.
    async fn stop(&mut self) -> SensorResult<()>;

    /// Whether a completed measurement is available to read.
    async fn is_measuring(&mut self) -> SensorResult<bool>;

    /// Fetch and decode the current measurement.
    async fn read(&mut self) -> SensorResult<Measurement>;
}
