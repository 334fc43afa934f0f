use tracing::{debug, info};

use crate::bus::I2cBus;
use crate::config::ExporterConfig;
use crate::errors::StartupError;
use crate::sensor::scd4x::Scd4x;
use crate::sensor::Sensor;

/// Opens the I2C bus and brings the sensor into periodic measurement.
/// Any failure here is fatal: the exporter must not enter the polling
/// loop without a working sensor connection.
pub async fn init_sensor(config: &ExporterConfig) -> Result<Scd4x<I2cBus>, StartupError> {
    let bus = I2cBus::open(&config.i2c_path, config.i2c_address).map_err(|source| {
        StartupError::BusOpen {
            path: config.i2c_path.clone(),
            source,
        }
    })?;
    info!(
        path = %config.i2c_path,
        address = config.i2c_address,
        "I2C bus opened"
    );

    let mut sensor = Scd4x::new(bus)
        .with_compensation(config.ambient_pressure_pa, config.temperature_offset_c);

    // The sensor may still be in periodic mode from a previous run, and
    // the compensation commands are only accepted while idle. Stop first
    // to reach a known state; a failure here is not conclusive.
    if let Err(e) = sensor.stop().await {
        debug!(error = %e, "pre-init stop failed");
    }

    sensor.init().await.map_err(StartupError::SensorInit)?;
    info!("sensor initialized, periodic measurement running");
    Ok(sensor)
}
