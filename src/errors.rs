use thiserror::Error;

use crate::bus::I2cError;

/// Failure of a single bus exchange. The driver retries these inside
/// `send_command`; exhaustion surfaces them as [`SensorError::Transport`].
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I2C transfer failed: {0}")]
    I2c(#[from] I2cError),

    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the sensor driver. Transport failures have already
/// been retried by the time they appear here; checksum failures are never
/// retried.
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("bus transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("checksum mismatch for response word {index}: computed {computed:#04x}, received {received:#04x}")]
    Checksum {
        index: usize,
        computed: u8,
        received: u8,
    },

    #[error("command arguments length {len} is not a multiple of two")]
    OddArguments { len: usize },
}

/// Configuration loading errors. All of these are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration from '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration format: {0}")]
    Format(#[from] toml::de::Error),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Fatal startup failures. Steady-state errors never reach this type: once
/// the polling loop is running, transport and protocol failures are
/// absorbed by the poller and surfaced only as logs, metrics and the
/// health flag.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open I2C bus '{path}': {source}")]
    BusOpen {
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("sensor initialization failed: {0}")]
    SensorInit(#[source] SensorError),

    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("HTTP server error: {0}")]
    Http(#[from] std::io::Error),
}

pub type SensorResult<T> = Result<T, SensorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
