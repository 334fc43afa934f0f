#[cfg(target_os = "linux")]
use i2cdev::core::I2CDevice;
#[cfg(target_os = "linux")]
use i2cdev::linux::LinuxI2CDevice;

use crate::errors::TransportError;

/// Platform-specific I2C error type
#[cfg(target_os = "linux")]
pub type I2cError = i2cdev::linux::LinuxI2CError;

#[cfg(not(target_os = "linux"))]
#[derive(Debug, thiserror::Error)]
#[error("I2C is only supported on Linux")]
pub struct I2cError;

/// A single blocking exchange on the physical bus: the write buffer is
/// transmitted first if non-empty, then the read buffer is filled if
/// non-empty. This is the only point of contact with hardware; everything
/// above it is transport-agnostic.
pub trait BusTransport: Send {
    fn transact(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), TransportError>;
}

/// Bus transport backed by a Linux I2C character device, bound to a single
/// slave address at open time.
#[cfg(target_os = "linux")]
pub struct I2cBus {
    device: LinuxI2CDevice,
}

#[cfg(not(target_os = "linux"))]
pub struct I2cBus {
    _phantom: std::marker::PhantomData<()>,
}

#[cfg(target_os = "linux")]
impl I2cBus {
    pub fn open(path: &str, address: u16) -> Result<Self, TransportError> {
        let device = LinuxI2CDevice::new(path, address).map_err(TransportError::I2c)?;
        Ok(Self { device })
    }
}

#[cfg(target_os = "linux")]
impl BusTransport for I2cBus {
    fn transact(&mut self, write: &[u8], read: &mut [u8]) -> Result<(), TransportError> {
        if !write.is_empty() {
            self.device.write(write).map_err(TransportError::I2c)?;
        }
        if !read.is_empty() {
            self.device.read(read).map_err(TransportError::I2c)?;
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl I2cBus {
    pub fn open(_path: &str, _address: u16) -> Result<Self, TransportError> {
        Err(TransportError::I2c(I2cError))
    }
}

#[cfg(not(target_os = "linux"))]
impl BusTransport for I2cBus {
    fn transact(&mut self, _write: &[u8], _read: &mut [u8]) -> Result<(), TransportError> {
        Err(TransportError::I2c(I2cError))
    }
}
