use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use super::{Measurement, Sensor};
use crate::bus::BusTransport;
use crate::errors::{SensorError, SensorResult};

// Command opcodes from the SCD4x datasheet
const CMD_START_PERIODIC_MEASUREMENT: u16 = 0x21b1;
const CMD_STOP_PERIODIC_MEASUREMENT: u16 = 0x3f86;
const CMD_GET_DATA_READY_STATUS: u16 = 0xe4b8;
const CMD_READ_MEASUREMENT: u16 = 0xec05;
const CMD_SET_AMBIENT_PRESSURE: u16 = 0xe000;
const CMD_SET_TEMPERATURE_OFFSET: u16 = 0x241d;

/// Only the low 11 bits of the data-ready status word are meaningful.
const DATA_READY_MASK: u16 = 0x07ff;

/// Write attempts per command, with a fixed pause in between.
const SEND_ATTEMPTS: u32 = 3;
const SEND_RETRY_PAUSE: Duration = Duration::from_millis(50);

/// The sensor answers no other command for 500 ms after stop.
const STOP_SETTLE: Duration = Duration::from_millis(500);
const STATUS_DELAY: Duration = Duration::from_millis(3);
const READ_DELAY: Duration = Duration::from_millis(2);

/// Protocol driver for the SCD4x CO2/temperature/humidity sensor family.
/// Owns the bus transport; all timing mandated by the datasheet lives
/// here, as blocking waits scoped to the polling task.
pub struct Scd4x<B> {
    bus: B,
    ambient_pressure_pa: Option<u32>,
    temperature_offset_c: Option<f32>,
}

impl<B: BusTransport> Scd4x<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            ambient_pressure_pa: None,
            temperature_offset_c: None,
        }
    }

    /// Compensation settings applied on every `init`, so they survive the
    /// stop/re-init recovery cycle. The offset and pressure registers are
    /// volatile and revert on sensor reset.
    pub fn with_compensation(
        mut self,
        ambient_pressure_pa: Option<u32>,
        temperature_offset_c: Option<f32>,
    ) -> Self {
        self.ambient_pressure_pa = ambient_pressure_pa;
        self.temperature_offset_c = temperature_offset_c;
        self
    }

    /// Frame and write a command: opcode big-endian, then each 2-byte
    /// argument word followed by its CRC. Retries the write on transport
    /// failure; checksum validation of responses happens in `read_words`.
    async fn send_command(&mut self, opcode: u16, args: &[u8]) -> SensorResult<()> {
        if args.len() % 2 != 0 {
            return Err(SensorError::OddArguments { len: args.len() });
        }

        let mut frame = Vec::with_capacity(2 + args.len() / 2 * 3);
        frame.extend_from_slice(&opcode.to_be_bytes());
        for word in args.chunks_exact(2) {
            frame.extend_from_slice(word);
            frame.push(crc8(word));
        }

        let mut attempt = 1;
        loop {
            match self.bus.transact(&frame, &mut []) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < SEND_ATTEMPTS => {
                    debug!(opcode, attempt, error = %e, "command write failed, retrying");
                    attempt += 1;
                    sleep(SEND_RETRY_PAUSE).await;
                }
                Err(e) => return Err(SensorError::Transport(e)),
            }
        }
    }

    /// Read `N` response words, validating each word's checksum
    /// independently. A single bad word invalidates the whole response.
    async fn read_words<const N: usize>(&mut self) -> SensorResult<[u16; N]> {
        let mut buf = vec![0u8; N * 3];
        self.bus.transact(&[], &mut buf)?;

        let mut words = [0u16; N];
        for (index, chunk) in buf.chunks_exact(3).enumerate() {
            let computed = crc8(&chunk[..2]);
            if computed != chunk[2] {
                return Err(SensorError::Checksum {
                    index,
                    computed,
                    received: chunk[2],
                });
            }
            words[index] = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
        Ok(words)
    }
}

#[async_trait]
impl<B: BusTransport> Sensor for Scd4x<B> {
    async fn init(&mut self) -> SensorResult<()> {
        if let Some(offset) = self.temperature_offset_c {
            let word = ((offset * 65535.0 / 175.0).round() as u16).to_be_bytes();
            self.send_command(CMD_SET_TEMPERATURE_OFFSET, &word).await?;
        }
        if let Some(pressure) = self.ambient_pressure_pa {
            // The sensor takes ambient pressure in hectopascals
            let word = ((pressure / 100) as u16).to_be_bytes();
            self.send_command(CMD_SET_AMBIENT_PRESSURE, &word).await?;
        }
        info!("sending start measurement command to SCD4x");
        self.send_command(CMD_START_PERIODIC_MEASUREMENT, &[]).await
    }

    async fn stop(&mut self) -> SensorResult<()> {
        self.send_command(CMD_STOP_PERIODIC_MEASUREMENT, &[]).await?;
        // The sensor responds to other commands only 500 ms after
        // stop_periodic_measurement has been issued.
        sleep(STOP_SETTLE).await;
        Ok(())
    }

    async fn is_measuring(&mut self) -> SensorResult<bool> {
        self.send_command(CMD_GET_DATA_READY_STATUS, &[]).await?;
        sleep(STATUS_DELAY).await;

        let [status] = self.read_words::<1>().await?;
        Ok(status & DATA_READY_MASK != 0)
    }

    async fn read(&mut self) -> SensorResult<Measurement> {
        self.send_command(CMD_READ_MEASUREMENT, &[]).await?;
        sleep(READ_DELAY).await;

        let [co2_raw, temp_raw, hum_raw] = self.read_words::<3>().await?;
        Ok(Measurement {
            co2_ppm: co2_raw as f32,
            temperature_c: -45.0 + 175.0 * temp_raw as f32 / 65535.0,
            humidity_pct: 100.0 * hum_raw as f32 / 65535.0,
        })
    }
}

/// CRC-8 as used by the sensor for every 2-byte word: polynomial 0x31,
/// initial value 0xFF, MSB-first, no final XOR.
pub(crate) fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xff;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedBus;

    fn word_with_crc(word: u16) -> Vec<u8> {
        let bytes = word.to_be_bytes();
        vec![bytes[0], bytes[1], crc8(&bytes)]
    }

    #[test]
    fn crc8_matches_datasheet_vector() {
        assert_eq!(crc8(&[0xbe, 0xef]), 0x92);
    }

    #[test]
    fn crc8_rejects_single_bit_corruption() {
        let data = [0xbe, 0xef];
        let good = crc8(&data);
        for byte in 0..2 {
            for bit in 0..8 {
                let mut corrupted = data;
                corrupted[byte] ^= 1 << bit;
                assert_ne!(crc8(&corrupted), good, "flip of byte {byte} bit {bit} went undetected");
            }
        }
    }

    #[tokio::test]
    async fn init_writes_start_command() {
        let mut sensor = Scd4x::new(ScriptedBus::new());
        sensor.init().await.unwrap();
        assert_eq!(sensor.bus.writes, vec![vec![0x21, 0xb1]]);
    }

    #[tokio::test]
    async fn init_applies_compensation_before_start() {
        let mut sensor =
            Scd4x::new(ScriptedBus::new()).with_compensation(Some(88_557), Some(4.0));
        sensor.init().await.unwrap();

        // 4.0 degC -> round(4 * 65535 / 175) = 1498 = 0x05da
        let offset_word = [0x05, 0xda];
        // 88557 Pa -> 885 hPa = 0x0375
        let pressure_word = [0x03, 0x75];
        assert_eq!(
            sensor.bus.writes,
            vec![
                vec![0x24, 0x1d, offset_word[0], offset_word[1], crc8(&offset_word)],
                vec![0xe0, 0x00, pressure_word[0], pressure_word[1], crc8(&pressure_word)],
                vec![0x21, 0xb1],
            ]
        );
    }

    #[tokio::test]
    async fn send_command_rejects_odd_argument_length() {
        let mut sensor = Scd4x::new(ScriptedBus::new());
        let err = sensor.send_command(0xe000, &[0x03]).await.unwrap_err();
        assert!(matches!(err, SensorError::OddArguments { len: 1 }));
        assert!(sensor.bus.writes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn send_command_retries_then_succeeds() {
        let mut bus = ScriptedBus::new();
        bus.fail_next_writes = 2;
        let mut sensor = Scd4x::new(bus);

        sensor.init().await.unwrap();
        // two failed attempts leave no trace in writes; the third lands
        assert_eq!(sensor.bus.writes, vec![vec![0x21, 0xb1]]);
        assert_eq!(sensor.bus.write_attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn send_command_gives_up_after_three_attempts() {
        let mut bus = ScriptedBus::new();
        bus.fail_next_writes = usize::MAX;
        let mut sensor = Scd4x::new(bus);

        let err = sensor.init().await.unwrap_err();
        assert!(matches!(err, SensorError::Transport(_)));
        assert_eq!(sensor.bus.write_attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn data_ready_uses_low_eleven_bits() {
        for (status, ready) in [(0x0000u16, false), (0x0001, true), (0x0800, false)] {
            let mut bus = ScriptedBus::new();
            bus.push_read(word_with_crc(status));
            let mut sensor = Scd4x::new(bus);
            assert_eq!(
                sensor.is_measuring().await.unwrap(),
                ready,
                "status {status:#06x}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn is_measuring_rejects_bad_checksum() {
        let mut bus = ScriptedBus::new();
        bus.push_read(vec![0x00, 0x01, 0x00]);
        let mut sensor = Scd4x::new(bus);

        let err = sensor.is_measuring().await.unwrap_err();
        assert!(matches!(err, SensorError::Checksum { index: 0, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn read_decodes_physical_units() {
        let mut bus = ScriptedBus::new();
        let mut response = word_with_crc(800);
        response.extend(word_with_crc(0x6667));
        response.extend(word_with_crc(0x6667));
        bus.push_read(response);
        let mut sensor = Scd4x::new(bus);

        let m = sensor.read().await.unwrap();
        assert_eq!(m.co2_ppm, 800.0);
        assert!((m.temperature_c - 25.0).abs() < 0.01);
        assert!((m.humidity_pct - 40.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn read_conversion_endpoints() {
        let cases = [
            // (temp word, hum word, expected degC, expected %RH)
            (0u16, 0u16, -45.0f32, 0.0f32),
            (65535, 32768, 130.0, 100.0 * 32768.0 / 65535.0),
        ];
        for (temp_word, hum_word, expect_c, expect_rh) in cases {
            let mut bus = ScriptedBus::new();
            let mut response = word_with_crc(0);
            response.extend(word_with_crc(temp_word));
            response.extend(word_with_crc(hum_word));
            bus.push_read(response);
            let mut sensor = Scd4x::new(bus);

            let m = sensor.read().await.unwrap();
            assert!((m.temperature_c - expect_c).abs() < 0.01);
            assert!((m.humidity_pct - expect_rh).abs() < 0.01);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_rejects_any_corrupt_word() {
        // corrupt the middle word only; the whole response must be refused
        let mut bus = ScriptedBus::new();
        let mut response = word_with_crc(800);
        response.extend(vec![0x66, 0x67, 0x00]);
        response.extend(word_with_crc(0x6667));
        bus.push_read(response);
        let mut sensor = Scd4x::new(bus);

        let err = sensor.read().await.unwrap_err();
        assert!(matches!(err, SensorError::Checksum { index: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_settles_each_time() {
        let mut sensor = Scd4x::new(ScriptedBus::new());

        let before = tokio::time::Instant::now();
        sensor.stop().await.unwrap();
        sensor.stop().await.unwrap();
        let elapsed = before.elapsed();

        assert_eq!(sensor.bus.writes.len(), 2);
        assert!(elapsed >= Duration::from_millis(1000), "each stop must settle independently");
    }
}
