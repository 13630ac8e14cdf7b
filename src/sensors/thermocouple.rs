//! MAX6675 K-type thermocouple converter.
//!
//! The chip shifts out one 16-bit frame per conversion:
//!
//! ```text
//!  15   14 ........................ 3    2     1    0
//! ┌───┬──────────────────────────────┬─────┬─────┬────┐
//! │ 0 │  12-bit temperature (0.25 °C)│ OPEN│ ID  │ Z  │
//! └───┴──────────────────────────────┴─────┴─────┴────┘
//! ```
//!
//! A conversion takes up to 220 ms, so callers should not poll faster than
//! a few Hz (the sensor task uses `sensor_read_interval_ms`).

use embedded_hal::spi::SpiDevice;

use crate::app::ports::TemperatureSensor;
use crate::error::SensorError;

/// Bit set by the converter when the thermocouple input is open.
const OPEN_INPUT_BIT: u16 = 0x0004;
/// °C per LSB of the 12-bit reading.
const DEGREES_PER_LSB: f32 = 0.25;

/// Decode a raw MAX6675 frame into degrees Celsius.
pub fn decode_frame(raw: u16) -> Result<f32, SensorError> {
    if raw & OPEN_INPUT_BIT != 0 {
        return Err(SensorError::OpenCircuit);
    }
    Ok(f32::from(raw >> 3) * DEGREES_PER_LSB)
}

/// MAX6675 driver over any `embedded-hal` SPI device.
pub struct Max6675<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Max6675<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Read one raw frame.
    pub fn read_raw(&mut self) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.spi
            .read(&mut buf)
            .map_err(|_| SensorError::BusFailed)?;
        Ok(u16::from_be_bytes(buf))
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> TemperatureSensor for Max6675<SPI> {
    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        decode_frame(self.read_raw()?)
    }
}
