use crate::error::DhtError;
use crate::pulse::{self, BIT_SLOTS};

/// The sensor models handled by this driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorVariant {
    /// DHT11: integral humidity and temperature, no sign.
    Dht11,
    /// DHT21 (AM2301).
    Dht21,
    /// DHT22 (AM2302).
    Dht22,
}

impl SensorVariant {
    /// Returns the decode rules for this variant.
    pub fn strategy(self) -> &'static dyn DecodeStrategy {
        match self {
            SensorVariant::Dht11 => &Dht11Decode,
            SensorVariant::Dht21 | SensorVariant::Dht22 => &Dht22Decode,
        }
    }
}

/// One 5-byte transmission: `[h_int, h_frac, t_int, t_frac, checksum]`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame([u8; 5]);

impl Frame {
    /// Wraps raw bytes without validating them.
    pub const fn from_bytes(bytes: [u8; 5]) -> Self {
        Frame(bytes)
    }

    /// Packs 40 pulse widths into bytes, most significant bit first, in slot order.
    pub fn from_pulses(widths: &[u32; BIT_SLOTS]) -> Self {
        let mut bytes = [0u8; 5];
        for (slot, width) in widths.iter().enumerate() {
            bytes[slot / 8] <<= 1;
            if pulse::is_one(*width) {
                bytes[slot / 8] |= 1;
            }
        }
        Frame(bytes)
    }

    /// Raw bytes of the frame.
    pub fn bytes(&self) -> [u8; 5] {
        self.0
    }

    /// Integral part of the humidity (high byte on DHT21/DHT22).
    pub fn humidity_int(&self) -> u8 {
        self.0[0]
    }

    /// Fractional part of the humidity (low byte on DHT21/DHT22).
    pub fn humidity_frac(&self) -> u8 {
        self.0[1]
    }

    /// Integral part of the temperature; bit 7 is the sign on DHT21/DHT22.
    pub fn temperature_int(&self) -> u8 {
        self.0[2]
    }

    /// Fractional part of the temperature (low byte on DHT21/DHT22).
    pub fn temperature_frac(&self) -> u8 {
        self.0[3]
    }

    /// The checksum byte sent by the sensor.
    pub fn checksum(&self) -> u8 {
        self.0[4]
    }

    /// Sum of the four data bytes, modulo 256.
    pub fn calculated_checksum(&self) -> u8 {
        self.0[..4].iter().fold(0u8, |sum, v| sum.wrapping_add(*v))
    }

    /// Returns the frame if its checksum matches its data.
    pub fn validate<E>(self) -> Result<Self, DhtError<E>> {
        let calculated = self.calculated_checksum();
        if calculated != self.checksum() {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "dht: checksum mismatch, frame {=[u8]:#04x}, calculated {=u8:#04x}",
                &self.0[..],
                calculated
            );
            Err(DhtError::ChecksumMismatch {
                expected: self.checksum(),
                calculated,
            })
        } else {
            Ok(self)
        }
    }
}

/// Turns a validated frame into physical values.
pub trait DecodeStrategy {
    /// Relative humidity in percent.
    fn humidity_from(&self, frame: &Frame) -> f32;
    /// Temperature in degrees Celsius.
    fn temperature_from(&self, frame: &Frame) -> f32;
}

/// DHT11 frames carry whole units in the integral bytes.
#[derive(Clone, Copy, Debug)]
pub struct Dht11Decode;

impl DecodeStrategy for Dht11Decode {
    fn humidity_from(&self, frame: &Frame) -> f32 {
        frame.humidity_int() as f32
    }

    fn temperature_from(&self, frame: &Frame) -> f32 {
        frame.temperature_int() as f32
    }
}

/// DHT21/DHT22 frames carry tenths as 16-bit big-endian values, temperature
/// in sign-magnitude form.
#[derive(Clone, Copy, Debug)]
pub struct Dht22Decode;

impl DecodeStrategy for Dht22Decode {
    fn humidity_from(&self, frame: &Frame) -> f32 {
        let joined_humidity = u16::from_be_bytes([frame.humidity_int(), frame.humidity_frac()]);
        joined_humidity as f32 / 10.0
    }

    fn temperature_from(&self, frame: &Frame) -> f32 {
        let temp_hi = frame.temperature_int();
        let is_temp_negative = (temp_hi >> 7) != 0;
        let joined_temp = u16::from_be_bytes([temp_hi & 0b0111_1111, frame.temperature_frac()]);
        let temperature = joined_temp as f32 / 10.0;
        if is_temp_negative {
            -temperature
        } else {
            temperature
        }
    }
}
