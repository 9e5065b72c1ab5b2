use core::fmt;

/// Possible errors from the DHT driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum DhtError<E> {
    /// The sensor did not answer the wake request with its acknowledgment pulse.
    NoAck,
    /// The high pulse of a bit-slot never arrived.
    BitTimeout {
        /// Index of the bit-slot (0..40) that timed out.
        slot: u8,
    },
    /// Checksum did not match the received data.
    ChecksumMismatch {
        /// Checksum byte sent by the sensor.
        expected: u8,
        /// Checksum calculated over the four data bytes.
        calculated: u8,
    },
    /// A cached reading was requested but no valid frame has been acquired yet.
    NoReading,
    /// Error from the GPIO pin (input/output).
    PinError(E),
}

impl<E> From<E> for DhtError<E> {
    fn from(value: E) -> Self {
        Self::PinError(value)
    }
}

impl<E: fmt::Debug> fmt::Display for DhtError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhtError::NoAck => f.write_str("sensor did not acknowledge the wake request"),
            DhtError::BitTimeout { slot } => write!(f, "timed out waiting for bit {slot}"),
            DhtError::ChecksumMismatch {
                expected,
                calculated,
            } => write!(
                f,
                "checksum mismatch (expected {expected:#04x}, calculated {calculated:#04x})"
            ),
            DhtError::NoReading => f.write_str("no reading has been acquired yet"),
            DhtError::PinError(err) => write!(f, "pin error: {err:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for DhtError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_errors_convert() {
        let err: DhtError<&str> = "bus fault".into();
        assert_eq!(err, DhtError::PinError("bus fault"));
    }

    #[test]
    fn display_messages() {
        let err: DhtError<()> = DhtError::ChecksumMismatch {
            expected: 0x51,
            calculated: 0x50,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch (expected 0x51, calculated 0x50)"
        );
        assert_eq!(
            DhtError::<()>::BitTimeout { slot: 12 }.to_string(),
            "timed out waiting for bit 12"
        );
    }
}
