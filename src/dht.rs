use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::error::DhtError;
use crate::frame::{Frame, SensorVariant};
use crate::pulse::{InterruptControl, PulseReader};
use crate::units::convert_c_to_f;

/// Minimum time between two hardware acquisitions, in milliseconds.
///
/// Polling faster than this outpaces the sensor's conversion cycle.
pub const MIN_INTERVAL_MS: u32 = 2000;

/// A free-running millisecond counter.
///
/// The value may wrap; only differences between two readings are used.
pub trait Clock {
    /// Milliseconds since some fixed point (normally boot).
    fn now_ms(&self) -> u32;
}

impl<F> Clock for F
where
    F: Fn() -> u32,
{
    fn now_ms(&self) -> u32 {
        self()
    }
}

/// Reading returned by the sensor.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub relative_humidity: f32,
}

/// Last acquisition time and the last frame that passed validation.
#[derive(Clone, Copy, Debug, Default)]
struct ReadingCache {
    last_acquired_ms: Option<u32>,
    frame: Option<Frame>,
}

/// Driver for the DHT11, DHT21 and DHT22 temperature and humidity sensors.
pub struct Dht<PIN, D, I, C> {
    reader: PulseReader<PIN, D>,
    interrupts: I,
    clock: C,
    variant: SensorVariant,
    cache: ReadingCache,
}

impl<PIN, D, I, C, E> Dht<PIN, D, I, C>
where
    PIN: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayNs,
    I: InterruptControl,
    C: Clock,
{
    /// Creates a new instance of the DHT driver.
    ///
    /// # Arguments
    ///
    /// * `variant` - The sensor model, which selects how frames are decoded.
    /// * `pin` - The GPIO pin connected to the data line. Must support both input and output,
    ///   configured as open-drain with a pull-up.
    /// * `delay` - A delay provider implementing the `DelayNs` trait.
    /// * `interrupts` - Masks interrupts during the timing-critical part of a read.
    /// * `clock` - Millisecond clock used to enforce [`MIN_INTERVAL_MS`].
    pub fn new(variant: SensorVariant, pin: PIN, delay: D, interrupts: I, clock: C) -> Self {
        Dht {
            reader: PulseReader::new(pin, delay),
            interrupts,
            clock,
            variant,
            cache: ReadingCache::default(),
        }
    }

    /// The sensor model this driver decodes for.
    pub fn variant(&self) -> SensorVariant {
        self.variant
    }

    /// The most recent frame that passed checksum validation, if any.
    pub fn last_frame(&self) -> Option<Frame> {
        self.cache.frame
    }

    /// Releases the pin, delay provider, interrupt control and clock.
    pub fn release(self) -> (PIN, D, I, C) {
        let (pin, delay) = self.reader.release();
        (pin, delay, self.interrupts, self.clock)
    }

    /// Returns a validated frame, acquiring a new one from the sensor when allowed.
    ///
    /// Unless `force` is set, a call within [`MIN_INTERVAL_MS`] of the previous
    /// acquisition attempt returns the cached frame without touching the pin.
    /// The attempt time is recorded before talking to the sensor, so a failing
    /// sensor is not retried faster than the minimum interval either.
    ///
    /// # Errors
    ///
    /// * `DhtError::NoAck`, `DhtError::BitTimeout` or `DhtError::PinError` from the exchange.
    /// * `DhtError::ChecksumMismatch` if the received frame is corrupt. The previously
    ///   cached frame is kept.
    /// * `DhtError::NoReading` if the cache is used but holds no valid frame yet.
    pub fn read(&mut self, force: bool) -> Result<Frame, DhtError<E>> {
        let now = self.clock.now_ms();

        if !force {
            if let Some(last) = self.cache.last_acquired_ms {
                if now.wrapping_sub(last) < MIN_INTERVAL_MS {
                    #[cfg(feature = "defmt")]
                    defmt::trace!("dht: using cached frame");
                    return self.cache.frame.ok_or(DhtError::NoReading);
                }
            }
        }
        self.cache.last_acquired_ms = Some(now);

        let widths = self.reader.acquire(&mut self.interrupts)?;
        let frame = Frame::from_pulses(&widths).validate()?;

        #[cfg(feature = "defmt")]
        defmt::debug!("dht: acquired frame {}", frame);
        self.cache.frame = Some(frame);
        Ok(frame)
    }

    /// Reads temperature and humidity together.
    pub fn read_reading(&mut self, force: bool) -> Result<Reading, DhtError<E>> {
        let frame = self.read(force)?;
        let strategy = self.variant.strategy();
        Ok(Reading {
            temperature: strategy.temperature_from(&frame),
            relative_humidity: strategy.humidity_from(&frame),
        })
    }

    /// Reads the temperature in degrees Celsius, or Fahrenheit if `fahrenheit` is set.
    pub fn try_read_temperature(
        &mut self,
        fahrenheit: bool,
        force: bool,
    ) -> Result<f32, DhtError<E>> {
        let frame = self.read(force)?;
        let celsius = self.variant.strategy().temperature_from(&frame);
        Ok(if fahrenheit {
            convert_c_to_f(celsius)
        } else {
            celsius
        })
    }

    /// Reads the relative humidity in percent.
    pub fn try_read_humidity(&mut self, force: bool) -> Result<f32, DhtError<E>> {
        let frame = self.read(force)?;
        Ok(self.variant.strategy().humidity_from(&frame))
    }

    /// Like [`Dht::try_read_temperature`], returning `f32::NAN` on any failure.
    pub fn read_temperature(&mut self, fahrenheit: bool, force: bool) -> f32 {
        self.try_read_temperature(fahrenheit, force)
            .unwrap_or(f32::NAN)
    }

    /// Like [`Dht::try_read_humidity`], returning `f32::NAN` on any failure.
    pub fn read_humidity(&mut self, force: bool) -> f32 {
        self.try_read_humidity(force).unwrap_or(f32::NAN)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::pulse::tests::{CountingInterrupts, handshake, pulse, transmission};
    use crate::pulse::{ACK_TIMEOUT_US, BIT_TIMEOUT_US, NoopInterruptControl};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTx,
    };

    const DHT11_FRAME: [u8; 5] = [55, 0, 26, 0, 81];
    const DHT22_FRAME: [u8; 5] = [0x01, 0x90, 0x00, 0xC8, 0x59];

    fn no_ack() -> Vec<PinTx> {
        let mut tx = handshake();
        tx.extend((0..ACK_TIMEOUT_US).map(|_| PinTx::get(PinState::Low)));
        tx
    }

    #[test]
    fn test_read_dht11() {
        let mut pin = PinMock::new(&transmission(DHT11_FRAME));
        let now = Cell::new(0u32);

        let mut dht = Dht::new(
            SensorVariant::Dht11,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        let reading = dht.read_reading(false).unwrap();

        assert_eq!(
            reading,
            Reading {
                relative_humidity: 55.0,
                temperature: 26.0,
            }
        );
        assert_eq!(dht.last_frame(), Some(Frame::from_bytes(DHT11_FRAME)));
        pin.done();
    }

    #[test]
    fn test_read_dht22_fahrenheit() {
        let mut pin = PinMock::new(&transmission(DHT22_FRAME));
        let now = Cell::new(5_000u32);

        let mut dht = Dht::new(
            SensorVariant::Dht22,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        assert_eq!(dht.read_temperature(true, false), 68.0);
        // Served from the cache, no further pin traffic
        assert_eq!(dht.read_humidity(false), 40.0);
        assert_eq!(dht.read_temperature(false, false), 20.0);

        pin.done();
    }

    #[test]
    fn test_cached_within_interval() {
        let mut pin = PinMock::new(&transmission(DHT22_FRAME));
        let now = Cell::new(0u32);

        let mut dht = Dht::new(
            SensorVariant::Dht22,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        let first = dht.read(false).unwrap();
        now.set(MIN_INTERVAL_MS - 1);
        let second = dht.read(false).unwrap();

        assert_eq!(first.bytes(), second.bytes());
        pin.done();
    }

    #[test]
    fn test_reacquires_after_interval() {
        let mut expect = transmission(DHT22_FRAME);
        expect.extend(transmission(DHT11_FRAME));
        let mut pin = PinMock::new(&expect);
        let now = Cell::new(0u32);

        let mut dht = Dht::new(
            SensorVariant::Dht22,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        assert_eq!(dht.read(false).unwrap().bytes(), DHT22_FRAME);
        now.set(MIN_INTERVAL_MS);
        assert_eq!(dht.read(false).unwrap().bytes(), DHT11_FRAME);

        pin.done();
    }

    #[test]
    fn test_interval_survives_clock_wrap() {
        let mut expect = transmission(DHT22_FRAME);
        expect.extend(transmission(DHT11_FRAME));
        let mut pin = PinMock::new(&expect);
        let now = Cell::new(u32::MAX - 500);

        let mut dht = Dht::new(
            SensorVariant::Dht22,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        dht.read(false).unwrap();
        now.set(1_000);
        assert_eq!(dht.read(false).unwrap().bytes(), DHT22_FRAME);
        now.set(1_600);
        assert_eq!(dht.read(false).unwrap().bytes(), DHT11_FRAME);

        pin.done();
    }

    #[test]
    fn test_force_always_acquires() {
        let mut expect = transmission(DHT22_FRAME);
        expect.extend(transmission(DHT11_FRAME));
        let mut pin = PinMock::new(&expect);
        let now = Cell::new(0u32);

        let mut dht = Dht::new(
            SensorVariant::Dht22,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        dht.read(true).unwrap();
        assert_eq!(dht.read(true).unwrap().bytes(), DHT11_FRAME);

        pin.done();
    }

    #[test]
    fn test_checksum_mismatch_keeps_cached_frame() {
        let mut expect = transmission(DHT22_FRAME);
        expect.extend(transmission([0x01, 0x90, 0x00, 0xC8, 0x58]));
        let mut pin = PinMock::new(&expect);
        let now = Cell::new(0u32);

        let mut dht = Dht::new(
            SensorVariant::Dht22,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        dht.read(false).unwrap();
        assert_eq!(
            dht.read(true).unwrap_err(),
            DhtError::ChecksumMismatch {
                expected: 0x58,
                calculated: 0x59,
            }
        );
        assert_eq!(dht.last_frame(), Some(Frame::from_bytes(DHT22_FRAME)));
        // Failed attempt still counts; the old valid frame is served
        assert_eq!(dht.read(false).unwrap().bytes(), DHT22_FRAME);

        pin.done();
    }

    #[test]
    fn test_bit_timeout_caches_nothing() {
        let mut expect = handshake();
        expect.extend(pulse(80));
        expect.extend((0..BIT_TIMEOUT_US).map(|_| PinTx::get(PinState::Low)));
        let mut pin = PinMock::new(&expect);
        let now = Cell::new(0u32);
        let mut interrupts = CountingInterrupts::default();

        let mut dht = Dht::new(
            SensorVariant::Dht22,
            pin.clone(),
            NoopDelay,
            &mut interrupts,
            || now.get(),
        );
        assert_eq!(
            dht.read(false).unwrap_err(),
            DhtError::BitTimeout { slot: 0 }
        );
        assert_eq!(dht.last_frame(), None);
        // Within the interval there is nothing to fall back on
        assert_eq!(dht.read(false).unwrap_err(), DhtError::NoReading);
        drop(dht);

        assert_eq!(interrupts.enabled, 1);
        pin.done();
    }

    #[test]
    fn test_failures_collapse_to_nan() {
        let mut expect = no_ack();
        expect.extend(no_ack());
        let mut pin = PinMock::new(&expect);
        let now = Cell::new(0u32);

        let mut dht = Dht::new(
            SensorVariant::Dht11,
            pin.clone(),
            NoopDelay,
            NoopInterruptControl,
            || now.get(),
        );
        assert!(dht.read_temperature(false, true).is_nan());
        assert!(dht.read_humidity(true).is_nan());
        assert!(dht.read_humidity(false).is_nan());

        pin.done();
    }

    #[test]
    fn test_release_returns_resources() {
        let pin = PinMock::new(&[]);
        let dht = Dht::new(
            SensorVariant::Dht21,
            pin,
            NoopDelay,
            NoopInterruptControl,
            || 0u32,
        );
        assert_eq!(dht.variant(), SensorVariant::Dht21);

        let (mut pin, _delay, _interrupts, _clock) = dht.release();
        pin.done();
    }
}
