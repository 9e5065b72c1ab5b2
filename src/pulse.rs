//! Pin timing driver for the DHT single-wire protocol.
//!
//! Drives the wake/handshake sequence on the data line and measures the
//! width of the 40 high pulses the sensor answers with. Classification of
//! the widths into bits and frame assembly happen in [`crate::frame`].

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::error::DhtError;

/// Number of bit-slots in one transmission (5 bytes, 8 bits each).
pub const BIT_SLOTS: usize = 40;

/// Time the line is held released (high) before the wake request.
pub const IDLE_HIGH_MS: u32 = 250;

/// Duration of the wake request (line driven low).
pub const WAKE_LOW_MS: u32 = 20;

/// Settle time after releasing the line, before listening for the sensor.
pub const RELEASE_SETTLE_US: u32 = 40;

/// Upper bound for the sensor's acknowledgment pulse.
///
/// The sensor pulls low and then high for ~80us each, so this must exceed 160us.
pub const ACK_TIMEOUT_US: u32 = 200;

/// Upper bound for a single bit-slot: ~50us low followed by up to ~70us high.
pub const BIT_TIMEOUT_US: u32 = 150;

/// High pulses longer than this decode as a `1` bit.
///
/// Midpoint between the nominal 26-28us (`0`) and 70us (`1`) pulses.
pub const ONE_THRESHOLD_US: u32 = 50;

/// Classifies a measured high-pulse width as a bit value.
pub fn is_one(width_us: u32) -> bool {
    width_us > ONE_THRESHOLD_US
}

/// Masks and unmasks interrupts around the timing-critical part of a read.
pub trait InterruptControl {
    /// Suppresses interrupts that could disturb pulse timing.
    fn disable(&mut self);
    /// Restores interrupts.
    fn enable(&mut self);
}

impl<T: InterruptControl + ?Sized> InterruptControl for &mut T {
    fn disable(&mut self) {
        T::disable(self)
    }

    fn enable(&mut self) {
        T::enable(self)
    }
}

/// An [`InterruptControl`] that does nothing.
///
/// Useful on hosts where masking is not possible, or when the caller already
/// runs with interrupts disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInterruptControl;

impl InterruptControl for NoopInterruptControl {
    fn disable(&mut self) {}
    fn enable(&mut self) {}
}

/// An [`InterruptControl`] backed by the `critical-section` crate.
#[cfg(feature = "critical-section")]
#[derive(Debug, Default)]
pub struct CriticalSectionInterrupts {
    restore: Option<critical_section::RestoreState>,
}

#[cfg(feature = "critical-section")]
impl InterruptControl for CriticalSectionInterrupts {
    fn disable(&mut self) {
        if self.restore.is_none() {
            // SAFETY: the matching release happens in `enable`, which the
            // interrupt guard always calls before the exchange returns.
            self.restore = Some(unsafe { critical_section::acquire() });
        }
    }

    fn enable(&mut self) {
        if let Some(state) = self.restore.take() {
            // SAFETY: `state` came from the `acquire` in `disable` and is released once.
            unsafe { critical_section::release(state) };
        }
    }
}

/// Keeps interrupts masked for as long as it is alive.
struct InterruptGuard<'a, I: InterruptControl> {
    interrupts: &'a mut I,
}

impl<'a, I: InterruptControl> InterruptGuard<'a, I> {
    fn new(interrupts: &'a mut I) -> Self {
        interrupts.disable();
        InterruptGuard { interrupts }
    }
}

impl<I: InterruptControl> Drop for InterruptGuard<'_, I> {
    fn drop(&mut self) {
        self.interrupts.enable();
    }
}

/// Owns the data pin and delay provider and performs raw exchanges with the sensor.
///
/// The pin must be configured as open-drain with a pull-up: `set_low` drives
/// the line, `set_high` releases it so the sensor can pull it low.
///
/// Pulse widths are counted in polls of the pin, one `delay_us(1)` each, and
/// compared against [`ONE_THRESHOLD_US`]. The delay provider must therefore
/// wait close to 1us per call and `is_high` must be fast; a delay that
/// overshoots shrinks the counted width and can turn `1` bits into `0`s.
#[derive(Debug)]
pub struct PulseReader<PIN, D> {
    pin: PIN,
    delay: D,
}

impl<PIN, D, E> PulseReader<PIN, D>
where
    PIN: InputPin<Error = E> + OutputPin<Error = E>,
    D: DelayNs,
{
    /// Creates a reader over the given data pin and delay provider.
    pub fn new(pin: PIN, delay: D) -> Self {
        PulseReader { pin, delay }
    }

    /// Returns the pin and delay provider.
    pub fn release(self) -> (PIN, D) {
        (self.pin, self.delay)
    }

    /// Runs one complete exchange and returns the 40 measured high-pulse widths.
    ///
    /// The acknowledgment wait and the bit phase run with interrupts masked
    /// through `interrupts`; they are restored on every exit path. The line is
    /// left released so it is idle for the next cycle.
    ///
    /// # Errors
    ///
    /// * `DhtError::NoAck` if the sensor does not acknowledge the wake request.
    /// * `DhtError::BitTimeout` if any bit-slot pulse is missing.
    /// * `DhtError::PinError` if the HAL reports an error.
    pub fn acquire<I: InterruptControl>(
        &mut self,
        interrupts: &mut I,
    ) -> Result<[u32; BIT_SLOTS], DhtError<E>> {
        let result = self.exchange(interrupts);
        if let Err(DhtError::PinError(_)) = result {
            // Keep the first error; the line may already be unusable.
            let _ = self.pin.set_high();
        }
        result
    }

    fn exchange<I: InterruptControl>(
        &mut self,
        interrupts: &mut I,
    ) -> Result<[u32; BIT_SLOTS], DhtError<E>> {
        self.wake()?;

        let _masked = InterruptGuard::new(interrupts);
        self.pin.set_high()?;
        self.delay.delay_us(RELEASE_SETTLE_US);

        if self.pulse_in(ACK_TIMEOUT_US)? == 0 {
            #[cfg(feature = "defmt")]
            defmt::debug!("dht: no acknowledgment from sensor");
            return Err(DhtError::NoAck);
        }

        let mut widths = [0; BIT_SLOTS];
        for (slot, width) in widths.iter_mut().enumerate() {
            *width = self.pulse_in(BIT_TIMEOUT_US)?;
            if *width == 0 {
                #[cfg(feature = "defmt")]
                defmt::debug!("dht: bit-slot {=usize} timed out", slot);
                return Err(DhtError::BitTimeout { slot: slot as u8 });
            }
        }

        Ok(widths)
    }

    /// Sends the host side of the handshake: idle high, then the low wake request.
    fn wake(&mut self) -> Result<(), DhtError<E>> {
        self.pin.set_high()?;
        self.delay.delay_ms(IDLE_HIGH_MS);
        self.pin.set_low()?;
        self.delay.delay_ms(WAKE_LOW_MS);
        Ok(())
    }

    /// Measures the width of the next high pulse in microseconds.
    ///
    /// A high level already in progress is skipped, then the rising edge is
    /// awaited and the pulse is timed until it falls. The timeout covers the
    /// whole measurement, one poll per microsecond.
    ///
    /// Returns `0` on timeout.
    fn pulse_in(&mut self, timeout_us: u32) -> Result<u32, E> {
        let mut phase = Phase::Trailing;
        let mut width = 0;

        for _ in 0..timeout_us {
            let high = self.pin.is_high()?;
            phase = match (phase, high) {
                (Phase::Trailing, true) => Phase::Trailing,
                (Phase::Trailing, false) | (Phase::Idle, false) => Phase::Idle,
                (Phase::Idle, true) | (Phase::Pulse, true) => {
                    width += 1;
                    Phase::Pulse
                }
                (Phase::Pulse, false) => return Ok(width),
            };
            self.delay.delay_us(1);
        }

        Ok(0)
    }
}

#[derive(Clone, Copy)]
enum Phase {
    /// Waiting for a previous high level to end.
    Trailing,
    /// Line is low, waiting for the rising edge.
    Idle,
    /// Inside the pulse being measured.
    Pulse,
}
