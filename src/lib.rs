//! DHT Sensor Driver for Embedded Rust
//!
//! This crate provides a platform-agnostic driver for the DHT11, DHT21 (AM2301)
//! and DHT22 (AM2302) temperature and humidity sensors, built on top of the
//! [`embedded-hal`] traits.
//!
//! # Features
//! - Blocking synchronous API using `embedded-hal` traits
//! - Designed for `no_std` environments
//! - Interrupts masked during the timing-critical part of a read
//! - Last reading cached to respect the sensor's minimum read interval
//! - Celsius/Fahrenheit conversion and heat index
//!
//! # Dependencies
//! This driver depends on the following `embedded-hal` traits:
//! - [`InputPin`] and [`OutputPin`] for GPIO access
//! - [`DelayNs`] for accurate timing
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` for logging support and emits driver events
//! - `critical-section`: Provides [`CriticalSectionInterrupts`] for masking interrupts
//!
//! # Example
//!
//! ```ignore
//! use dht_sensor::{Dht, NoopInterruptControl, SensorVariant};
//!
//! let mut dht = Dht::new(SensorVariant::Dht22, pin, delay, NoopInterruptControl, || millis());
//! match dht.read_reading(false) {
//!     Ok(reading) => { /* reading.temperature, reading.relative_humidity */ }
//!     Err(err) => { /* retry after the minimum interval */ }
//! }
//! ```
//!
//! [`embedded-hal`]: https://docs.rs/embedded-hal
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(test), no_std)]

pub mod dht;
pub mod error;
pub mod frame;
pub mod pulse;
pub mod units;

pub use dht::{Clock, Dht, MIN_INTERVAL_MS, Reading};
pub use error::DhtError;
pub use frame::{DecodeStrategy, Frame, SensorVariant};
#[cfg(feature = "critical-section")]
pub use pulse::CriticalSectionInterrupts;
pub use pulse::{InterruptControl, NoopInterruptControl, PulseReader};
pub use units::{compute_heat_index, convert_c_to_f, convert_f_to_c};
