//! `hatflow-hal` – the hardware seam of the Weather HAT node.
//!
//! # Modules
//!
//! - [`bus_guard`] – [`BusGuard`]: serializes every transaction against one
//!   bus/address endpoint.
//! - [`handle`] – [`HardwareHandle`] and [`HardwareBackend`]: open, reset and
//!   close a device; bind readers to it.
//! - [`sensors`] – [`WindVane`], [`Anemometer`], [`RainGauge`] and the
//!   [`SensorSet`] that groups them.
//! - [`sim`] – [`SimBackend`][sim::SimBackend]: a simulated device for CI and
//!   demos.

pub mod bus_guard;
pub mod handle;
pub mod sensors;
pub mod sim;

pub use bus_guard::{BusGuard, BusKey};
pub use handle::{HardwareBackend, HardwareHandle};
pub use sensors::{Anemometer, RainGauge, SensorSet, WindVane};
