//! Hardware handle and backend seams.
//!
//! A [`HardwareBackend`] knows how to open a device at a [`BusKey`] and how
//! to bind sensor readers to an opened device.  The node never talks to a
//! transport directly; it only sees these two traits, so real drivers and
//! the simulator in [`crate::sim`] are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use hatflow_types::HatError;

use crate::bus_guard::BusKey;
use crate::sensors::SensorSet;

/// An opened (but not necessarily reset) device on one bus endpoint.
#[async_trait]
pub trait HardwareHandle: Send + Sync {
    /// The endpoint this handle talks to.
    fn key(&self) -> BusKey;

    /// Reset the device and bring it into a usable state.
    ///
    /// # Errors
    ///
    /// Returns [`HatError::HardwareFault`] when the transport is unreachable
    /// or the device does not answer at this address.
    async fn acquire(&self) -> Result<(), HatError>;

    /// Close the device. Calling this more than once is a no-op.
    fn release(&self);
}

/// Factory for [`HardwareHandle`]s and the readers bound to them.
pub trait HardwareBackend: Send + Sync {
    /// Open the device at `key`. No bus traffic happens until
    /// [`HardwareHandle::acquire`] is called.
    fn open(&self, key: BusKey) -> Arc<dyn HardwareHandle>;

    /// Build the wind and rain readers for an acquired handle.
    fn sensors(&self, handle: Arc<dyn HardwareHandle>) -> SensorSet;
}
