//! Input pipeline: one inbound message in, one snapshot-carrying message out.
//!
//! Wind and rain are read inside a single guarded transaction, wind first.
//! The closed flag is checked again once the lane is held: a shutdown queued
//! behind this message must not release the device between the two reads.
//! The envelope is kept as-is apart from its payload.

use std::sync::{Arc, Mutex, PoisonError};

use hatflow_hal::SensorSet;
use hatflow_types::{HatError, Message, SensorSnapshot};

use crate::lifecycle::WeatherHatNode;

impl WeatherHatNode {
    /// Read every sensor and put the snapshot into `msg.payload`.
    ///
    /// Does not forward anything; see [`FlowNode::on_input`] for that.
    ///
    /// # Errors
    ///
    /// * [`HatError::NotReady`] when the node has not finished (or failed)
    ///   initialization.
    /// * [`HatError::Closed`] when the node was closed before the readers
    ///   got the bus, or while they ran.
    /// * Whatever the readers return when a transaction fails.
    ///
    /// [`FlowNode::on_input`]: hatflow_middleware::FlowNode::on_input
    pub async fn process(&self, mut msg: Message) -> Result<Message, HatError> {
        let sensors = self.ready_sensors()?;

        let snapshot = self
            .guard
            .run(self.key(), || async move {
                if self.is_closed() {
                    return Err(HatError::Closed);
                }
                let mut sensors = lock(&sensors);
                let wind = sensors.read_wind()?;
                let rain = sensors.read_rain()?;
                Ok::<_, HatError>(SensorSnapshot::new(wind, rain))
            })
            .await?;
        if self.is_closed() {
            return Err(HatError::Closed);
        }

        msg.payload = snapshot.to_payload();
        Ok(msg)
    }

    fn ready_sensors(&self) -> Result<Arc<Mutex<SensorSet>>, HatError> {
        let inner = self.lock_inner();
        match &inner.sensors {
            _ if self.is_closed() => Err(HatError::Closed),
            Some(sensors) => Ok(Arc::clone(sensors)),
            None => Err(HatError::NotReady(inner.state)),
        }
    }
}

fn lock(sensors: &Mutex<SensorSet>) -> std::sync::MutexGuard<'_, SensorSet> {
    sensors.lock().unwrap_or_else(PoisonError::into_inner)
}
