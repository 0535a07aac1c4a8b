//! `hatflow-node` – the `weatherhat` flow node.
//!
//! A [`WeatherHatNode`] owns one Weather HAT on a `(bus, address)` endpoint.
//! It acquires the device once at construction, answers every inbound
//! message with a fresh wind/rain [`SensorSnapshot`] while ready, and
//! releases the device on close.
//!
//! # Modules
//!
//! - [`lifecycle`] – construction, the single acquisition attempt and the
//!   `Initializing → Ready | Failed` transitions.
//! - [`status`] – maps lifecycle states to host status indicators.
//! - [`pipeline`] – turns an inbound message into an outbound one.
//! - [`shutdown`] – idempotent teardown.
//!
//! Use [`register`] to make the node type available to a host's
//! [`NodeRegistry`].
//!
//! [`SensorSnapshot`]: hatflow_types::SensorSnapshot

pub mod lifecycle;
pub mod pipeline;
pub mod shutdown;
pub mod status;

use std::sync::Arc;

use async_trait::async_trait;
use hatflow_hal::{BusGuard, HardwareBackend};
use hatflow_middleware::{FlowNode, NodeContext, NodeRegistry};
use hatflow_types::{HatError, Message, NodeConfig, RawNodeConfig};
use tracing::{debug, warn};

pub use lifecycle::WeatherHatNode;
pub use status::status_for;

/// Registered type name, also used in the ready label.
pub const NODE_KIND: &str = "weatherhat";

#[async_trait]
impl FlowNode for WeatherHatNode {
    fn id(&self) -> &str {
        WeatherHatNode::id(self)
    }

    fn type_name(&self) -> &str {
        NODE_KIND
    }

    /// Always accepted.  Messages that cannot be answered are dropped here
    /// and never reported back to the sender.
    async fn on_input(&self, msg: Message) {
        let msg_id = msg.id.clone();
        match self.process(msg).await {
            Ok(out) => self.ctx.send(out),
            Err(reason @ (HatError::NotReady(_) | HatError::Closed)) => {
                debug!(
                    node_id = self.id(),
                    msg_id = %msg_id,
                    state = %self.state(),
                    closed = self.is_closed(),
                    reason = %reason,
                    "dropping message"
                );
            }
            Err(err) => {
                warn!(node_id = self.id(), msg_id = %msg_id, error = %err, "sensor read failed");
            }
        }
    }

    async fn close(&self) {
        self.shutdown().await;
    }
}

/// Register the `weatherhat` node type.
///
/// Every node created through the registry shares `backend` and `guard`, so
/// two nodes configured for the same endpoint never interleave transactions.
pub fn register(registry: &mut NodeRegistry, backend: Arc<dyn HardwareBackend>, guard: BusGuard) {
    registry.register(
        NODE_KIND,
        Box::new(move |ctx: NodeContext, raw: &RawNodeConfig| {
            let config = NodeConfig::from_raw(raw);
            WeatherHatNode::spawn(ctx, config, Arc::clone(&backend), guard.clone())
                as Arc<dyn FlowNode>
        }),
    );
}
