//! The contract between the host runtime and a flow node.
//!
//! The host owns the wiring: it delivers inbound messages through
//! [`FlowNode::on_input`] and tears nodes down with [`FlowNode::close`].  A
//! node talks back only through its [`NodeContext`], which publishes outbound
//! messages and status updates on the [`EventBus`].

use async_trait::async_trait;
use hatflow_types::{Message, NodeStatus};

use crate::bus::{EventBus, FlowEvent};

/// Every node type the host can instantiate implements this trait.
///
/// # Contract
///
/// * `on_input` – always callable, from the moment the node exists.  A node
///   that cannot process a message drops it; nothing is reported back to the
///   sender.
/// * `close` – called when the node is torn down; may be called more than
///   once.
#[async_trait]
pub trait FlowNode: Send + Sync {
    /// Instance id assigned by the host.
    fn id(&self) -> &str;

    /// The registered type name, e.g. `"weatherhat"`.
    fn type_name(&self) -> &str;

    async fn on_input(&self, msg: Message);

    async fn close(&self);
}

/// A node's handle on the host: its id plus the bus it reports to.
#[derive(Clone, Debug)]
pub struct NodeContext {
    id: String,
    bus: EventBus,
}

impl NodeContext {
    pub fn new(id: impl Into<String>, bus: EventBus) -> Self {
        Self { id: id.into(), bus }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Forward `message` to whatever is wired downstream.
    pub fn send(&self, message: Message) {
        self.bus.publish(FlowEvent::Output {
            node_id: self.id.clone(),
            message,
        });
    }

    /// Update the indicator the host shows for this node.
    pub fn status(&self, status: NodeStatus) {
        self.bus.publish(FlowEvent::Status {
            node_id: self.id.clone(),
            status,
        });
    }
}
