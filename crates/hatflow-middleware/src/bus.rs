//! Headless, topic-based publish/subscribe bus between nodes and the host.
//!
//! Uses [`tokio::sync::broadcast`] channels so every subscriber receives
//! every event without any single subscriber blocking the others.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::Output`] | Messages a node forwards downstream |
//! | [`Topic::Status`] | Status indicator updates for the host UI |

use hatflow_types::{Message, NodeStatus};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Outbound flow messages.
    Output,
    /// Node status indicator changes.
    Status,
}

/// One unit of traffic on the bus, tagged with the id of the node that
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    Output { node_id: String, message: Message },
    Status { node_id: String, status: NodeStatus },
}

impl FlowEvent {
    pub fn node_id(&self) -> &str {
        match self {
            FlowEvent::Output { node_id, .. } | FlowEvent::Status { node_id, .. } => node_id,
        }
    }

    pub fn topic(&self) -> Topic {
        match self {
            FlowEvent::Output { .. } => Topic::Output,
            FlowEvent::Status { .. } => Topic::Status,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    output: broadcast::Sender<FlowEvent>,
    status: broadcast::Sender<FlowEvent>,
}

impl EventBus {
    /// Create a new bus; `capacity` applies to every topic independently.
    pub fn new(capacity: usize) -> Self {
        let (output, _) = broadcast::channel(capacity);
        let (status, _) = broadcast::channel(capacity);
        Self { output, status }
    }

    /// Publish `event` on its topic lane.
    ///
    /// Returns the number of subscribers that were handed the event.  Zero
    /// subscribers is a normal condition (nothing is wired downstream) and
    /// the event is simply discarded.
    pub fn publish(&self, event: FlowEvent) -> usize {
        let topic = event.topic();
        match self.topic_sender(topic).send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                trace!(?topic, node_id = event.node_id(), "no subscribers; event discarded");
                0
            }
        }
    }

    /// Subscribe to every event on `topic`.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to the events of a single node on `topic`.
    pub fn subscribe_node(&self, topic: Topic, node_id: impl Into<String>) -> NodeSubscriber {
        NodeSubscriber {
            node_id: node_id.into(),
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<FlowEvent> {
        match topic {
            Topic::Output => &self.output,
            Topic::Status => &self.status,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<FlowEvent>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   events were dropped.
    /// * `Err(RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<FlowEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`][Self::recv].
    pub fn try_recv(&mut self) -> Result<FlowEvent, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Per-node subscriber
// ---------------------------------------------------------------------------

/// A subscriber that only delivers events produced by one node.
pub struct NodeSubscriber {
    node_id: String,
    receiver: broadcast::Receiver<FlowEvent>,
}

impl NodeSubscriber {
    /// Wait for the next event from this subscriber's node.
    ///
    /// Returns `None` when the bus is closed.
    pub async fn recv(&mut self) -> Option<FlowEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.node_id() == self.node_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(node_id = %self.node_id, lagged_by = n, "NodeSubscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
