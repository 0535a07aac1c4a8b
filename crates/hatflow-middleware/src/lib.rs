//! `hatflow-middleware` – the host side of a flow.
//!
//! Routes messages and status updates between nodes and the host without
//! caring about their meaning.
//!
//! # Modules
//!
//! - [`bus`] – topic-lane publish/subscribe [`EventBus`] built on Tokio
//!   broadcast channels.
//! - [`node`] – the [`FlowNode`] contract and the [`NodeContext`] a node uses
//!   to talk back to the host.
//! - [`registry`] – [`NodeRegistry`], the host-owned table of node types.

pub mod bus;
pub mod node;
pub mod registry;

pub use bus::{EventBus, FlowEvent, NodeSubscriber, Topic, TopicReceiver};
pub use node::{FlowNode, NodeContext};
pub use registry::{NodeFactory, NodeRegistry};
