//! `hatflow-types` – shared vocabulary for the Weather HAT flow node.
//!
//! Every other crate in the workspace speaks in these types:
//!
//! - [`Message`] – the envelope that travels through a flow.
//! - [`NodeConfig`] / [`RawNodeConfig`] – node configuration and the
//!   host-facing form it is resolved from.
//! - [`LifecycleState`] – the node's coarse readiness classification.
//! - [`SensorSnapshot`] – one immutable set of weather readings.
//! - [`NodeStatus`] – the indicator shown by the host next to a node.
//! - [`HatError`] – the workspace-wide error type.

mod config;
mod snapshot;
mod status;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub use config::{ConfigValue, DEFAULT_ADDRESS, DEFAULT_BUS, NodeConfig, RawNodeConfig};
pub use snapshot::{Cardinal, RainReadings, SensorSnapshot, WindReadings};
pub use status::{NodeStatus, StatusFill, StatusShape};

/// Lifecycle of a sensor node.
///
/// A node is created `Uninitialized`, moves to `Initializing` as soon as it
/// is constructed and then settles on either `Ready` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl LifecycleState {
    /// `true` once initialization has either succeeded or failed.
    pub fn is_settled(self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The envelope that traverses a flow.
///
/// Only `payload` is ever rewritten by a node; the message id and every other
/// field (kept verbatim in `fields`) pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_msgid")]
    pub id: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    /// Create a message with a fresh id and the given payload.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload: payload.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style setter for an arbitrary envelope field such as `topic`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Workspace-wide error type spanning device faults, lifecycle rejections and
/// host plumbing failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HatError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Node not ready (state: {0})")]
    NotReady(LifecycleState),

    /// The node has been closed; its device is gone even if it once was
    /// ready.
    #[error("Node closed")]
    Closed,

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

impl HatError {
    /// Shorthand for a [`HatError::HardwareFault`].
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        HatError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }

    /// The human-facing detail of the error, without the variant prefix.
    ///
    /// For hardware faults this is the driver's own description (e.g.
    /// `"no device"`), which is what the host status label shows.
    pub fn detail(&self) -> String {
        match self {
            HatError::HardwareFault { details, .. } => details.clone(),
            other => other.to_string(),
        }
    }
}
