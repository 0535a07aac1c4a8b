//! Lifecycle state → host status indicator.
//!
//! | State | Indicator | Label |
//! |---|---|---|
//! | `Initializing` | grey ring | `Init...` |
//! | `Ready` | green dot | `<kind> ready` |
//! | `Failed` | red ring | `Init failed: <detail>` |
//!
//! `Uninitialized` is never shown; a node leaves it during construction.

use hatflow_types::{HatError, LifecycleState, NodeStatus, StatusFill, StatusShape};

/// The indicator for `state`, or `None` for states the host never sees.
pub fn status_for(
    kind: &str,
    state: LifecycleState,
    error: Option<&HatError>,
) -> Option<NodeStatus> {
    match state {
        LifecycleState::Uninitialized => None,
        LifecycleState::Initializing => Some(NodeStatus::new(
            StatusFill::Grey,
            StatusShape::Ring,
            "Init...",
        )),
        LifecycleState::Ready => Some(NodeStatus::new(
            StatusFill::Green,
            StatusShape::Dot,
            format!("{kind} ready"),
        )),
        LifecycleState::Failed => {
            let detail = error.map_or_else(|| "unknown error".to_string(), HatError::detail);
            Some(NodeStatus::new(
                StatusFill::Red,
                StatusShape::Ring,
                format!("Init failed: {detail}"),
            ))
        }
    }
}
