//! [`BusGuard`] – per-endpoint transaction serialization.
//!
//! The physical transport is non-reentrant: two transactions in flight on the
//! same bus/address pair corrupt each other.  The guard keeps one FIFO lane
//! per [`BusKey`].  Callers on the same key are served one at a time in
//! arrival order; callers on different keys never wait for each other.
//!
//! Every hardware-handle and sensor-reader call goes through
//! [`BusGuard::run`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

/// One physical transport endpoint: a bus index plus a device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusKey {
    pub bus: u32,
    pub address: u8,
}

impl BusKey {
    pub fn new(bus: u32, address: u8) -> Self {
        Self { bus, address }
    }
}

impl fmt::Display for BusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0x{:02x}", self.bus, self.address)
    }
}

/// Shared transaction gate. Clone it cheaply – all clones share the same
/// lanes.
#[derive(Clone, Default)]
pub struct BusGuard {
    lanes: Arc<Mutex<HashMap<BusKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl BusGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` as an exclusive transaction on `key`.
    ///
    /// The call waits until every earlier transaction on the same key has
    /// finished.  Whatever `op` returns (including an error) releases the
    /// lane for the next caller.
    pub async fn run<F, Fut, T>(&self, key: BusKey, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lane = self.lane(key);
        // tokio's Mutex hands out the lock in FIFO order.
        let _permit = lane.lock().await;
        trace!(key = %key, "bus transaction");
        op().await
    }

    /// Number of distinct endpoints that have seen at least one transaction.
    pub fn lane_count(&self) -> usize {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lane(&self, key: BusKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut lanes = self.lanes.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(lanes.entry(key).or_default())
    }
}

impl fmt::Debug for BusGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusGuard")
            .field("lanes", &self.lane_count())
            .finish()
    }
}
