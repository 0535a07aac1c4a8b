use std::sync::atomic::Ordering;

use tracing::{debug, info};

use crate::lifecycle::WeatherHatNode;

impl WeatherHatNode {
    /// Tear the node down.
    ///
    /// Releases the device if acquisition succeeded.  Later calls, and calls
    /// on a node that never became ready, do nothing.  An acquisition still
    /// in flight releases its handle itself once it completes.
    pub async fn shutdown(&self) {
        let handle = {
            let mut inner = self.lock_inner();
            self.closed.store(true, Ordering::SeqCst);
            inner.sensors = None;
            inner.handle.take()
        };
        self.notify_waiters();

        match handle {
            Some(handle) => {
                self.guard
                    .run(self.key(), || async move { handle.release() })
                    .await;
                info!(node_id = self.id(), key = %self.key(), "device released");
            }
            None => debug!(node_id = self.id(), state = %self.state(), "nothing to release"),
        }
    }
}
