//! [`WeatherHatNode`] – lifecycle manager for one Weather HAT.
//!
//! Construction is synchronous: the node captures its [`NodeConfig`], moves
//! to [`LifecycleState::Initializing`], reports `Init...` and spawns the one
//! and only acquisition of the device.  When the reset completes the readers
//! are bound and the node becomes `Ready`; when it fails the error counter
//! goes up and the node settles in `Failed` for the rest of its life.  There
//! is no retry.
//!
//! Inbound messages are handled by the pipeline in [`crate::pipeline`], which
//! checks the state on every call, and teardown lives in
//! [`crate::shutdown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hatflow_hal::{BusGuard, BusKey, HardwareBackend, HardwareHandle, SensorSet};
use hatflow_middleware::NodeContext;
use hatflow_types::{HatError, LifecycleState, NodeConfig};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::NODE_KIND;
use crate::status::status_for;

pub(crate) struct Inner {
    pub(crate) state: LifecycleState,
    pub(crate) error_count: u32,
    pub(crate) last_error: Option<HatError>,
    pub(crate) handle: Option<Arc<dyn HardwareHandle>>,
    pub(crate) sensors: Option<Arc<Mutex<SensorSet>>>,
}

/// A Weather HAT sensor node.
///
/// Always handled through an `Arc`: the spawned initialization task keeps a
/// reference until acquisition settles.
pub struct WeatherHatNode {
    pub(crate) ctx: NodeContext,
    pub(crate) config: NodeConfig,
    pub(crate) guard: BusGuard,
    backend: Arc<dyn HardwareBackend>,
    pub(crate) inner: Mutex<Inner>,
    /// Set by shutdown while holding `inner`, so the hand-off with a late
    /// acquisition is decided under that lock.
    pub(crate) closed: AtomicBool,
    state_tx: watch::Sender<LifecycleState>,
}

impl WeatherHatNode {
    /// Create the node and start acquiring its device.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        ctx: NodeContext,
        config: NodeConfig,
        backend: Arc<dyn HardwareBackend>,
        guard: BusGuard,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(LifecycleState::Uninitialized);
        let node = Arc::new(Self {
            ctx,
            config,
            guard,
            backend,
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                error_count: 0,
                last_error: None,
                handle: None,
                sensors: None,
            }),
            closed: AtomicBool::new(false),
            state_tx,
        });

        node.transition(&mut node.lock_inner(), LifecycleState::Initializing);
        info!(
            node_id = node.ctx.id(),
            bus = node.config.bus(),
            address = format_args!("0x{:02x}", node.config.address()),
            "initializing"
        );

        let handle = node.backend.open(node.key());
        tokio::spawn(Arc::clone(&node).initialize(handle));
        node
    }

    pub fn id(&self) -> &str {
        self.ctx.id()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The endpoint this node owns.
    pub fn key(&self) -> BusKey {
        BusKey::new(self.config.bus(), self.config.address())
    }

    pub fn state(&self) -> LifecycleState {
        self.lock_inner().state
    }

    /// Failed initialization attempts over the node's lifetime.
    pub fn error_count(&self) -> u32 {
        self.lock_inner().error_count
    }

    pub fn last_error(&self) -> Option<HatError> {
        self.lock_inner().last_error.clone()
    }

    /// Wait until initialization has either succeeded or failed, or the node
    /// has been closed, and return the state at that point.
    pub async fn initialized(&self) -> LifecycleState {
        let mut rx = self.state_tx.subscribe();
        match rx
            .wait_for(|state| state.is_settled() || self.is_closed())
            .await
        {
            Ok(state) => *state,
            Err(_) => self.state(),
        }
    }

    /// Wake [`initialized`](Self::initialized) waiters without changing state.
    pub(crate) fn notify_waiters(&self) {
        self.state_tx.send_modify(|_| {});
    }

    async fn initialize(self: Arc<Self>, handle: Arc<dyn HardwareHandle>) {
        let device = Arc::clone(&handle);
        let result = self
            .guard
            .run(self.key(), || async move { device.acquire().await })
            .await;

        match result {
            Ok(()) => self.on_acquired(handle).await,
            Err(err) => self.on_failed(err),
        }
    }

    async fn on_acquired(&self, handle: Arc<dyn HardwareHandle>) {
        {
            let mut inner = self.lock_inner();
            if !self.is_closed() {
                let sensors = self.backend.sensors(Arc::clone(&handle));
                inner.handle = Some(handle);
                inner.sensors = Some(Arc::new(Mutex::new(sensors)));
                self.transition(&mut inner, LifecycleState::Ready);
                info!(node_id = self.id(), key = %self.key(), "device ready");
                return;
            }
        }

        // Torn down while the reset was in flight: give the device back.
        debug!(node_id = self.id(), "closed during initialization; releasing device");
        self.guard
            .run(self.key(), || async move { handle.release() })
            .await;
    }

    fn on_failed(&self, err: HatError) {
        let mut inner = self.lock_inner();
        inner.error_count += 1;
        warn!(
            node_id = self.id(),
            key = %self.key(),
            error = %err,
            error_count = inner.error_count,
            "initialization failed"
        );
        inner.last_error = Some(err);
        self.transition(&mut inner, LifecycleState::Failed);
    }

    /// Record `next` and report it to the host.  Callers hold the inner lock,
    /// so reports for one node never run concurrently.
    fn transition(&self, inner: &mut Inner, next: LifecycleState) {
        inner.state = next;
        if let Some(status) = status_for(NODE_KIND, next, inner.last_error.as_ref()) {
            self.ctx.status(status);
        }
        self.state_tx.send_replace(next);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
