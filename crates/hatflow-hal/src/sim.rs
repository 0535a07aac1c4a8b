//! In-process simulated Weather HAT for CI and the demo CLI.
//!
//! [`SimBackend`] implements [`HardwareBackend`] without touching real
//! hardware.  Its readers produce plausible, changing values so that two
//! consecutive snapshots differ, and a [`SimProbe`] lets tests count handle
//! calls and inject read failures.
//!
//! # Stub behaviour
//!
//! | Component | Behaviour |
//! |---|---|
//! | [`SimHandle`] | `acquire` sleeps `acquire_delay_ms`, then succeeds or fails with `fail_init`. `release` is counted once. |
//! | vane | Starts at `heading_deg` and turns by `heading_step_deg` on every read. |
//! | anemometer | Cycles between `base_speed` and `base_speed + gust`; keeps a 60-sample window for the average. |
//! | rain gauge | Adds `tips_per_read` bucket tips of `tip_mm` each time the total is read. |
//!
//! # Example
//!
//! ```rust
//! use hatflow_hal::sim::{SimBackend, SimConfig};
//!
//! let backend = SimBackend::new(SimConfig::default());
//! let probe = backend.probe();
//! assert_eq!(probe.acquire_calls(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hatflow_types::{Cardinal, HatError};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bus_guard::BusKey;
use crate::handle::{HardwareBackend, HardwareHandle};
use crate::sensors::{Anemometer, RainGauge, SensorSet, WindVane};

/// Samples kept by the simulated anemometer for its one-minute average.
const SPEED_WINDOW: usize = 60;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Knobs for the simulated device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// When set, `acquire` fails with this detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_init: Option<String>,
    /// How long the simulated reset takes.
    pub acquire_delay_ms: u64,
    pub heading_deg: f32,
    pub heading_step_deg: f32,
    /// m/s
    pub base_speed: f64,
    /// m/s
    pub gust: f64,
    /// Depth of one bucket tip, mm.
    pub tip_mm: f64,
    pub tips_per_read: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fail_init: None,
            acquire_delay_ms: 0,
            heading_deg: 0.0,
            heading_step_deg: Cardinal::SECTOR_DEG,
            base_speed: 2.0,
            gust: 1.5,
            tip_mm: 0.2794,
            tips_per_read: 1,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Probe
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ProbeState {
    acquire_calls: AtomicUsize,
    release_calls: AtomicUsize,
    reads: AtomicUsize,
    read_failure: Mutex<Option<String>>,
}

/// Test-side view into a [`SimBackend`]. Clones share state.
#[derive(Clone, Default)]
pub struct SimProbe {
    state: Arc<ProbeState>,
}

impl SimProbe {
    pub fn acquire_calls(&self) -> usize {
        self.state.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.state.release_calls.load(Ordering::SeqCst)
    }

    /// Number of individual reader calls that succeeded.
    pub fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    /// Make every subsequent reader call fail with `detail`.
    pub fn fail_reads(&self, detail: impl Into<String>) {
        *self.failure_slot() = Some(detail.into());
    }

    pub fn clear_read_failure(&self) {
        *self.failure_slot() = None;
    }

    fn check_read(&self, component: &str) -> Result<(), HatError> {
        if let Some(detail) = self.failure_slot().clone() {
            return Err(HatError::hardware(component, detail));
        }
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn failure_slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.state
            .read_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend and handle
// ────────────────────────────────────────────────────────────────────────────

/// Simulated [`HardwareBackend`].
pub struct SimBackend {
    config: SimConfig,
    probe: SimProbe,
}

impl SimBackend {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            probe: SimProbe::default(),
        }
    }

    /// A backend whose devices never answer.
    pub fn failing(detail: impl Into<String>) -> Self {
        Self::new(SimConfig {
            fail_init: Some(detail.into()),
            ..SimConfig::default()
        })
    }

    pub fn probe(&self) -> SimProbe {
        self.probe.clone()
    }
}

impl HardwareBackend for SimBackend {
    fn open(&self, key: BusKey) -> Arc<dyn HardwareHandle> {
        Arc::new(SimHandle {
            key,
            fail_init: self.config.fail_init.clone(),
            acquire_delay: Duration::from_millis(self.config.acquire_delay_ms),
            probe: self.probe.clone(),
            released: AtomicBool::new(false),
        })
    }

    fn sensors(&self, handle: Arc<dyn HardwareHandle>) -> SensorSet {
        let key = handle.key();
        debug!(key = %key, "binding simulated readers");
        SensorSet::new(
            Box::new(SimVane {
                heading: self.config.heading_deg,
                step: self.config.heading_step_deg,
                probe: self.probe.clone(),
            }),
            Box::new(SimAnemometer {
                base: self.config.base_speed,
                gust: self.config.gust,
                tick: 0,
                samples: VecDeque::with_capacity(SPEED_WINDOW),
                probe: self.probe.clone(),
            }),
            Box::new(SimRainGauge {
                tip_mm: self.config.tip_mm,
                tips_per_read: self.config.tips_per_read,
                total_tips: 0,
                last_minute_tips: 0,
                probe: self.probe.clone(),
            }),
        )
    }
}

/// Simulated device handle.
pub struct SimHandle {
    key: BusKey,
    fail_init: Option<String>,
    acquire_delay: Duration,
    probe: SimProbe,
    released: AtomicBool,
}

#[async_trait]
impl HardwareHandle for SimHandle {
    fn key(&self) -> BusKey {
        self.key
    }

    async fn acquire(&self) -> Result<(), HatError> {
        self.probe.state.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        match &self.fail_init {
            Some(detail) => Err(HatError::hardware(format!("ioe@{}", self.key), detail.clone())),
            None => Ok(()),
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.probe.state.release_calls.fetch_add(1, Ordering::SeqCst);
            debug!(key = %self.key, "simulated device closed");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Readers
// ────────────────────────────────────────────────────────────────────────────

struct SimVane {
    heading: f32,
    step: f32,
    probe: SimProbe,
}

impl WindVane for SimVane {
    fn current_cardinal(&mut self) -> Result<Cardinal, HatError> {
        self.probe.check_read("sim-vane")?;
        let cardinal = Cardinal::from_degrees(self.heading);
        self.heading = (self.heading + self.step).rem_euclid(360.0);
        Ok(cardinal)
    }
}

struct SimAnemometer {
    base: f64,
    gust: f64,
    tick: u32,
    samples: VecDeque<f64>,
    probe: SimProbe,
}

impl Anemometer for SimAnemometer {
    fn current_speed(&mut self) -> Result<f64, HatError> {
        self.probe.check_read("sim-anemometer")?;
        self.tick = self.tick.wrapping_add(1);
        let speed = self.base + self.gust * f64::from(self.tick % 4) / 3.0;
        if self.samples.len() == SPEED_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(speed);
        Ok(speed)
    }

    fn one_minute_average(&mut self) -> Result<f64, HatError> {
        self.probe.check_read("sim-anemometer")?;
        if self.samples.is_empty() {
            return Ok(0.0);
        }
        Ok(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }
}

struct SimRainGauge {
    tip_mm: f64,
    tips_per_read: u32,
    total_tips: u64,
    last_minute_tips: u32,
    probe: SimProbe,
}

impl RainGauge for SimRainGauge {
    fn total_depth(&mut self) -> Result<f64, HatError> {
        self.probe.check_read("sim-rain")?;
        self.total_tips += u64::from(self.tips_per_read);
        self.last_minute_tips = self.tips_per_read;
        Ok(self.total_tips as f64 * self.tip_mm)
    }

    fn last_minute_depth(&mut self) -> Result<f64, HatError> {
        self.probe.check_read("sim-rain")?;
        Ok(f64::from(self.last_minute_tips) * self.tip_mm)
    }

    fn today_depth(&mut self) -> Result<f64, HatError> {
        self.probe.check_read("sim-rain")?;
        // The simulator never crosses midnight.
        Ok(self.total_tips as f64 * self.tip_mm)
    }
}
