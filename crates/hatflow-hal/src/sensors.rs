//! Sensor reader traits for the wind vane, anemometer and rain gauge.
//!
//! Readers are stateful (the anemometer keeps a rolling window, the rain
//! gauge accumulates tips), so every method takes `&mut self`.  They are
//! only ever called inside a [`BusGuard`][crate::bus_guard::BusGuard]
//! transaction.

use hatflow_types::{Cardinal, HatError, RainReadings, WindReadings};

/// Wind direction classifier.
pub trait WindVane: Send {
    /// The compass point the vane currently points to.
    ///
    /// # Errors
    ///
    /// Returns [`HatError::HardwareFault`] if the vane cannot be read.
    fn current_cardinal(&mut self) -> Result<Cardinal, HatError>;
}

/// Wind speed sensor. Speeds are in m/s.
pub trait Anemometer: Send {
    fn current_speed(&mut self) -> Result<f64, HatError>;

    /// Average over the last minute of samples.
    fn one_minute_average(&mut self) -> Result<f64, HatError>;
}

/// Tipping-bucket rain gauge. Depths are in mm.
pub trait RainGauge: Send {
    /// Accumulated since the gauge was created.
    fn total_depth(&mut self) -> Result<f64, HatError>;

    fn last_minute_depth(&mut self) -> Result<f64, HatError>;

    /// Accumulated since local midnight.
    fn today_depth(&mut self) -> Result<f64, HatError>;
}

/// The three readers bound to one device.
pub struct SensorSet {
    pub vane: Box<dyn WindVane>,
    pub anemometer: Box<dyn Anemometer>,
    pub rain: Box<dyn RainGauge>,
}

impl SensorSet {
    pub fn new(
        vane: Box<dyn WindVane>,
        anemometer: Box<dyn Anemometer>,
        rain: Box<dyn RainGauge>,
    ) -> Self {
        Self {
            vane,
            anemometer,
            rain,
        }
    }

    /// Direction, instantaneous speed and one-minute average.
    pub fn read_wind(&mut self) -> Result<WindReadings, HatError> {
        Ok(WindReadings {
            direction: self.vane.current_cardinal()?,
            current_speed: self.anemometer.current_speed()?,
            average_1min: self.anemometer.one_minute_average()?,
        })
    }

    /// Total, last-minute and today's rainfall.
    pub fn read_rain(&mut self) -> Result<RainReadings, HatError> {
        Ok(RainReadings {
            total: self.rain.total_depth()?,
            last_minute: self.rain.last_minute_depth()?,
            today: self.rain.today_depth()?,
        })
    }
}
