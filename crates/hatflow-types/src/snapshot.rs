//! Weather readings and their flow payload representation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const SPEED_UNIT: &str = "m/s";
const DEPTH_UNIT: &str = "mm";

/// One of the 16 compass points, in abbreviated form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinal {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl Cardinal {
    /// All points, clockwise from north.
    pub const ALL: [Cardinal; 16] = [
        Cardinal::N,
        Cardinal::NNE,
        Cardinal::NE,
        Cardinal::ENE,
        Cardinal::E,
        Cardinal::ESE,
        Cardinal::SE,
        Cardinal::SSE,
        Cardinal::S,
        Cardinal::SSW,
        Cardinal::SW,
        Cardinal::WSW,
        Cardinal::W,
        Cardinal::WNW,
        Cardinal::NW,
        Cardinal::NNW,
    ];

    /// Width of one compass sector in degrees.
    pub const SECTOR_DEG: f32 = 22.5;

    pub fn as_str(self) -> &'static str {
        match self {
            Cardinal::N => "N",
            Cardinal::NNE => "NNE",
            Cardinal::NE => "NE",
            Cardinal::ENE => "ENE",
            Cardinal::E => "E",
            Cardinal::ESE => "ESE",
            Cardinal::SE => "SE",
            Cardinal::SSE => "SSE",
            Cardinal::S => "S",
            Cardinal::SSW => "SSW",
            Cardinal::SW => "SW",
            Cardinal::WSW => "WSW",
            Cardinal::W => "W",
            Cardinal::WNW => "WNW",
            Cardinal::NW => "NW",
            Cardinal::NNW => "NNW",
        }
    }

    /// The point whose sector contains `degrees` (sectors are centred on each
    /// point, so 11.24° is still `N` and 11.25° is `NNE`).
    pub fn from_degrees(degrees: f32) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let index = ((normalized + Self::SECTOR_DEG / 2.0) / Self::SECTOR_DEG) as usize % 16;
        Self::ALL[index]
    }

    /// Centre of this point's sector, in degrees clockwise from north.
    pub fn degrees(self) -> f32 {
        let index = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        index as f32 * Self::SECTOR_DEG
    }
}

impl fmt::Display for Cardinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wind readings taken in one bus transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindReadings {
    pub direction: Cardinal,
    /// Instantaneous speed, m/s.
    pub current_speed: f64,
    /// Rolling one-minute average, m/s.
    pub average_1min: f64,
}

/// Rainfall readings taken in one bus transaction. All depths in mm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainReadings {
    pub total: f64,
    pub last_minute: f64,
    pub today: f64,
}

/// An immutable set of readings computed for exactly one inbound message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSnapshot {
    wind: WindReadings,
    rain: RainReadings,
}

impl SensorSnapshot {
    pub fn new(wind: WindReadings, rain: RainReadings) -> Self {
        Self { wind, rain }
    }

    pub fn wind(&self) -> &WindReadings {
        &self.wind
    }

    pub fn rain(&self) -> &RainReadings {
        &self.rain
    }

    /// Render the snapshot as a flow payload:
    ///
    /// ```json
    /// { "Wind": { "Direction": "NNE", "CurrentSpeed": "3.2 m/s", "Average1Min": "2.9 m/s" },
    ///   "Rain": { "Total": "1.397 mm", "LastMinute": "0.2794 mm", "Today": "1.397 mm" } }
    /// ```
    pub fn to_payload(&self) -> Value {
        let payload = Payload {
            wind: WindPayload {
                direction: self.wind.direction.as_str(),
                current_speed: format_speed(self.wind.current_speed),
                average_1min: format_speed(self.wind.average_1min),
            },
            rain: RainPayload {
                total: format_depth(self.rain.total),
                last_minute: format_depth(self.rain.last_minute),
                today: format_depth(self.rain.today),
            },
        };
        serde_json::to_value(payload).unwrap_or(Value::Null)
    }
}

/// Speeds always carry exactly one decimal place, rounded from the exact
/// binary value with ties away from zero (`1.25` gives `"1.3"`).
pub(crate) fn format_speed(value: f64) -> String {
    // `{:.1}` breaks exact ties to even. At one decimal the only exact ties
    // are odd multiples of 0.25, where `value * 10.0` is exact too.
    let quarters = value * 4.0;
    let value = if quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        (value * 10.0).round() / 10.0
    } else {
        value
    };
    format!("{value:.1} {SPEED_UNIT}")
}

/// Depths use the shortest representation that round-trips, no truncation.
pub(crate) fn format_depth(value: f64) -> String {
    format!("{value} {DEPTH_UNIT}")
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Payload {
    wind: WindPayload,
    rain: RainPayload,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct WindPayload {
    direction: &'static str,
    current_speed: String,
    #[serde(rename = "Average1Min")]
    average_1min: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct RainPayload {
    total: String,
    last_minute: String,
    today: String,
}
