//! Node configuration and the defaulting rules that resolve it from the
//! loosely-typed values a flow editor hands over.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport index used when `bus` is missing or malformed.
pub const DEFAULT_BUS: u32 = 1;

/// Device address used when `address` is missing or malformed.
pub const DEFAULT_ADDRESS: u8 = 0x12;

/// Highest address representable on a 7-bit bus.
const MAX_ADDRESS: i64 = 0x7F;

/// A configuration value as delivered by the host: usually a number or the
/// text typed into an editor field, but any JSON value is accepted so that a
/// wrongly typed field resolves to its default instead of rejecting the whole
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Number(i64),
    Float(f64),
    Text(String),
    /// Booleans, arrays, objects. Never parses to a number.
    Other(Value),
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

/// Host-facing node configuration. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNodeConfig {
    /// Transport index, decimal unless written with a `0x` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<ConfigValue>,
    /// Device address, hexadecimal with or without a `0x` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<ConfigValue>,
    /// Opaque label, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

/// Resolved, immutable node configuration.
///
/// `bus` and `address` are fixed for the lifetime of the node; changing them
/// means building a new node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeConfig {
    bus: u32,
    address: u8,
    topic: String,
}

impl NodeConfig {
    /// Build a configuration from typed values, applying the same fallbacks
    /// as [`NodeConfig::from_raw`] (bus `0` and out-of-range addresses fall
    /// back to the defaults).
    pub fn new(bus: u32, address: u8, topic: impl Into<String>) -> Self {
        Self {
            bus: resolve_bus(Some(i64::from(bus))),
            address: resolve_address(Some(i64::from(address))),
            topic: topic.into(),
        }
    }

    /// Resolve a host configuration.
    ///
    /// Both fields go through the same leading-integer parse whatever their
    /// type, so a numeric `address` of `18` means `0x18` just like the text
    /// `"18"`.  Malformed or missing values are not errors: `bus` falls back
    /// to [`DEFAULT_BUS`] and `address` to [`DEFAULT_ADDRESS`].
    pub fn from_raw(raw: &RawNodeConfig) -> Self {
        let bus = raw.bus.as_ref().and_then(|v| numeric(v, None));
        let address = raw.address.as_ref().and_then(|v| numeric(v, Some(16)));
        Self {
            bus: resolve_bus(bus),
            address: resolve_address(address),
            topic: raw.topic.clone().unwrap_or_default(),
        }
    }

    pub fn bus(&self) -> u32 {
        self.bus
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bus: DEFAULT_BUS,
            address: DEFAULT_ADDRESS,
            topic: String::new(),
        }
    }
}

fn resolve_bus(value: Option<i64>) -> u32 {
    value
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(DEFAULT_BUS)
}

fn resolve_address(value: Option<i64>) -> u8 {
    value
        .filter(|v| (1..=MAX_ADDRESS).contains(v))
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(DEFAULT_ADDRESS)
}

/// Numbers are parsed from their decimal text, so `Float(1.5)` keeps its
/// integer part and `Number(18)` in radix 16 is `0x18`.
fn numeric(value: &ConfigValue, radix: Option<u32>) -> Option<i64> {
    match value {
        ConfigValue::Number(n) => parse_leading_int(&n.to_string(), radix),
        ConfigValue::Float(f) => parse_leading_int(&f.to_string(), radix),
        ConfigValue::Text(text) => parse_leading_int(text, radix),
        ConfigValue::Other(_) => None,
    }
}

/// Parse the leading integer of `text`, ignoring leading whitespace and any
/// trailing garbage (`"2 "` and `"2abc"` both give `2`).
///
/// With no `radix` the text is decimal unless it starts with `0x`/`0X`, in
/// which case it is hex.  The prefix is also accepted in radix 16.
fn parse_leading_int(text: &str, radix: Option<u32>) -> Option<i64> {
    let mut rest = text.trim_start();
    let negative = match rest.as_bytes().first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };
    let unprefixed = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"));
    let (rest, radix) = match (radix, unprefixed) {
        (None | Some(16), Some(hex)) => (hex, 16),
        (Some(radix), _) => (rest, radix),
        (None, None) => (rest, 10),
    };
    let end = rest
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map_or(rest.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    let magnitude = i64::from_str_radix(&rest[..end], radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bus: Option<&str>, address: Option<&str>) -> RawNodeConfig {
        RawNodeConfig {
            bus: bus.map(ConfigValue::from),
            address: address.map(ConfigValue::from),
            topic: None,
        }
    }

    #[test]
    fn missing_values_use_defaults() {
        let cfg = NodeConfig::from_raw(&RawNodeConfig::default());
        assert_eq!(cfg.bus(), 1);
        assert_eq!(cfg.address(), 0x12);
        assert_eq!(cfg.topic(), "");
        assert_eq!(cfg, NodeConfig::default());
    }

    #[test]
    fn explicit_values_are_parsed() {
        let cfg = NodeConfig::from_raw(&raw(Some("3"), Some("0x20")));
        assert_eq!(cfg.bus(), 3);
        assert_eq!(cfg.address(), 0x20);

        let cfg = NodeConfig::from_raw(&raw(Some("1"), Some("12")));
        assert_eq!(cfg.address(), 0x12);
    }

    #[test]
    fn trailing_garbage_is_ignored() {
        let cfg = NodeConfig::from_raw(&raw(Some(" 2 (second bus)"), Some("1aZ")));
        assert_eq!(cfg.bus(), 2);
        assert_eq!(cfg.address(), 0x1a);
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = NodeConfig::from_raw(&raw(Some("abc"), Some("zz")));
        assert_eq!(cfg.bus(), DEFAULT_BUS);
        assert_eq!(cfg.address(), DEFAULT_ADDRESS);

        let cfg = NodeConfig::from_raw(&raw(Some(""), Some("")));
        assert_eq!(cfg.bus(), DEFAULT_BUS);
        assert_eq!(cfg.address(), DEFAULT_ADDRESS);
    }

    #[test]
    fn zero_negative_and_out_of_range_fall_back() {
        let cfg = NodeConfig::from_raw(&raw(Some("0"), Some("0")));
        assert_eq!(cfg.bus(), DEFAULT_BUS);
        assert_eq!(cfg.address(), DEFAULT_ADDRESS);

        let cfg = NodeConfig::from_raw(&raw(Some("-4"), Some("0x80")));
        assert_eq!(cfg.bus(), DEFAULT_BUS);
        assert_eq!(cfg.address(), DEFAULT_ADDRESS);
    }

    #[test]
    fn numeric_values_read_like_their_text() {
        let cfg = NodeConfig::from_raw(&RawNodeConfig {
            bus: Some(ConfigValue::Number(4)),
            address: Some(ConfigValue::Number(23)),
            topic: Some("roof".to_string()),
        });
        assert_eq!(cfg.bus(), 4);
        assert_eq!(cfg.address(), 0x23);
        assert_eq!(cfg.topic(), "roof");

        let cfg = NodeConfig::from_raw(&RawNodeConfig {
            bus: Some(ConfigValue::Float(2.7)),
            address: Some(ConfigValue::Float(1.5)),
            topic: None,
        });
        assert_eq!(cfg.bus(), 2);
        assert_eq!(cfg.address(), 0x01);
    }

    #[test]
    fn hex_prefixed_bus_is_hex() {
        let cfg = NodeConfig::from_raw(&raw(Some("0x2"), None));
        assert_eq!(cfg.bus(), 2);
        let cfg = NodeConfig::from_raw(&raw(Some("0X10"), None));
        assert_eq!(cfg.bus(), 16);
        let cfg = NodeConfig::from_raw(&raw(Some("010"), None));
        assert_eq!(cfg.bus(), 10);
    }

    #[test]
    fn wrongly_typed_values_fall_back() {
        let raw: RawNodeConfig =
            serde_json::from_str(r#"{ "bus": true, "address": [1], "topic": "roof" }"#).unwrap();
        assert!(matches!(raw.bus, Some(ConfigValue::Other(_))));
        let cfg = NodeConfig::from_raw(&raw);
        assert_eq!(cfg.bus(), DEFAULT_BUS);
        assert_eq!(cfg.address(), DEFAULT_ADDRESS);
        assert_eq!(cfg.topic(), "roof");

        let raw: RawNodeConfig =
            serde_json::from_str(r#"{ "bus": true, "address": 1.5 }"#).unwrap();
        assert_eq!(raw.address, Some(ConfigValue::Float(1.5)));
        assert_eq!(NodeConfig::from_raw(&raw).bus(), DEFAULT_BUS);
    }

    #[test]
    fn typed_constructor_applies_fallbacks() {
        let cfg = NodeConfig::new(0, 0xFF, "t");
        assert_eq!(cfg.bus(), DEFAULT_BUS);
        assert_eq!(cfg.address(), DEFAULT_ADDRESS);
        assert_eq!(cfg.topic(), "t");
    }

    #[test]
    fn raw_config_accepts_strings_and_numbers() {
        let from_json: RawNodeConfig =
            serde_json::from_str(r#"{ "bus": "1", "address": 18 }"#).unwrap();
        assert_eq!(from_json.bus, Some(ConfigValue::Text("1".to_string())));
        assert_eq!(from_json.address, Some(ConfigValue::Number(18)));
        assert_eq!(NodeConfig::from_raw(&from_json).address(), 0x18);
    }
}
