//! Configuration Vault – reads/writes `~/.hatflow/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use hatflow_hal::sim::SimConfig;
use hatflow_types::{ConfigValue, RawNodeConfig};
use serde::{Deserialize, Serialize};

/// Persisted demo configuration stored in `~/.hatflow/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Node settings exactly as a flow editor would deliver them.
    #[serde(default)]
    pub node: RawNodeConfig,

    /// Delay between injected messages.
    #[serde(default = "default_inject_interval_ms")]
    pub inject_interval_ms: u64,

    /// Stop after this many injected messages; `0` runs until Ctrl-C.
    #[serde(default)]
    pub inject_count: u64,

    /// Behaviour of the simulated Weather HAT.
    #[serde(default)]
    pub simulation: SimConfig,
}

fn default_inject_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: RawNodeConfig::default(),
            inject_interval_ms: default_inject_interval_ms(),
            inject_count: 0,
            simulation: SimConfig::default(),
        }
    }
}

/// Return the path to `~/.hatflow/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".hatflow").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
///
/// Environment overrides are not applied here; see [`apply_env_overrides`].
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `HATFLOW_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `HATFLOW_BUS` | `node.bus` |
/// | `HATFLOW_ADDRESS` | `node.address` |
/// | `HATFLOW_TOPIC` | `node.topic` |
/// | `HATFLOW_INJECT_INTERVAL_MS` | `inject_interval_ms` |
/// | `HATFLOW_FAIL_INIT` | `simulation.fail_init` |
///
/// Bus and address are kept as text; the node applies its own defaulting
/// rules to them.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("HATFLOW_BUS") {
        cfg.node.bus = Some(ConfigValue::Text(v));
    }
    if let Ok(v) = std::env::var("HATFLOW_ADDRESS") {
        cfg.node.address = Some(ConfigValue::Text(v));
    }
    if let Ok(v) = std::env::var("HATFLOW_TOPIC") {
        cfg.node.topic = Some(v);
    }
    if let Ok(v) = std::env::var("HATFLOW_INJECT_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.inject_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("HATFLOW_FAIL_INIT") {
        cfg.simulation.fail_init = Some(v);
    }
}

/// Save the config to `path`, creating its directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
