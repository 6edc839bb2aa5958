use std::{env, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("Failed to write config file: {0}")]
    Write(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("No config path available (set XDG_CONFIG_HOME or HOME)")]
    PathUnavailable,
}

/// On-host paths and channel tuning for the agent. The monitoring
/// parameters themselves (periods, retries, collector port) arrive on
/// the command line; this file only pins where things live on the node.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub keys: Keys,
    pub probes: Probes,
    pub liveness: Liveness,
    pub channel: Channel,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Keys {
    /// The host's 32-byte Ed25519 identity secret
    pub identity: path::PathBuf,
    /// Cached hex export of the derived report key
    pub export: path::PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Probes {
    /// Directory holding `run_probes`, the per-hypervisor probe
    /// directories, and the shepherd script
    pub root: path::PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Liveness {
    /// Marker file whose mtime signals the active agent generation
    pub marker: path::PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Channel {
    /// Depth of the queue between the scheduling loops and the sender
    pub queue_depth: usize,
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/pushmon/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("pushmon/config.toml"))
}

impl Default for Config {
    fn default() -> Self {
        let config_home = env::var("XDG_CONFIG_HOME")
            .map(path::PathBuf::from)
            .ok()
            .or_else(|| env::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| path::PathBuf::from("."));
        let key_dir = config_home.join("pushmon");
        let remotes = path::PathBuf::from("/var/tmp/pushmon/remotes");

        Self {
            keys: Keys {
                identity: key_dir.join("identity.key"),
                export: key_dir.join("identity.pub"),
            },
            probes: Probes { root: remotes.clone() },
            liveness: Liveness { marker: remotes.join(".update") },
            channel: Channel { queue_depth: 64 },
        }
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/pushmon/config.toml
    /// or at the specified path, with the name config.toml, if one does
    /// not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }

        fs::write(path, config_str).map_err(ConfigError::Write)
    }
}
