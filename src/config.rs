use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_NAME: &str = "rolo";

const DEFAULT_REMOTE_URL: &str = "https://randomuser.me/api/";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration. Everything has a default, so running without a
/// config file works out of the box.
#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub remote: RemoteConfig,
    pub device: DeviceConfig,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Where the file-backed device provider keeps its contacts.
    pub path: PathBuf,
}

// =============================================================================
// Config file structure
// =============================================================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    db_path: Option<PathBuf>,
    remote: RemoteFile,
    device: DeviceFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RemoteFile {
    url: String,
    timeout_secs: u64,
}

impl Default for RemoteFile {
    fn default() -> Self {
        Self {
            url: DEFAULT_REMOTE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DeviceFile {
    path: Option<PathBuf>,
}

/// Load configuration. With `explicit` set, that file must exist; otherwise
/// the default location is used when present and built-in defaults when not.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };

    let cfg_file = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

        warn_unknown_keys(&value);

        value
            .try_into()
            .with_context(|| format!("failed to deserialize config from {}", path.display()))?
    } else if explicit.is_some() {
        bail!("configuration file not found at {}", path.display());
    } else {
        ConfigFile::default()
    };

    let db_path = match cfg_file.db_path {
        Some(p) => expand_tilde(&p),
        None => data_root()?.join("contacts.db"),
    };
    let device_path = match cfg_file.device.path {
        Some(p) => expand_tilde(&p),
        None => data_root()?.join("device.json"),
    };

    let url = cfg_file.remote.url.trim().to_string();
    if url.is_empty() {
        bail!("remote.url must not be empty");
    }

    Ok(Config {
        config_path: path,
        db_path,
        remote: RemoteConfig {
            url,
            timeout: Duration::from_secs(cfg_file.remote.timeout_secs),
        },
        device: DeviceConfig { path: device_path },
    })
}

fn config_path() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME).join(CONFIG_FILE_NAME))
}

fn data_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.data_dir().join(APP_NAME))
}

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    let known = HashSet::from(["db_path", "remote", "device"]);
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            eprintln!("warning: unknown configuration key `{}`", key);
        }
    }

    if let Some(remote) = table.get("remote") {
        warn_unknown_in_section(remote, "remote", &["url", "timeout_secs"]);
    }
    if let Some(device) = table.get("device") {
        warn_unknown_in_section(device, "device", &["path"]);
    }
}

fn warn_unknown_in_section(value: &toml::Value, section: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known_set: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known_set.contains(key.as_str()) {
            eprintln!("warning: unknown {}.* entry `{}`", section, key);
        }
    }
}
