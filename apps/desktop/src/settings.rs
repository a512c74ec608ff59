use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use listing_core::{BridgeMode, DEFAULT_REQUEST_TIMEOUT};
use shared::domain::ListingKind;
use tracing::warn;

pub const SETTINGS_FILE: &str = "mylist.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub server_url: String,
    pub manager: String,
    pub role: String,
    pub kind: ListingKind,
    pub bridge_mode: BridgeMode,
    pub request_timeout: Duration,
    pub channel_path: Option<String>,
    pub config_path: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            manager: String::new(),
            role: "staff".into(),
            kind: ListingKind::Oneroom,
            bridge_mode: BridgeMode::Modular,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            channel_path: None,
            config_path: default_config_path(),
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|base| base.join("mylist").join("config.json"))
        .unwrap_or_else(|| PathBuf::from("mylist_config.json"))
}

/// Defaults, then `mylist.toml` in the working directory, then `MYLIST_*`
/// environment variables.
pub fn load_settings() -> AppSettings {
    let file_cfg = fs::read_to_string(SETTINGS_FILE)
        .ok()
        .and_then(|raw| match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(cfg) => Some(cfg),
            Err(err) => {
                warn!("settings: ignoring malformed {SETTINGS_FILE}: {err}");
                None
            }
        })
        .unwrap_or_default();
    resolve_settings(&file_cfg, |name| std::env::var(name).ok())
}

pub fn resolve_settings(
    file_cfg: &HashMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> AppSettings {
    let mut settings = AppSettings::default();

    let lookup = |key: &str, env_name: &str| -> Option<String> {
        env(env_name)
            .or_else(|| file_cfg.get(key).cloned())
            .filter(|v| !v.trim().is_empty())
    };

    if let Some(v) = lookup("server_url", "MYLIST_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("manager", "MYLIST_MANAGER") {
        settings.manager = v;
    }
    if let Some(v) = lookup("role", "MYLIST_ROLE") {
        settings.role = v;
    }
    if let Some(v) = lookup("kind", "MYLIST_KIND") {
        match v.parse() {
            Ok(kind) => settings.kind = kind,
            Err(err) => warn!("settings: {err}"),
        }
    }
    if let Some(v) = lookup("bridge_mode", "MYLIST_BRIDGE_MODE") {
        match v.parse() {
            Ok(mode) => settings.bridge_mode = mode,
            Err(err) => warn!("settings: {err}"),
        }
    }
    if let Some(v) = lookup("request_timeout_secs", "MYLIST_TIMEOUT_SECS") {
        match v.parse::<u64>() {
            Ok(secs) if secs > 0 => settings.request_timeout = Duration::from_secs(secs),
            _ => warn!("settings: invalid request timeout '{v}'"),
        }
    }
    if let Some(v) = lookup("channel_path", "MYLIST_CHANNEL_PATH") {
        settings.channel_path = Some(v);
    }
    if let Some(v) = lookup("config_path", "MYLIST_CONFIG_PATH") {
        settings.config_path = PathBuf::from(v);
    }

    settings
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
