// Sync settings
// Loaded from ~/.config/sheetpilot/settings.json, then environment overrides

use serde::{Deserialize, Serialize};
use sheetpilot_protocol::ChatMode;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_API_BASE: &str = "SHEETPILOT_API_BASE";
pub const ENV_AUTOSAVE_MS: &str = "SHEETPILOT_AUTOSAVE_MS";

pub const DEFAULT_AUTOSAVE_QUIET_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Settings for the sync engine and its network collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Persistence REST base URL
    pub api_base: String,

    /// AI job websocket endpoint
    pub websocket_url: String,

    /// Quiet period before a dirty document is saved
    pub autosave_quiet_ms: u64,

    /// Mode sent with every `start_ai_job`
    pub chat_mode: ChatMode,

    /// Per-request timeout for REST calls
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.sheetpilot.app".to_string(),
            websocket_url: "wss://api.sheetpilot.app/ws".to_string(),
            autosave_quiet_ms: DEFAULT_AUTOSAVE_QUIET_MS,
            chat_mode: ChatMode::Agent,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SyncSettings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetpilot");
        config_dir.join("settings.json")
    }

    /// Load settings from the default path and apply environment overrides
    pub fn load() -> Self {
        let mut settings = Self::load_from(&Self::config_path());
        settings.apply_overrides(|name| env::var(name).ok());
        settings
    }

    /// Load settings from `path`, falling back to defaults.
    /// A missing file is not an error; a malformed one is logged.
    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                return Self::default();
            }
        };

        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        match serde_json::from_str(&cleaned) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Error parsing {}: {}; using default settings", path.display(), e);
                Self::default()
            }
        }
    }

    /// Apply environment overrides. `lookup` returns the variable's value, if set.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.is_empty()) {
            self.api_base = base;
        }
        if let Some(raw) = lookup(ENV_AUTOSAVE_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.autosave_quiet_ms = ms,
                Err(_) => log::warn!("Ignoring {}={:?}: not a number of milliseconds", ENV_AUTOSAVE_MS, raw),
            }
        }
    }

    pub fn autosave_quiet(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.autosave_quiet_ms)
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Save current settings to the default path
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let s = SyncSettings::default();
        assert_eq!(s.autosave_quiet_ms, 2000);
        assert_eq!(s.chat_mode, ChatMode::Agent);
        assert_eq!(s.request_timeout().as_secs(), 60);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            "// local backend\n{\n  \"api_base\": \"http://localhost:8080\",\n  \"chat_mode\": \"edit\"\n}\n",
        )
        .unwrap();

        let s = SyncSettings::load_from(&path);
        assert_eq!(s.api_base, "http://localhost:8080");
        assert_eq!(s.chat_mode, ChatMode::Edit);
        assert_eq!(s.autosave_quiet_ms, DEFAULT_AUTOSAVE_QUIET_MS);
    }

    #[test]
    fn test_missing_or_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(SyncSettings::load_from(&dir.path().join("nope.json")), SyncSettings::default());

        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SyncSettings::load_from(&path), SyncSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg/settings.json");
        let s = SyncSettings { autosave_quiet_ms: 750, ..Default::default() };
        s.save_to(&path).unwrap();
        assert_eq!(SyncSettings::load_from(&path), s);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_BASE, "https://staging.example"),
            (ENV_AUTOSAVE_MS, "500"),
        ]
        .into_iter()
        .collect();

        let mut s = SyncSettings::default();
        s.apply_overrides(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(s.api_base, "https://staging.example");
        assert_eq!(s.autosave_quiet_ms, 500);
    }

    #[test]
    fn test_bad_env_value_is_ignored() {
        let mut s = SyncSettings::default();
        s.apply_overrides(|name| (name == ENV_AUTOSAVE_MS).then(|| "soon".to_string()));
        assert_eq!(s.autosave_quiet_ms, DEFAULT_AUTOSAVE_QUIET_MS);
    }
}
