// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Configuration is persisted in TOML format through `confy`. Every field has
//! a serde default so older files keep loading after new settings are added.

use serde::{Deserialize, Serialize};

use natrak_client::{DEFAULT_TRACK_URL, EVENT_TRACK_URL};

const APP_NAME: &str = "natrak-overlay";
const CONFIG_NAME: &str = "config";

/// Environment variable that overrides the configured flight-data API key.
pub const API_KEY_ENV: &str = "NATRAK_API_KEY";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Fetch from the event track feed instead of the published one
    #[serde(default)]
    pub use_event_tracks: bool,

    /// Published NAT track feed
    #[serde(default = "default_track_url")]
    pub track_url: String,

    /// Event track feed
    #[serde(default = "default_event_track_url")]
    pub event_track_url: String,

    /// Minutes between track refetches, 0 to load once at startup
    #[serde(default = "default_track_refresh_minutes")]
    pub track_refresh_minutes: u64,

    /// Base URL of the flight-data API. Flight sync is disabled without it.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Flight-data API key (optional, env var takes precedence)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Background worker threads for fetches and route resolution
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Refresh tick period in milliseconds
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Aircraft this many minutes or less from sector entry are tracked
    #[serde(default = "default_inbound_window_minutes")]
    pub inbound_window_minutes: i32,

    /// Grace period for in-flight work at shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_track_url() -> String {
    DEFAULT_TRACK_URL.to_string()
}

fn default_event_track_url() -> String {
    EVENT_TRACK_URL.to_string()
}

fn default_track_refresh_minutes() -> u64 {
    30
}

fn default_worker_threads() -> usize {
    2
}

fn default_refresh_interval_ms() -> u64 {
    1000
}

fn default_inbound_window_minutes() -> i32 {
    90
}

fn default_shutdown_timeout_secs() -> u64 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            use_event_tracks: false,
            track_url: default_track_url(),
            event_track_url: default_event_track_url(),
            track_refresh_minutes: default_track_refresh_minutes(),
            api_base_url: None,
            api_key: None,
            worker_threads: default_worker_threads(),
            refresh_interval_ms: default_refresh_interval_ms(),
            inbound_window_minutes: default_inbound_window_minutes(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults if absent
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    /// The track feed selected by `use_event_tracks`
    #[must_use]
    pub fn active_track_url(&self) -> &str {
        if self.use_event_tracks {
            &self.event_track_url
        } else {
            &self.track_url
        }
    }

    /// Resolve the flight-data API key from environment or config
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        Self::pick_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    fn pick_api_key(env_key: Option<String>, config_key: Option<&str>) -> Option<String> {
        // Check environment variable first
        if let Some(key) = env_key.filter(|k| !k.is_empty()) {
            return Some(key);
        }

        // Fall back to config
        config_key.map(str::to_string).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"use_event_tracks": true}"#).unwrap();

        assert!(config.use_event_tracks);
        assert_eq!(config.track_url, DEFAULT_TRACK_URL);
        assert_eq!(config.inbound_window_minutes, 90);
        assert_eq!(config.refresh_interval_ms, 1000);
        assert_eq!(config.api_base_url, None);
    }

    #[test]
    fn test_active_track_url() {
        let mut config = AppConfig::default();
        assert_eq!(config.active_track_url(), DEFAULT_TRACK_URL);

        config.use_event_tracks = true;
        assert_eq!(config.active_track_url(), EVENT_TRACK_URL);
    }

    #[test]
    fn test_env_key_takes_precedence() {
        assert_eq!(
            AppConfig::pick_api_key(Some("env".to_string()), Some("file")),
            Some("env".to_string())
        );
        assert_eq!(
            AppConfig::pick_api_key(Some(String::new()), Some("file")),
            Some("file".to_string())
        );
        assert_eq!(AppConfig::pick_api_key(None, Some("")), None);
        assert_eq!(AppConfig::pick_api_key(None, None), None);
    }
}
