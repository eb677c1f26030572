use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::live::{ShowSchedule, LIVE_WINDOW_MINUTES};
use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub mpv: MpvConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Persisted playback state.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
}

/// Endpoints of the two metadata services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_episodes_base")]
    pub episodes_base: String,
    #[serde(default = "default_news_base")]
    pub news_base: String,
    /// Per-request timeout. 0 disables the timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_window_minutes")]
    pub window_minutes: f64,
    /// Weekday of the regular show, e.g. "Saturday" or "sat".
    #[serde(default = "default_schedule_weekday")]
    pub schedule_weekday: String,
    /// UTC hour of the regular show.
    #[serde(default = "default_schedule_hour_utc")]
    pub schedule_hour_utc: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            episodes_base: default_episodes_base(),
            news_base: default_news_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            window_minutes: default_window_minutes(),
            schedule_weekday: default_schedule_weekday(),
            schedule_hour_utc: default_schedule_hour_utc(),
        }
    }
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
        }
    }
}

impl LiveConfig {
    /// Weekly schedule used for the "next show" message. Falls back to the
    /// default schedule when the configured weekday does not parse.
    pub fn schedule(&self) -> ShowSchedule {
        let weekday = self
            .schedule_weekday
            .parse()
            .unwrap_or(ShowSchedule::default().weekday);
        ShowSchedule {
            weekday,
            hour_utc: self.schedule_hour_utc.min(23),
        }
    }
}

fn default_state_file() -> PathBuf {
    platform::data_dir().join("state.json")
}

fn default_episodes_base() -> String {
    "https://radio-t.com/site-api".to_string()
}

fn default_news_base() -> String {
    "https://news.radio-t.com/api/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_stream_url() -> String {
    "https://stream.radio-t.com".to_string()
}

fn default_window_minutes() -> f64 {
    LIVE_WINDOW_MINUTES
}

fn default_schedule_weekday() -> String {
    "Saturday".to_string()
}

fn default_schedule_hour_utc() -> u32 {
    22
}

fn default_volume() -> f32 {
    0.7
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            api: ApiConfig::default(),
            live: LiveConfig::default(),
            mpv: MpvConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.episodes_base, "https://radio-t.com/site-api");
        assert_eq!(config.api.news_base, "https://news.radio-t.com/api/v1");
        assert_eq!(config.live.stream_url, "https://stream.radio-t.com");
        assert_eq!(config.live.window_minutes, 300.0);
        assert!(config.daemon.state_file.ends_with("rt/state.json"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [live]
            window_minutes = 240.0
            schedule_weekday = "sun"
            "#,
        )
        .unwrap();
        assert_eq!(config.live.window_minutes, 240.0);
        assert_eq!(config.live.stream_url, "https://stream.radio-t.com");
        assert_eq!(config.live.schedule().weekday, Weekday::Sun);
        assert_eq!(config.api.request_timeout_secs, 15);
    }

    #[test]
    fn test_bad_weekday_falls_back() {
        let live = LiveConfig {
            schedule_weekday: "someday".to_string(),
            schedule_hour_utc: 40,
            ..LiveConfig::default()
        };
        let schedule = live.schedule();
        assert_eq!(schedule.weekday, Weekday::Sat);
        assert_eq!(schedule.hour_utc, 23);
    }
}
