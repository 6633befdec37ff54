//! Global calarm configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_REFRESH_SECS, DEFAULT_SNOOZE_MINUTES, DEFAULT_TICK_SECS, DEFAULT_WINDOW_DAYS};
use crate::error::{CalarmError, CalarmResult};

static DEFAULT_CALDAV_URL: &str = "http://localhost:5232/";
static DEFAULT_BIND: &str = "127.0.0.1:3001";
static DEFAULT_API_URL: &str = "http://127.0.0.1:3001";

pub const ENV_CALDAV_URL: &str = "CALARM_CALDAV_URL";
pub const ENV_AUTHORIZATION: &str = "CALARM_AUTHORIZATION";

/// Configuration at ~/.config/calarm/config.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalarmConfig {
    #[serde(default)]
    pub caldav: CaldavConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaldavConfig {
    pub url: String,
    /// Calendar collection path, appended to `url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CaldavConfig {
    fn default() -> Self {
        CaldavConfig {
            url: DEFAULT_CALDAV_URL.to_string(),
            calendar: None,
            timeout_secs: 30,
        }
    }
}

impl CaldavConfig {
    /// The calendar collection URL, always with a trailing slash.
    pub fn calendar_url(&self) -> String {
        let mut url = self.url.trim_end_matches('/').to_string();
        if let Some(calendar) = self.calendar.as_deref().map(|c| c.trim_matches('/')) {
            if !calendar.is_empty() {
                url.push('/');
                url.push_str(calendar);
            }
        }
        url.push('/');
        url
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub api_url: String,
    /// Sent verbatim as the `Authorization` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    pub tick_interval_secs: u64,
    /// 0 disables the periodic refresh
    pub refresh_interval_secs: u64,
    pub lookahead_days: i64,
    pub snooze_minutes: u32,
    /// Per-request timeout for the REST API
    pub timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            api_url: DEFAULT_API_URL.to_string(),
            authorization: None,
            tick_interval_secs: DEFAULT_TICK_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            lookahead_days: DEFAULT_WINDOW_DAYS,
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            timeout_secs: 30,
        }
    }
}

impl CalarmConfig {
    pub fn config_path() -> CalarmResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalarmError::Config("Could not determine config directory".into()))?
            .join("calarm");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> CalarmResult<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> CalarmResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CalarmResult<Self> {
        toml::from_str(content).map_err(|e| CalarmError::Config(e.to_string()))
    }

    /// Override values from the environment, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_CALDAV_URL).filter(|v| !v.is_empty()) {
            self.caldav.url = url;
        }
        if let Some(auth) = var(ENV_AUTHORIZATION).filter(|v| !v.is_empty()) {
            self.monitor.authorization = Some(auth);
        }
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalarmResult<()> {
        let contents = format!(
            "\
# calarm configuration

[caldav]
# url = \"{DEFAULT_CALDAV_URL}\"
# calendar = \"user/calendar\"
# timeout_secs = 30

[server]
# bind = \"{DEFAULT_BIND}\"

[monitor]
# api_url = \"{DEFAULT_API_URL}\"
# authorization = \"Basic dXNlcjpwYXNz\"
# tick_interval_secs = {DEFAULT_TICK_SECS}
# refresh_interval_secs = {DEFAULT_REFRESH_SECS}
# lookahead_days = {DEFAULT_WINDOW_DAYS}
# snooze_minutes = {DEFAULT_SNOOZE_MINUTES}
# timeout_secs = 30
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalarmError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalarmError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = CalarmConfig::parse("").unwrap();
        assert_eq!(config, CalarmConfig::default());
        assert_eq!(config.caldav.url, "http://localhost:5232/");
        assert_eq!(config.server.bind, "127.0.0.1:3001");
        assert_eq!(config.monitor.tick_interval_secs, 5);
        assert_eq!(config.monitor.lookahead_days, 30);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = CalarmConfig::parse(
            r#"
[caldav]
url = "https://dav.example.com"
calendar = "/alice/work/"

[monitor]
refresh_interval_secs = 0
timeout_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.caldav.calendar_url(), "https://dav.example.com/alice/work/");
        assert_eq!(config.caldav.timeout_secs, 30);
        assert_eq!(config.monitor.refresh_interval_secs, 0);
        assert_eq!(config.monitor.snooze_minutes, 5);
        assert_eq!(config.monitor.timeout_secs, 5);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let result = CalarmConfig::parse("[caldav\nurl = 1");
        assert!(matches!(result, Err(CalarmError::Config(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = CalarmConfig::default();
        config.apply_env(|key| match key {
            ENV_CALDAV_URL => Some("http://dav.local/".into()),
            ENV_AUTHORIZATION => Some("Bearer t".into()),
            _ => None,
        });
        assert_eq!(config.caldav.url, "http://dav.local/");
        assert_eq!(config.monitor.authorization.as_deref(), Some("Bearer t"));

        // Empty values are ignored
        let mut config = CalarmConfig::default();
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config, CalarmConfig::default());
    }

    #[test]
    fn calendar_url_without_calendar() {
        assert_eq!(CaldavConfig::default().calendar_url(), "http://localhost:5232/");
    }

    #[test]
    fn default_template_parses_to_defaults() {
        let dir = std::env::temp_dir().join(format!("calarm-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        CalarmConfig::create_default_config(&path).unwrap();

        let config = CalarmConfig::load_from(&path).unwrap();
        assert_eq!(config, CalarmConfig::default());

        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(CalarmConfig::load_from(&path).unwrap(), CalarmConfig::default());
    }
}
