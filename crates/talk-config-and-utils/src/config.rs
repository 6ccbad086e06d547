//! Configuration management.
//!
//! A [`Config`] is loaded once at startup and handed to the components that
//! need it; nothing reads process-wide mutable settings afterwards.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Account API base URL (can be overridden at compile time via TALK_API_BASE_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("TALK_API_BASE_URL") {
    Some(url) => url,
    None => "https://katalk.kakao.com/android/account",
};

/// Share API base URL used for `authWrite` (compile-time override: TALK_SHARE_BASE_URL).
pub const DEFAULT_SHARE_BASE_URL: &str = match option_env!("TALK_SHARE_BASE_URL") {
    Some(url) => url,
    None => "https://talk-pilsner.kakao.com/talk/share",
};

/// Passcode authorization endpoint. Lives on a fixed host, not under the API base.
pub const DEFAULT_AUTHORIZE_URL: &str =
    "https://talk-pilsner.kakao.com/talk/account/passcodeLogin/authorize";

/// Default application version reported in user agents.
pub const DEFAULT_APP_VERSION: &str = "10.4.3";

/// Default client language.
pub const DEFAULT_LANGUAGE: &str = "ko";

/// Default platform tag.
pub const DEFAULT_PLATFORM: &str = "android";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Remote endpoints and client identity strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Account API base URL (passcode, registration, login, refresh).
    pub base_url: String,
    /// Share API base URL (message send).
    pub share_base_url: String,
    /// Passcode authorization endpoint.
    pub authorize_url: String,
    /// Application version, e.g. `10.4.3`.
    pub app_version: String,
    /// Client language, e.g. `ko`.
    pub language: String,
    /// Platform tag, e.g. `android`.
    pub platform: String,
    /// User agent for the share API. Falls back to [`ApiConfig::user_agent`].
    pub share_user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            share_base_url: DEFAULT_SHARE_BASE_URL.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            app_version: DEFAULT_APP_VERSION.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
            share_user_agent: None,
        }
    }
}

impl ApiConfig {
    /// `KT/<version> An/9 <language>`
    pub fn user_agent(&self) -> String {
        format!("KT/{} An/9 {}", self.app_version, self.language)
    }

    /// Value of the `A` header: `<platform>/<version>/<language>`.
    pub fn platform_tag(&self) -> String {
        format!("{}/{}/{}", self.platform, self.app_version, self.language)
    }

    /// Value of the `Talk-Agent` header used by passcode authorization.
    pub fn talk_agent(&self) -> String {
        format!("android/{}/{}", self.app_version, self.language)
    }

    pub fn share_user_agent(&self) -> String {
        self.share_user_agent
            .clone()
            .unwrap_or_else(|| self.user_agent())
    }

    /// Join `path` onto the account API base URL.
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Join `path` onto the share API base URL.
    pub fn share_endpoint(&self, path: &str) -> String {
        join_url(&self.share_base_url, path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Device description sent during passcode generation and login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDefaults {
    pub name: String,
    pub model: String,
    pub os_version: String,
}

impl Default for DeviceDefaults {
    fn default() -> Self {
        Self {
            name: "talkbridge".to_string(),
            model: "SM-G998N".to_string(),
            os_version: "11".to_string(),
        }
    }
}

/// Bounds for the device-registration poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationPolicy {
    /// Hard cap on `registerDevice` calls per authentication attempt.
    pub max_attempts: u32,
    /// Fixed delay between consecutive calls.
    pub interval_ms: u64,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_ms: 1000,
        }
    }
}

impl RegistrationPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub device: DeviceDefaults,
    #[serde(default)]
    pub registration: RegistrationPolicy,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api: ApiConfig::default(),
            device: DeviceDefaults::default(),
            registration: RegistrationPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from `paths.config_file()`, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Reject configurations the protocol cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        Url::parse(&self.api.base_url)?;
        Url::parse(&self.api.share_base_url)?;
        Url::parse(&self.api.authorize_url)?;

        if self.registration.max_attempts == 0 {
            return Err(CoreError::Config(
                "registration.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.device.name.trim().is_empty() {
            return Err(CoreError::Config("device.name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Only the log level can be overridden from the environment.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("TALK_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }
}
