use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RENDER_WAIT_SECS: u64 = 5;
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:4444";

/// Rendering engine used to load bulletin pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Engine {
    /// Plain HTTP fetch. Scripts are not executed.
    #[default]
    Http,
    Firefox,
    Chrome,
}

impl Engine {
    pub fn is_webdriver(&self) -> bool {
        !matches!(self, Engine::Http)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown engine '{0}', expected one of: http, firefox, chrome")]
pub struct EngineParseError(String);

impl FromStr for Engine {
    type Err = EngineParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Engine::Http),
            "firefox" | "gecko" => Ok(Engine::Firefox),
            "chrome" | "chromium" => Ok(Engine::Chrome),
            _ => Err(EngineParseError(s.to_string())),
        }
    }
}

impl Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Http => write!(f, "http"),
            Engine::Firefox => write!(f, "firefox"),
            Engine::Chrome => write!(f, "chrome"),
        }
    }
}

/// Runtime settings handed to an [`crate::Extractor`] at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Per-navigation timeout. Exceeding it aborts the run.
    pub timeout: Duration,
    pub user_agent: String,
    /// Overrides the source's number of comprehensive bulletins to read.
    pub complete_links: Option<usize>,
    pub engine: Engine,
    /// WebDriver server the browser engines connect to.
    pub webdriver_url: String,
    /// Pause after each browser navigation so scripts can render the page.
    pub render_wait: Duration,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            complete_links: None,
            engine: Engine::default(),
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            render_wait: Duration::from_secs(DEFAULT_RENDER_WAIT_SECS),
        }
    }
}

impl ExtractorConfig {
    pub fn validate(self) -> Result<Self, String> {
        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }
        if self.complete_links.is_some_and(|n| n == 0) {
            return Err("Complete bulletin count must be greater than 0".to_string());
        }
        if self.user_agent.trim().is_empty() {
            return Err("User agent cannot be empty".to_string());
        }
        if self.engine.is_webdriver() {
            Url::parse(&self.webdriver_url).map_err(|e| {
                format!("Invalid WebDriver URL '{}': {}", self.webdriver_url, e)
            })?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default().validate().unwrap();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("vaxbulletin/"));
        assert_eq!(config.engine, Engine::Http);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_timeout = ExtractorConfig {
            timeout: Duration::ZERO,
            ..ExtractorConfig::default()
        };
        assert!(zero_timeout.validate().is_err());

        let zero_links = ExtractorConfig {
            complete_links: Some(0),
            ..ExtractorConfig::default()
        };
        assert!(zero_links.validate().is_err());
    }

    #[test]
    fn test_engine_from_str() {
        assert_eq!("firefox".parse::<Engine>(), Ok(Engine::Firefox));
        assert_eq!("Chromium".parse::<Engine>(), Ok(Engine::Chrome));
        assert_eq!("HTTP".parse::<Engine>(), Ok(Engine::Http));
        assert!("safari".parse::<Engine>().is_err());
        assert_eq!(Engine::Firefox.to_string(), "firefox");
    }

    #[test]
    fn test_webdriver_url_checked_only_for_browser_engines() {
        let http = ExtractorConfig {
            webdriver_url: "not a url".to_string(),
            ..ExtractorConfig::default()
        };
        assert!(http.validate().is_ok());

        let firefox = ExtractorConfig {
            engine: Engine::Firefox,
            webdriver_url: "not a url".to_string(),
            ..ExtractorConfig::default()
        };
        let err = firefox.validate().unwrap_err();
        assert!(err.contains("WebDriver URL"));

        let chrome = ExtractorConfig {
            engine: Engine::Chrome,
            webdriver_url: "http://127.0.0.1:9515".to_string(),
            ..ExtractorConfig::default()
        };
        assert!(chrome.validate().is_ok());
    }
}
