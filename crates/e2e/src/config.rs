//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{E2eError, E2eResult};

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the server under test; relative step URLs resolve against it
    pub base_url: String,

    /// Browser launch settings
    pub browser: BrowserConfig,

    /// Bounds for every wait
    pub timeouts: TimeoutConfig,

    /// Credentials submitted by the `login` step
    pub credentials: Credentials,

    /// Directory for the results report
    pub output_dir: PathBuf,

    /// Directory for screenshots
    pub screenshot_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:8443".to_string(),
            browser: BrowserConfig::default(),
            timeouts: TimeoutConfig::default(),
            credentials: Credentials::default(),
            output_dir: PathBuf::from("test-results"),
            screenshot_dir: PathBuf::from("test-results/screenshots"),
        }
    }
}

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,

    /// Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<PathBuf>,

    pub window_width: u32,
    pub window_height: u32,

    /// The local test instance uses a self-signed certificate
    pub ignore_certificate_errors: bool,

    pub launch_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window_width: 1280,
            window_height: 720,
            ignore_certificate_errors: true,
            launch_timeout_ms: 20_000,
        }
    }
}

/// Wait bounds, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_ms: u64,
    pub selector_ms: u64,
    pub http_ms: u64,
    pub poll_interval_ms: u64,

    /// Upper bound for any fixed `sleep` step
    pub max_sleep_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 15_000,
            selector_ms: 10_000,
            http_ms: 30_000,
            poll_interval_ms: 100,
            max_sleep_ms: 5_000,
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn selector(&self) -> Duration {
        Duration::from_millis(self.selector_ms)
    }

    pub fn http(&self) -> Duration {
        Duration::from_millis(self.http_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }
}

/// Login form credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub username_selector: String,
    pub password_selector: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "casuser".to_string(),
            password: "Mellon".to_string(),
            username_selector: "#username".to_string(),
            password_selector: "#password".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        url::Url::parse(&self.base_url)
            .map_err(|e| E2eError::Config(format!("base_url '{}': {}", self.base_url, e)))?;

        let t = &self.timeouts;
        if t.navigation_ms == 0 || t.selector_ms == 0 || t.http_ms == 0 {
            return Err(E2eError::Config("timeouts must be greater than zero".to_string()));
        }
        if t.poll_interval_ms >= t.selector_ms {
            return Err(E2eError::Config(format!(
                "poll_interval_ms ({}) must be below selector_ms ({})",
                t.poll_interval_ms, t.selector_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.base_url, "https://localhost:8443");
        assert_eq!(config.credentials.username, "casuser");
        assert!(config.browser.headless);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authflow.toml");
        std::fs::write(
            &path,
            r#"
base_url = "https://cas.example.test:8443"

[timeouts]
selector_ms = 2500
"#,
        )
        .unwrap();

        let config = HarnessConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://cas.example.test:8443");
        assert_eq!(config.timeouts.selector_ms, 2500);
        assert_eq!(config.timeouts.navigation_ms, 15_000);
        assert_eq!(config.credentials.password_selector, "#password");
    }

    #[test]
    fn test_rejects_unparsable_base_url() {
        let config = HarnessConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(E2eError::Config(_))));
    }
}
