//! Configuration model for an Autoseat run.
//!
//! Loading (file discovery, environment overlay) lives in
//! `autoseat-infrastructure`; this module only defines the shape, the
//! defaults and validation.

use crate::error::{AutoseatError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How the seat talks to the platform.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Native REST polling
    #[default]
    Api,
    /// Driven browser session with REST fallbacks
    Browser,
}

impl FromStr for TransportMode {
    type Err = AutoseatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" | "rest" => Ok(Self::Api),
            "browser" | "ui" => Ok(Self::Browser),
            other => Err(AutoseatError::config(format!(
                "unknown transport mode '{}' (expected 'api' or 'browser')",
                other
            ))),
        }
    }
}

/// Root configuration structure (config.toml).
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AgentConfig {
    pub base_url: String,
    pub mode: TransportMode,
    /// Number of calls to handle before stopping; 0 means unlimited.
    pub max_calls: u32,
    pub credentials: Credentials,
    pub campaign: CampaignConfig,
    pub timing: TimingConfig,
    pub codes: CodesConfig,
    pub endpoints: EndpointsConfig,
    pub browser: BrowserConfig,
    pub labeler: LabelerConfig,
    pub call_log: CallLogConfig,
}

#[derive(Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Pre-issued `name=value` cookie that lets the platform skip 2FA.
    pub trusted_device_cookie: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field(
                "trusted_device_cookie",
                &self.trusted_device_cookie.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct CampaignConfig {
    pub id: String,
    pub name: String,
    pub campaign_type: String,
    pub dial_method: String,
    pub channels: Vec<String>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            campaign_type: "outbound".to_string(),
            dial_method: "RATIO".to_string(),
            channels: vec!["voice".to_string()],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TimingConfig {
    /// Simulated talk time per call
    pub call_duration_secs: u64,
    pub poll_interval_ms: u64,
    /// Bound on waiting for the phone to report `Available` after a call
    pub phone_state_timeout_secs: u64,
    /// Delay before retrying a UI control that was not found
    pub ui_retry_delay_ms: u64,
    /// Delay between end-call and disposition (panel surfacing)
    pub panel_wait_ms: u64,
    /// Pause after a failed call sequence
    pub error_pause_ms: u64,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            call_duration_secs: 30,
            poll_interval_ms: 1500,
            phone_state_timeout_secs: 10,
            ui_retry_delay_ms: 1500,
            panel_wait_ms: 1000,
            error_pause_ms: 3000,
            request_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    pub fn call_duration(&self) -> Duration {
        Duration::from_secs(self.call_duration_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn phone_state_timeout(&self) -> Duration {
        Duration::from_secs(self.phone_state_timeout_secs)
    }

    pub fn ui_retry_delay(&self) -> Duration {
        Duration::from_millis(self.ui_retry_delay_ms)
    }

    pub fn panel_wait(&self) -> Duration {
        Duration::from_millis(self.panel_wait_ms)
    }

    pub fn error_pause(&self) -> Duration {
        Duration::from_millis(self.error_pause_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Opaque platform codes, passed through verbatim.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct CodesConfig {
    pub ready: String,
    pub not_ready: String,
    pub disposition: String,
    /// Visible label of the disposition status control in the web UI
    pub disposition_label: String,
    pub logout: String,
    pub term_reason: String,
}

impl Default for CodesConfig {
    fn default() -> Self {
        Self {
            ready: "1".to_string(),
            not_ready: "2".to_string(),
            disposition: "NC".to_string(),
            disposition_label: "Not Contacted".to_string(),
            logout: "1".to_string(),
            term_reason: "AGENT".to_string(),
        }
    }
}

/// REST paths relative to `base_url`.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct EndpointsConfig {
    pub login: String,
    pub phone_login: String,
    pub availability: String,
    pub resume: String,
    pub poll: String,
    pub hangup: String,
    pub disposition: String,
    pub logout: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            phone_login: "/api/agent/phone/login".to_string(),
            availability: "/api/agent/availability".to_string(),
            resume: "/api/agent/resume".to_string(),
            poll: "/api/agent/call/incoming".to_string(),
            hangup: "/api/agent/call/hangup".to_string(),
            disposition: "/api/agent/call/disposition".to_string(),
            logout: "/api/agent/logout".to_string(),
        }
    }
}

/// Driven-browser settings (Chrome DevTools endpoint and visible control texts).
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct BrowserConfig {
    pub devtools_url: String,
    /// Fragment of the agent page URL used to pick the tab
    pub page_url_contains: String,
    pub command_timeout_secs: u64,
    pub end_call_label: String,
    pub disposition_panel_label: String,
    pub available_label: String,
    pub not_ready_label: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            devtools_url: "http://127.0.0.1:9222".to_string(),
            page_url_contains: "/agent".to_string(),
            command_timeout_secs: 10,
            end_call_label: "Hang Up".to_string(),
            disposition_panel_label: "WRAPUP".to_string(),
            available_label: "Available".to_string(),
            not_ready_label: "Not Ready - Break".to_string(),
        }
    }
}

impl BrowserConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// External spam-label producer run alongside the seat.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct LabelerConfig {
    /// Program and arguments of the label producer
    pub command: Vec<String>,
    /// CSV the producer writes
    pub output: PathBuf,
    /// Merged report destination
    pub merged_output: PathBuf,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "autoseat".to_string(),
                "labels".to_string(),
                "watch".to_string(),
            ],
            output: PathBuf::from("spam_calls_record.csv"),
            merged_output: PathBuf::from("merged_calls.csv"),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct CallLogConfig {
    pub path: PathBuf,
}

impl Default for CallLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("call_log.csv"),
        }
    }
}

impl AgentConfig {
    /// Checks the identity fields a run cannot start without.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.base_url.trim().is_empty() {
            missing.push("base_url");
        }
        // the browser transport adopts the page's logged-in session
        if self.mode == TransportMode::Api {
            if self.credentials.username.trim().is_empty() {
                missing.push("credentials.username");
            }
            if self.credentials.password.is_empty() {
                missing.push("credentials.password");
            }
        }
        if self.campaign.id.trim().is_empty() {
            missing.push("campaign.id");
        }
        if !missing.is_empty() {
            return Err(AutoseatError::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(AutoseatError::config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.codes.ready == self.codes.not_ready {
            return Err(AutoseatError::config(
                "codes.ready and codes.not_ready must differ",
            ));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(AutoseatError::config("timing.poll_interval_ms must be > 0"));
        }
        Ok(())
    }

    /// The configured call budget, `None` when unlimited.
    pub fn call_budget(&self) -> Option<u32> {
        (self.max_calls > 0).then_some(self.max_calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AgentConfig {
        let mut config = AgentConfig {
            base_url: "https://dialer.example.com".into(),
            ..Default::default()
        };
        config.credentials.username = "agent01".into();
        config.credentials.password = "secret".into();
        config.campaign.id = "1234".into();
        config
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_lists_missing_identity() {
        let err = AgentConfig::default().validate().unwrap_err();
        assert!(err.is_config());
        let message = err.to_string();
        assert!(message.contains("credentials.username"));
        assert!(message.contains("campaign.id"));
    }

    #[test]
    fn test_browser_mode_needs_no_credentials() {
        let mut config = valid();
        config.credentials.username.clear();
        config.credentials.password.clear();
        assert!(config.validate().is_err());

        config.mode = TransportMode::Browser;
        assert!(config.validate().is_ok());

        config.campaign.id.clear();
        assert!(config.validate().unwrap_err().to_string().contains("campaign.id"));
    }

    #[test]
    fn test_validate_rejects_identical_availability_codes() {
        let mut config = valid();
        config.codes.not_ready = config.codes.ready.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_from_toml() {
        let config: AgentConfig = toml::from_str(
            r#"
            base_url = "https://dialer.example.com"
            mode = "browser"
            max_calls = 5

            [credentials]
            username = "agent01"
            password = "pw"

            [campaign]
            id = "77"
            name = "Spring"

            [timing]
            call_duration_secs = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, TransportMode::Browser);
        assert_eq!(config.call_budget(), Some(5));
        assert_eq!(config.timing.call_duration(), Duration::from_secs(12));
        assert_eq!(config.timing.poll_interval_ms, 1500);
        assert_eq!(config.campaign.dial_method, "RATIO");
        assert!(!format!("{:?}", config.credentials).contains("pw"));
    }

    #[test]
    fn test_transport_mode_from_str() {
        assert_eq!("API".parse::<TransportMode>().unwrap(), TransportMode::Api);
        assert_eq!("browser".parse::<TransportMode>().unwrap(), TransportMode::Browser);
        assert!("carrier-pigeon".parse::<TransportMode>().is_err());
    }
}
