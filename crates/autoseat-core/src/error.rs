//! Error types for the Autoseat workspace.

use thiserror::Error;

/// A shared error type for every Autoseat crate.
///
/// Variants follow the failure taxonomy of a seat run: configuration and
/// authentication problems end the run, operational problems are handled
/// locally by the caller (retry, fallback or skipping the current call).
#[derive(Error, Debug, Clone)]
pub enum AutoseatError {
    /// Missing or invalid configuration (startup-fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential login did not complete
    #[error("Authentication failed (status {status:?}): {message}")]
    Authentication { status: Option<u16>, message: String },

    /// Campaign phone-login was rejected or returned no session identifiers
    #[error("Phone login failed: {0}")]
    PhoneLogin(String),

    /// The platform no longer accepts the current session
    #[error("Session expired (status {status}): {message}")]
    SessionExpired { status: u16, message: String },

    /// Availability change was rejected
    #[error("Availability change failed: {0}")]
    Availability(String),

    /// Incoming-call poll failed
    #[error("Poll failed: {0}")]
    Poll(String),

    /// Hangup was not acknowledged
    #[error("Hangup failed: {0}")]
    Hangup(String),

    /// Disposition was rejected
    #[error("Disposition failed: {0}")]
    Disposition(String),

    /// Logout failed
    #[error("Logout failed: {0}")]
    Logout(String),

    /// Network-level failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Driven browser page failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// The automation connection to the browser is gone (socket closed, Chrome exited)
    #[error("Browser disconnected: {0}")]
    BrowserDisconnected(String),

    /// A UI control could not be located or used
    #[error("UI control '{control}' unavailable: {reason}")]
    ControlUnavailable { control: String, reason: String },

    /// Every strategy of a fallback ladder failed
    #[error("All {} attempts for '{operation}' failed", .attempts.len())]
    FallbackExhausted {
        operation: String,
        attempts: Vec<(String, String)>,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AutoseatError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Authentication error
    pub fn authentication(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Authentication {
            status,
            message: message.into(),
        }
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Browser error
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser(message.into())
    }

    /// Creates a BrowserDisconnected error
    pub fn browser_disconnected(message: impl Into<String>) -> Self {
        Self::BrowserDisconnected(message.into())
    }

    /// Creates a ControlUnavailable error
    pub fn control_unavailable(control: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ControlUnavailable {
            control: control.into(),
            reason: reason.into(),
        }
    }

    /// Creates an Io error with context
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Errors that end the current run: the loop stops, cleanup is best-effort.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Authentication { .. }
                | Self::PhoneLogin(_)
                | Self::SessionExpired { .. }
                | Self::BrowserDisconnected(_)
        )
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a session expiry
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Check if this is an exhausted fallback ladder
    pub fn is_fallback_exhausted(&self) -> bool {
        matches!(self, Self::FallbackExhausted { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for AutoseatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for AutoseatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AutoseatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for AutoseatError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization {
            format: "CSV".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (used at the binary edge)
impl From<anyhow::Error> for AutoseatError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, AutoseatError>`.
pub type Result<T> = std::result::Result<T, AutoseatError>;
