//! Driven browser page access.

pub mod devtools;
pub mod scripts;

pub use devtools::DevToolsPage;

use async_trait::async_trait;
use autoseat_core::{AutoseatError, Result};
use serde_json::Value;

/// A live tab of the platform's agent web app.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Evaluates a JS expression and returns its JSON value (`null` for undefined).
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Cookies visible to the page, as name/value pairs.
    async fn cookies(&self) -> Result<Vec<(String, String)>>;

    /// Closes the tab and the automation connection.
    async fn close(&self) -> Result<()>;
}

/// Result of clicking a control located by its visible text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked,
    Disabled,
    Hidden,
    Missing,
}

/// Clicks the control labelled `label`; anything but a click is an error.
pub async fn click_control(page: &dyn BrowserPage, label: &str) -> Result<()> {
    match click_by_text(page, label).await? {
        ClickOutcome::Clicked => Ok(()),
        ClickOutcome::Disabled => Err(AutoseatError::control_unavailable(label, "disabled")),
        ClickOutcome::Hidden => Err(AutoseatError::control_unavailable(label, "not visible")),
        ClickOutcome::Missing => Err(AutoseatError::control_unavailable(label, "not found")),
    }
}

/// Runs the click script and reports what happened.
pub async fn click_by_text(page: &dyn BrowserPage, label: &str) -> Result<ClickOutcome> {
    let value = page.evaluate(&scripts::click_by_text(label)).await?;
    Ok(match value.as_str() {
        Some("clicked") => ClickOutcome::Clicked,
        Some("disabled") => ClickOutcome::Disabled,
        Some("hidden") => ClickOutcome::Hidden,
        _ => ClickOutcome::Missing,
    })
}
