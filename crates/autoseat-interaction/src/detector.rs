//! Call detection: "is a call active right now, and who is it?"
//!
//! Two interchangeable implementations share one contract: `detect` never
//! blocks beyond a single check, is safe to call on a fixed cadence, and
//! degrades transient failures to "no call" so the listening loop keeps
//! going. Only fatal errors (expired session, lost browser connection)
//! propagate.

use crate::browser::BrowserPage;
use crate::browser::scripts::{self, ScopeAccessor};
use crate::platform_client::{PlatformClient, PollOutcome};
use async_trait::async_trait;
use autoseat_core::session::value_to_id;
use autoseat_core::{AgentSession, CallIdentity, CallRecord, PhoneState, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

#[async_trait]
pub trait CallDetector: Send + Sync {
    async fn detect(&self, session: &mut AgentSession) -> Result<Option<CallRecord>>;
}

/// Detects calls by polling the platform's incoming-call endpoint.
pub struct PollingDetector {
    client: PlatformClient,
}

impl PollingDetector {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CallDetector for PollingDetector {
    async fn detect(&self, session: &mut AgentSession) -> Result<Option<CallRecord>> {
        match self.client.poll_for_call(session).await {
            Ok(PollOutcome::Found(call)) => Ok(Some(call)),
            Ok(PollOutcome::Idle) => Ok(None),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Poll failed; treating as no call");
                Ok(None)
            }
        }
    }
}

/// Snapshot of the web app's live call state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveCallState {
    pub identity: Option<String>,
    pub info: Option<Value>,
    pub phone_state: Option<PhoneState>,
    pub session_id: Option<String>,
    pub agent_log_id: Option<String>,
}

impl LiveCallState {
    fn from_value(value: &Value) -> Self {
        Self {
            identity: value.get("identity").and_then(value_to_id),
            info: value.get("info").filter(|info| info.is_object()).cloned(),
            phone_state: value
                .get("phoneState")
                .and_then(Value::as_i64)
                .map(PhoneState::from_code),
            session_id: value.get("sessionId").and_then(value_to_id),
            agent_log_id: value.get("agentLogId").and_then(value_to_id),
        }
    }

    /// The call this state describes, if any.
    ///
    /// When the identity is visible but its info object is not populated yet,
    /// a minimal record keyed on the identity is returned.
    pub fn call(&self) -> Option<CallRecord> {
        let identity = self.identity.as_ref()?;
        let from_info = self
            .info
            .as_ref()
            .and_then(CallRecord::from_lead_info)
            .filter(|call| &call.lead_id == identity);
        Some(from_info.unwrap_or_else(|| CallRecord::minimal(CallIdentity::new(identity, None))))
    }
}

/// Reads the live call state from the driven agent page.
///
/// The front-end's state tree is reached through an ordered list of scope
/// accessors; the first accessor that yields a scope wins.
pub struct BrowserStateDetector {
    page: Arc<dyn BrowserPage>,
    accessors: Vec<ScopeAccessor>,
}

impl BrowserStateDetector {
    pub fn new(page: Arc<dyn BrowserPage>) -> Self {
        Self {
            page,
            accessors: scripts::scope_accessors(),
        }
    }

    /// Probes the accessors in order and returns the first readable state.
    pub async fn read_state(&self) -> Result<Option<LiveCallState>> {
        for accessor in &self.accessors {
            let script = scripts::read_call_state(accessor);
            match self.page.evaluate(&script).await {
                Ok(Value::Null) => continue,
                Ok(value) => {
                    debug!(accessor = accessor.name, "Read live call state");
                    return Ok(Some(LiveCallState::from_value(&value)));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(accessor = accessor.name, error = %e, "Scope accessor failed");
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl CallDetector for BrowserStateDetector {
    async fn detect(&self, _session: &mut AgentSession) -> Result<Option<CallRecord>> {
        match self.read_state().await {
            Ok(Some(state)) => Ok(state.call()),
            Ok(None) => Ok(None),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!(error = %e, "Live state unreadable; treating as no call");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_live_state_minimal_when_info_missing() {
        let state = LiveCallState::from_value(&json!({
            "identity": 42,
            "info": null,
            "phoneState": 4
        }));
        let call = state.call().expect("identity present");
        assert_eq!(call.lead_id, "42");
        assert!(call.phone_number.is_empty());
        assert_eq!(state.phone_state, Some(PhoneState::InCall));
    }

    #[test]
    fn test_live_state_uses_info_for_same_identity() {
        let state = LiveCallState::from_value(&json!({
            "identity": "42",
            "info": {"lead_id": 42, "call_log_id": 5, "phone_number": "5551234567"}
        }));
        let call = state.call().unwrap();
        assert_eq!(call.call_log_id.as_deref(), Some("5"));
        assert_eq!(call.phone_number, "5551234567");
    }

    #[test]
    fn test_live_state_ignores_stale_info() {
        let state = LiveCallState::from_value(&json!({
            "identity": "43",
            "info": {"lead_id": 42, "phone_number": "5551234567"}
        }));
        let call = state.call().unwrap();
        assert_eq!(call.lead_id, "43");
        assert!(call.phone_number.is_empty());
    }

    #[test]
    fn test_live_state_without_identity_is_no_call() {
        let state = LiveCallState::from_value(&json!({"identity": null, "phoneState": 2}));
        assert!(state.call().is_none());
        assert_eq!(state.phone_state, Some(PhoneState::Available));
    }
}
