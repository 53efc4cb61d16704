//! The seam between the call-session controller and a concrete transport.
//!
//! `autoseat-interaction` provides the REST-only and the browser-driven
//! implementations; the controller only ever sees this trait.

use crate::call::{CallRecord, PhoneState};
use crate::error::Result;
use crate::session::AgentSession;
use async_trait::async_trait;
use std::time::Duration;

/// Every platform operation the controller drives, for one transport.
///
/// Operations returning `Result<&'static str>` report the name of the
/// strategy that carried them out (e.g. `"rest"`, `"ui-click"`).
#[async_trait]
pub trait SeatDriver: Send {
    /// Short transport name for logs.
    fn label(&self) -> &'static str;

    /// Establishes the agent session (credentials + campaign phone login).
    async fn login(&mut self, session: &mut AgentSession) -> Result<()>;

    /// Makes the agent available for calls.
    async fn set_available(&mut self, session: &mut AgentSession) -> Result<&'static str>;

    /// Takes the agent out of the queue.
    async fn set_not_ready(&mut self, session: &mut AgentSession) -> Result<&'static str>;

    /// One non-blocking check for an incoming/active call.
    ///
    /// Transient failures surface as `Ok(None)`; only fatal errors propagate.
    async fn detect(&mut self, session: &mut AgentSession) -> Result<Option<CallRecord>>;

    /// Current phone state, or `None` when the transport cannot observe it.
    async fn phone_state(&mut self, session: &mut AgentSession) -> Option<PhoneState>;

    /// Fills in lead details missing from `call` (identity seen before its
    /// info). Transports that always detect complete records keep the default.
    async fn refresh_call(&mut self, _session: &mut AgentSession, _call: &mut CallRecord) {}

    /// Ends the call on the platform after `talk_time`.
    async fn end_call(
        &mut self,
        session: &mut AgentSession,
        call: &CallRecord,
        talk_time: Duration,
    ) -> Result<&'static str>;

    /// Applies the configured disposition to the call. Must apply it at most once.
    async fn dispose(&mut self, session: &mut AgentSession, call: &CallRecord)
    -> Result<&'static str>;

    /// Disposition status code this driver applies.
    fn disposition_status(&self) -> &str;

    /// Best-effort logout.
    async fn logout(&mut self, session: &mut AgentSession) -> Result<()>;

    /// Releases automation resources (browser tab, connections).
    async fn release(&mut self) -> Result<()>;
}
