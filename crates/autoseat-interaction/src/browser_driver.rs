//! BrowserDriver - drives the seat through a live agent page, with REST fallbacks.
//!
//! Every operation is a ladder of strategies run by
//! [`first_success`]: first the web app's own machinery (scope setters,
//! visible controls), then the REST endpoint using the cookies and session
//! identifiers harvested from the page at that moment.

use crate::browser::scripts::{self, ScopeAccessor};
use crate::browser::{BrowserPage, ClickOutcome, click_by_text, click_control};
use crate::detector::{BrowserStateDetector, CallDetector};
use crate::platform_client::PlatformClient;
use async_trait::async_trait;
use autoseat_core::config::BrowserConfig;
use autoseat_core::fallback::{Attempt, first_success};
use autoseat_core::{
    AgentSession, Availability, AutoseatError, CallRecord, PhoneState, Result, SeatDriver,
};
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Seat driver backed by a driven browser tab.
pub struct BrowserDriver {
    page: Arc<dyn BrowserPage>,
    client: PlatformClient,
    detector: BrowserStateDetector,
    controls: BrowserConfig,
    ui_retry_delay: Duration,
}

impl BrowserDriver {
    pub fn new(
        page: Arc<dyn BrowserPage>,
        client: PlatformClient,
        controls: BrowserConfig,
        ui_retry_delay: Duration,
    ) -> Self {
        Self {
            detector: BrowserStateDetector::new(page.clone()),
            page,
            client,
            controls,
            ui_retry_delay,
        }
    }

    async fn set_availability(
        &mut self,
        session: &mut AgentSession,
        code: String,
        label: String,
        target: Availability,
    ) -> Result<&'static str> {
        let page = &*self.page;
        let client = &self.client;
        let detector = &self.detector;

        let attempts = vec![
            Attempt::new("scope-setter", call_scope_setter(page, code.clone()).boxed()),
            Attempt::new("ui-click", click_control(page, &label).boxed()),
            Attempt::new(
                "rest",
                async {
                    harvest(page, detector, session).await;
                    client.change_availability(session, &code).await
                }
                .boxed(),
            ),
        ];
        let success = first_success("availability", attempts).await?;

        session.availability = target;
        info!(code = %code, via = success.via, "Availability set");
        Ok(success.via)
    }
}

#[async_trait]
impl SeatDriver for BrowserDriver {
    fn label(&self) -> &'static str {
        "browser"
    }

    /// Adopts the session of the already logged-in page.
    async fn login(&mut self, session: &mut AgentSession) -> Result<()> {
        harvest(&*self.page, &self.detector, session).await;
        if !session.is_established() {
            return Err(AutoseatError::authentication(
                None,
                "agent page exposes no session; log in through the browser first",
            ));
        }
        info!(
            cookies = session.cookies.len(),
            session_id = session.session_id.as_deref().unwrap_or_default(),
            "Adopted browser session"
        );
        Ok(())
    }

    async fn set_available(&mut self, session: &mut AgentSession) -> Result<&'static str> {
        let code = self.client.codes().ready.clone();
        let label = self.controls.available_label.clone();
        self.set_availability(session, code, label, Availability::Available)
            .await
    }

    async fn set_not_ready(&mut self, session: &mut AgentSession) -> Result<&'static str> {
        let code = self.client.codes().not_ready.clone();
        let label = self.controls.not_ready_label.clone();
        self.set_availability(session, code, label, Availability::NotReady)
            .await
    }

    async fn detect(&mut self, session: &mut AgentSession) -> Result<Option<CallRecord>> {
        self.detector.detect(session).await
    }

    async fn phone_state(&mut self, _session: &mut AgentSession) -> Option<PhoneState> {
        match self.detector.read_state().await {
            Ok(state) => state.and_then(|s| s.phone_state),
            Err(e) if e.is_fatal() => {
                warn!(error = %e, "Phone state unreadable");
                None
            }
            Err(e) => {
                debug!(error = %e, "Phone state unreadable");
                None
            }
        }
    }

    async fn refresh_call(&mut self, _session: &mut AgentSession, call: &mut CallRecord) {
        if call.has_details() {
            return;
        }
        match self.detector.read_state().await {
            Ok(Some(state)) => {
                if let Some(fresh) = state.call()
                    && call.fill_details(&fresh)
                {
                    debug!(lead_id = %call.lead_id, phone = %call.phone_number, "Lead details filled in");
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Live state unreadable; lead details stay incomplete"),
        }
    }

    /// End-call ladder: click, wait and click once more, then REST hangup.
    async fn end_call(
        &mut self,
        session: &mut AgentSession,
        call: &CallRecord,
        talk_time: Duration,
    ) -> Result<&'static str> {
        let page = &*self.page;
        let client = &self.client;
        let detector = &self.detector;
        let label = self.controls.end_call_label.as_str();
        let retry_delay = self.ui_retry_delay;

        let attempts = vec![
            Attempt::new("ui-click", click_control(page, label).boxed()),
            Attempt::new(
                "ui-click-retry",
                async move {
                    // the control can surface late after voicemail/hangup detection
                    tokio::time::sleep(retry_delay).await;
                    click_control(page, label).await
                }
                .boxed(),
            ),
            Attempt::new(
                "rest",
                async {
                    harvest(page, detector, session).await;
                    client.end_call(session, call, talk_time).await
                }
                .boxed(),
            ),
        ];
        Ok(first_success("end-call", attempts).await?.via)
    }

    /// Disposition ladder: direct click, panel then click, REST.
    async fn dispose(
        &mut self,
        session: &mut AgentSession,
        call: &CallRecord,
    ) -> Result<&'static str> {
        let page = &*self.page;
        let client = &self.client;
        let detector = &self.detector;
        let status = self.client.codes().disposition.as_str();
        let panel_label = self.controls.disposition_panel_label.as_str();
        let disposition_label = self.client.codes().disposition_label.as_str();
        let settle = self.ui_retry_delay;

        let attempts = vec![
            Attempt::new("direct-click", click_control(page, disposition_label).boxed()),
            Attempt::new(
                "panel-then-click",
                async move {
                    // the status control may have surfaced since the first attempt
                    if click_by_text(page, disposition_label).await? == ClickOutcome::Clicked {
                        return Ok(());
                    }
                    click_control(page, panel_label).await?;
                    tokio::time::sleep(settle).await;
                    click_control(page, disposition_label).await
                }
                .boxed(),
            ),
            Attempt::new(
                "rest",
                async {
                    harvest(page, detector, session).await;
                    client.set_disposition(session, call, status).await
                }
                .boxed(),
            ),
        ];
        Ok(first_success("disposition", attempts).await?.via)
    }

    fn disposition_status(&self) -> &str {
        &self.client.codes().disposition
    }

    async fn logout(&mut self, session: &mut AgentSession) -> Result<()> {
        harvest(&*self.page, &self.detector, session).await;
        self.client.logout(session).await
    }

    async fn release(&mut self) -> Result<()> {
        self.page.close().await
    }
}

/// Tries the availability setter through each scope accessor in order.
async fn call_scope_setter(page: &dyn BrowserPage, code: String) -> Result<()> {
    let accessors: Vec<ScopeAccessor> = scripts::scope_accessors();
    for accessor in &accessors {
        let script = scripts::invoke_availability_setter(accessor, &code);
        match page.evaluate(&script).await {
            Ok(value) if value.as_str() == Some("ok") => {
                debug!(accessor = accessor.name, "Availability setter invoked");
                return Ok(());
            }
            Ok(value) => {
                debug!(accessor = accessor.name, result = %value, "Availability setter not usable");
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!(accessor = accessor.name, error = %e, "Availability setter probe failed");
            }
        }
    }
    Err(AutoseatError::control_unavailable(
        "availability setter",
        "not reachable through any scope accessor",
    ))
}

/// Copies the page's cookies and live session identifiers into `session`.
///
/// Best-effort: failures are logged and the session keeps what it had.
async fn harvest(page: &dyn BrowserPage, detector: &BrowserStateDetector, session: &mut AgentSession) {
    match page.cookies().await {
        Ok(cookies) => {
            for (name, value) in cookies {
                session.cookies.insert(name, value);
            }
        }
        Err(e) => warn!(error = %e, "Failed to harvest page cookies"),
    }

    match detector.read_state().await {
        Ok(Some(state)) => {
            if let Some(session_id) = state.session_id {
                session.session_id = Some(session_id);
            }
            if let Some(agent_log_id) = state.agent_log_id {
                session.agent_log_id = Some(agent_log_id);
            }
        }
        Ok(None) => debug!("No live scope to harvest identifiers from"),
        Err(e) => warn!(error = %e, "Failed to harvest session identifiers"),
    }
}
