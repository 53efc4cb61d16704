//! PlatformClient - REST client for the dialer platform's agent API.
//!
//! The platform keeps its session in cookies that arrive progressively
//! (across the login redirect chain and on later calls), plus two opaque
//! identifiers issued by phone-login. The client holds no session state of
//! its own: every operation takes the caller's [`AgentSession`], renders the
//! `Cookie` header from its jar right before sending, and writes cookies and
//! refreshed identifiers back right after the response arrives.

use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use autoseat_core::config::{CampaignConfig, CodesConfig, EndpointsConfig};
use autoseat_core::{AgentSession, Availability, AutoseatError, CallRecord, Result};
use reqwest::Url;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on redirect hops followed after the credential POST.
const MAX_LOGIN_REDIRECTS: usize = 5;

/// Result of a single incoming-call poll.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Idle,
    Found(CallRecord),
}

/// Stateless-per-call client for the platform's agent endpoints.
#[derive(Clone)]
pub struct PlatformClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    endpoints: EndpointsConfig,
    campaign: CampaignConfig,
    codes: CodesConfig,
}

impl PlatformClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        endpoints: EndpointsConfig,
        campaign: CampaignConfig,
        codes: CodesConfig,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            endpoints,
            campaign,
            codes,
        }
    }

    pub fn campaign(&self) -> &CampaignConfig {
        &self.campaign
    }

    pub fn codes(&self) -> &CodesConfig {
        &self.codes
    }

    // ============================================================================
    // Operations
    // ============================================================================

    /// Credential login: POST the form, then follow the redirect chain with
    /// GETs, merging the cookies every hop sets.
    pub async fn login(
        &self,
        session: &mut AgentSession,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let mut current_url = self.url(&self.endpoints.login);
        let request = HttpRequest::new(HttpMethod::Post, &current_url).form(vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ]);
        let mut response = self.dispatch(session, request).await?;

        if !response.is_redirect() {
            return Err(AutoseatError::authentication(
                Some(response.status),
                "credential POST did not redirect",
            ));
        }

        let mut hops = 0;
        while response.is_redirect() {
            let location = response.location().ok_or_else(|| {
                AutoseatError::authentication(Some(response.status), "redirect without Location")
            })?;
            hops += 1;
            if hops > MAX_LOGIN_REDIRECTS {
                return Err(AutoseatError::authentication(
                    Some(response.status),
                    format!("more than {} login redirects", MAX_LOGIN_REDIRECTS),
                ));
            }

            let next_url = resolve_location(&current_url, location)?;
            debug!(hop = hops, url = %next_url, "Following login redirect");
            let request = HttpRequest::new(HttpMethod::Get, &next_url);
            response = self.dispatch(session, request).await?;
            current_url = next_url;
        }

        if response.is_error() {
            return Err(AutoseatError::authentication(
                Some(response.status),
                format!("login redirect chain ended with an error at {}", current_url),
            ));
        }

        info!(
            hops,
            cookies = session.cookies.len(),
            "Credential login completed"
        );
        Ok(())
    }

    /// Joins the campaign's voice queue and stores the issued session identifiers.
    pub async fn phone_login(&self, session: &mut AgentSession) -> Result<()> {
        let body = json!({
            "campaign_id": self.campaign.id,
            "campaign_name": self.campaign.name,
            "campaign_type": self.campaign.campaign_type,
            "dial_method": self.campaign.dial_method,
            "channels": self.campaign.channels,
        });
        let response = self
            .post_json(session, &self.endpoints.phone_login, body)
            .await?;
        if response.is_error() {
            return Err(AutoseatError::PhoneLogin(format!(
                "status {}: {}",
                response.status,
                snippet(&response.body)
            )));
        }

        let payload = response.json().map_err(|e| AutoseatError::PhoneLogin(e.to_string()))?;
        if !is_truthy(payload.get("success")) {
            return Err(AutoseatError::PhoneLogin(format!(
                "platform reported failure: {}",
                message_of(&payload)
            )));
        }

        let data = payload.get("data").cloned().unwrap_or(Value::Null);
        session.absorb_identifiers(&data);
        if !session.is_established() {
            return Err(AutoseatError::PhoneLogin(
                "response carried no session_id/agent_log_id".to_string(),
            ));
        }

        info!(
            campaign = %self.campaign.id,
            session_id = session.session_id.as_deref().unwrap_or_default(),
            "Phone login completed"
        );
        Ok(())
    }

    /// Changes agent availability.
    ///
    /// Switching to the configured ready code issues a resume first; a failed
    /// resume is logged and the availability change still goes out.
    pub async fn change_availability(&self, session: &mut AgentSession, code: &str) -> Result<()> {
        let becoming_ready = code == self.codes.ready;
        if becoming_ready && let Err(e) = self.resume(session).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(error = %e, "Resume before availability change failed; continuing");
        }

        let body = json!({
            "campaigns": [self.campaign.id],
            "availability_code": code,
            "uid": Uuid::new_v4().to_string(),
        });
        let response = self
            .post_json(session, &self.endpoints.availability, body)
            .await?;
        self.expect_success(session, &response, AutoseatError::Availability)?;

        session.availability = if becoming_ready {
            Availability::Available
        } else {
            Availability::NotReady
        };
        info!(code, availability = %session.availability, "Availability changed");
        Ok(())
    }

    /// Resume action the platform expects before an agent turns available.
    pub async fn resume(&self, session: &mut AgentSession) -> Result<()> {
        let body = json!({
            "campaigns": [self.campaign.id],
            "session_id": session.session_id,
            "agent_log_id": session.agent_log_id,
        });
        let response = self.post_json(session, &self.endpoints.resume, body).await?;
        if response.is_error() {
            return Err(AutoseatError::Availability(format!(
                "resume returned status {}",
                response.status
            )));
        }
        debug!("Resume acknowledged");
        Ok(())
    }

    /// Single non-blocking check for an incoming call.
    pub async fn poll_for_call(&self, session: &mut AgentSession) -> Result<PollOutcome> {
        let body = json!({
            "campaigns": [self.campaign.id],
            "dial_method": self.campaign.dial_method,
            "session_id": session.session_id,
            "agent_log_id": session.agent_log_id,
            "uid": Uuid::new_v4().to_string(),
        });
        let response = self.post_json(session, &self.endpoints.poll, body).await?;
        let payload = self.expect_success(session, &response, AutoseatError::Poll)?;

        let data = payload.get("data").cloned().unwrap_or(Value::Null);
        if !is_truthy(data.get("found")) {
            return Ok(PollOutcome::Idle);
        }

        let info = data.get("info").cloned().unwrap_or(Value::Null);
        let call = CallRecord::from_lead_info(&info).ok_or_else(|| {
            AutoseatError::Poll("call reported without a lead_id in info".to_string())
        })?;
        debug!(lead_id = %call.lead_id, "Poll found a call");
        Ok(PollOutcome::Found(call))
    }

    /// Reports the end of a call with its talk time (whole seconds).
    pub async fn end_call(
        &self,
        session: &mut AgentSession,
        call: &CallRecord,
        talk_time: Duration,
    ) -> Result<()> {
        let body = json!({
            "campaign_id": self.campaign.id,
            "session_id": session.session_id,
            "agent_log_id": session.agent_log_id,
            "call_time": talk_time.as_secs(),
            "term_reason": self.codes.term_reason,
            "lead_info": lead_info(call),
        });
        let response = self.post_json(session, &self.endpoints.hangup, body).await?;
        self.reject_expired(&response)?;
        if response.is_error() {
            return Err(AutoseatError::Hangup(format!("status {}", response.status)));
        }

        let payload = response.json().map_err(|e| AutoseatError::Hangup(e.to_string()))?;
        let acknowledged = is_truthy(payload.get("ishangup"))
            || is_truthy(payload.get("data").and_then(|d| d.get("ishangup")));
        if !acknowledged {
            return Err(AutoseatError::Hangup(format!(
                "hangup not acknowledged: {}",
                message_of(&payload)
            )));
        }
        if let Some(data) = payload.get("data") {
            session.absorb_identifiers(data);
        }
        Ok(())
    }

    /// Applies a disposition status to the call.
    ///
    /// The platform may rotate `agent_log_id` here; the new value is kept.
    pub async fn set_disposition(
        &self,
        session: &mut AgentSession,
        call: &CallRecord,
        status: &str,
    ) -> Result<()> {
        let body = json!({
            "campaign_id": self.campaign.id,
            "lead_id": call.lead_id,
            "call_log_id": call.call_log_id,
            "status": status,
            "phone_code": call.phone_code,
            "phone_number": call.phone_number,
            "agent_log_id": session.agent_log_id,
        });
        let request = HttpRequest::new(HttpMethod::Put, self.url(&self.endpoints.disposition))
            .json(body);
        let response = self.dispatch(session, request).await?;
        self.expect_success(session, &response, AutoseatError::Disposition)?;
        info!(
            lead_id = %call.lead_id,
            status,
            agent_log_id = session.agent_log_id.as_deref().unwrap_or_default(),
            "Disposition recorded"
        );
        Ok(())
    }

    /// Best-effort logout. Any non-error status counts as success.
    pub async fn logout(&self, session: &mut AgentSession) -> Result<()> {
        let body = json!({
            "logout_code": self.codes.logout,
            "campaigns": [self.campaign.id],
            "session_id": session.session_id,
            "agent_log_id": session.agent_log_id,
        });
        let response = self.post_json(session, &self.endpoints.logout, body).await?;
        if response.is_error() {
            return Err(AutoseatError::Logout(format!("status {}", response.status)));
        }
        session.clear();
        info!("Logged out");
        Ok(())
    }

    // ============================================================================
    // Plumbing
    // ============================================================================

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn post_json(
        &self,
        session: &mut AgentSession,
        path: &str,
        body: Value,
    ) -> Result<HttpResponse> {
        let request = HttpRequest::new(HttpMethod::Post, self.url(path)).json(body);
        self.dispatch(session, request).await
    }

    /// Sends with the jar's current cookies and merges the response's cookies.
    async fn dispatch(&self, session: &mut AgentSession, request: HttpRequest) -> Result<HttpResponse> {
        let mut request = request.header("Accept", "application/json, text/plain, */*");
        if let Some(cookie) = session.cookies.header() {
            request = request.header("Cookie", cookie);
        }

        let response = self.transport.send(request).await?;
        for set_cookie in response.set_cookies() {
            session.cookies.merge_set_cookie(set_cookie);
        }
        Ok(response)
    }

    fn reject_expired(&self, response: &HttpResponse) -> Result<()> {
        if matches!(response.status, 401 | 403) {
            return Err(AutoseatError::SessionExpired {
                status: response.status,
                message: snippet(&response.body),
            });
        }
        Ok(())
    }

    /// Checks status and the `success` flag, absorbing refreshed identifiers.
    fn expect_success(
        &self,
        session: &mut AgentSession,
        response: &HttpResponse,
        fail: fn(String) -> AutoseatError,
    ) -> Result<Value> {
        self.reject_expired(response)?;
        if response.is_error() {
            return Err(fail(format!(
                "status {}: {}",
                response.status,
                snippet(&response.body)
            )));
        }

        let payload = response.json().map_err(|e| fail(e.to_string()))?;
        if !is_truthy(payload.get("success")) {
            return Err(fail(format!("platform reported failure: {}", message_of(&payload))));
        }
        if let Some(data) = payload.get("data")
            && data.is_object()
        {
            session.absorb_identifiers(data);
        }
        Ok(payload)
    }
}

/// Lead fields echoed back to the hangup endpoint.
fn lead_info(call: &CallRecord) -> Value {
    json!({
        "lead_id": call.lead_id,
        "call_log_id": call.call_log_id,
        "phone_code": call.phone_code,
        "phone_number": call.phone_number,
        "first_name": call.first_name,
        "last_name": call.last_name,
    })
}

fn resolve_location(current: &str, location: &str) -> Result<String> {
    let base = Url::parse(current).map_err(|e| {
        AutoseatError::authentication(None, format!("invalid login URL '{}': {}", current, e))
    })?;
    base.join(location)
        .map(|url| url.to_string())
        .map_err(|e| {
            AutoseatError::authentication(None, format!("invalid redirect '{}': {}", location, e))
        })
}

/// The platform mixes booleans, 0/1 and strings for its flags.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

fn message_of(payload: &Value) -> String {
    payload
        .get("message")
        .or_else(|| payload.get("msg"))
        .and_then(Value::as_str)
        .unwrap_or("no message")
        .to_string()
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}
