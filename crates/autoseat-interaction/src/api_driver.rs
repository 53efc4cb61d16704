//! ApiDriver - drives the seat purely over the platform's REST API.

use crate::detector::{CallDetector, PollingDetector};
use crate::platform_client::PlatformClient;
use async_trait::async_trait;
use autoseat_core::config::Credentials;
use autoseat_core::{AgentSession, CallRecord, PhoneState, Result, SeatDriver};
use std::time::Duration;
use tracing::warn;

const VIA_REST: &str = "rest";

/// REST-only seat driver: polling detection, no phone-state visibility.
pub struct ApiDriver {
    client: PlatformClient,
    detector: PollingDetector,
    credentials: Credentials,
}

impl ApiDriver {
    pub fn new(client: PlatformClient, credentials: Credentials) -> Self {
        Self {
            detector: PollingDetector::new(client.clone()),
            client,
            credentials,
        }
    }
}

#[async_trait]
impl SeatDriver for ApiDriver {
    fn label(&self) -> &'static str {
        "api"
    }

    async fn login(&mut self, session: &mut AgentSession) -> Result<()> {
        if let Some(cookie) = &self.credentials.trusted_device_cookie
            && !session.cookies.insert_pair(cookie)
        {
            warn!("Ignoring malformed trusted-device cookie (expected name=value)");
        }
        self.client
            .login(
                session,
                &self.credentials.username,
                &self.credentials.password,
            )
            .await?;
        self.client.phone_login(session).await
    }

    async fn set_available(&mut self, session: &mut AgentSession) -> Result<&'static str> {
        let code = self.client.codes().ready.clone();
        self.client.change_availability(session, &code).await?;
        Ok(VIA_REST)
    }

    async fn set_not_ready(&mut self, session: &mut AgentSession) -> Result<&'static str> {
        let code = self.client.codes().not_ready.clone();
        self.client.change_availability(session, &code).await?;
        Ok(VIA_REST)
    }

    async fn detect(&mut self, session: &mut AgentSession) -> Result<Option<CallRecord>> {
        self.detector.detect(session).await
    }

    async fn phone_state(&mut self, _session: &mut AgentSession) -> Option<PhoneState> {
        None
    }

    async fn end_call(
        &mut self,
        session: &mut AgentSession,
        call: &CallRecord,
        talk_time: Duration,
    ) -> Result<&'static str> {
        self.client.end_call(session, call, talk_time).await?;
        Ok(VIA_REST)
    }

    async fn dispose(
        &mut self,
        session: &mut AgentSession,
        call: &CallRecord,
    ) -> Result<&'static str> {
        let status = self.client.codes().disposition.clone();
        self.client.set_disposition(session, call, &status).await?;
        Ok(VIA_REST)
    }

    fn disposition_status(&self) -> &str {
        &self.client.codes().disposition
    }

    async fn logout(&mut self, session: &mut AgentSession) -> Result<()> {
        self.client.logout(session).await
    }

    async fn release(&mut self) -> Result<()> {
        Ok(())
    }
}
