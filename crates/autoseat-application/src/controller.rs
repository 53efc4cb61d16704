//! CallSessionController - the seat's call-handling state machine.
//!
//! One controller drives one agent session from login to logout:
//!
//! ```text
//! Idle -> LoggingIn -> SettingAvailable -> Listening -> InCall -> Disposing
//!      -> Recovering -> Listening ... -> Stopped
//! ```
//!
//! Each handled call runs strictly in sequence: wait the configured talk
//! time, end the call, give the disposition panel time to appear, apply the
//! disposition, then wait for the agent to be available again. Only one call
//! is ever open; detections of the open call or of the call just closed are
//! ignored.

use autoseat_core::{
    AgentConfig, AgentSession, AutoseatError, CallEvent, CallIdentity, CallRecord,
    ControllerState, Result, SeatDriver, SessionStats, SessionSummary, StopReason,
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Cadence of phone-state checks while recovering availability.
const PHONE_STATE_POLL: Duration = Duration::from_millis(500);

/// Timing and budget knobs of the controller loop.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub call_duration: Duration,
    pub poll_interval: Duration,
    pub phone_state_timeout: Duration,
    pub panel_wait: Duration,
    pub error_pause: Duration,
    /// `None` means unlimited.
    pub max_calls: Option<u32>,
}

impl ControllerSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            call_duration: config.timing.call_duration(),
            poll_interval: config.timing.poll_interval(),
            phone_state_timeout: config.timing.phone_state_timeout(),
            panel_wait: config.timing.panel_wait(),
            error_pause: config.timing.error_pause(),
            max_calls: config.call_budget(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

pub struct CallSessionController {
    driver: Box<dyn SeatDriver>,
    session: AgentSession,
    settings: ControllerSettings,
    state: ControllerState,
    /// Identity of the call currently being handled
    active: Option<CallIdentity>,
    /// Identity of the most recently closed call
    last_closed: Option<CallIdentity>,
    stats: SessionStats,
    /// Call sequences started (completed or abandoned); counts toward the budget
    calls_started: u32,
    stop: CancellationToken,
    events: Option<UnboundedSender<CallEvent>>,
    shut_down: bool,
}

impl CallSessionController {
    pub fn new(
        driver: Box<dyn SeatDriver>,
        settings: ControllerSettings,
        stop: CancellationToken,
    ) -> Self {
        Self {
            driver,
            session: AgentSession::new(),
            settings,
            state: ControllerState::Idle,
            active: None,
            last_closed: None,
            stats: SessionStats::default(),
            calls_started: 0,
            stop,
            events: None,
            shut_down: false,
        }
    }

    /// Sends call lifecycle events to `events` as they happen.
    pub fn with_events(mut self, events: UnboundedSender<CallEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Runs the seat until the budget is spent, a stop is requested or a
    /// fatal error occurs, then shuts down.
    ///
    /// The shutdown sequence runs on every exit path. A fatal error is
    /// returned after shutdown; otherwise the session summary is.
    pub async fn run(&mut self) -> Result<SessionSummary> {
        let started = Instant::now();
        info!(driver = self.driver.label(), "Starting seat");

        let outcome = self.run_until_stopped().await;
        let stop_reason = match &outcome {
            Ok(reason) => reason.clone(),
            Err(e) => {
                error!(error = %e, "Seat stopped on fatal error");
                StopReason::Fatal(e.to_string())
            }
        };

        self.shutdown().await;

        let summary = SessionSummary {
            stats: self.stats.clone(),
            elapsed: started.elapsed(),
            stop_reason,
        };
        info!(
            calls_handled = summary.stats.calls_handled,
            calls_dispositioned = summary.stats.calls_dispositioned,
            elapsed_secs = summary.elapsed.as_secs(),
            "{}",
            summary
        );

        outcome.map(|_| summary)
    }

    /// Best-effort teardown: not-ready, logout, release. Runs at most once.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            debug!("Shutdown already completed");
            return;
        }
        self.shut_down = true;
        info!(state = %self.state, "Shutting down seat");

        if self.session.is_established() {
            match self.driver.set_not_ready(&mut self.session).await {
                Ok(via) => info!(via, "Agent set to not ready"),
                Err(e) => warn!(error = %e, "Failed to set agent not ready"),
            }
            match self.driver.logout(&mut self.session).await {
                Ok(()) => info!("Agent logged out"),
                Err(e) => warn!(error = %e, "Logout failed"),
            }
        } else {
            debug!("No established session; skipping not-ready and logout");
        }

        if let Err(e) = self.driver.release().await {
            warn!(error = %e, "Failed to release automation resources");
        }

        if let Err(e) = self.transition(ControllerState::Stopped) {
            debug!(error = %e, "Stopped transition skipped");
        }
    }

    // ============================================================================
    // Main loop
    // ============================================================================

    async fn run_until_stopped(&mut self) -> Result<StopReason> {
        self.transition(ControllerState::LoggingIn)?;
        self.driver.login(&mut self.session).await?;
        if self.stop.is_cancelled() {
            return Ok(StopReason::StopRequested);
        }

        self.transition(ControllerState::SettingAvailable)?;
        let via = self.driver.set_available(&mut self.session).await?;
        info!(via, "Agent available");
        self.transition(ControllerState::Listening)?;

        loop {
            if self.stop.is_cancelled() {
                return Ok(StopReason::StopRequested);
            }
            if self.budget_reached() {
                info!(calls = self.calls_started, "Call budget reached");
                return Ok(StopReason::BudgetReached);
            }

            if let Some(call) = self.driver.detect(&mut self.session).await?
                && self.accept(&call).await
            {
                self.handle_call(call).await?;
                continue;
            }

            if !sleep_unless_stopped(&self.stop, self.settings.poll_interval).await {
                return Ok(StopReason::StopRequested);
            }
        }
    }

    fn budget_reached(&self) -> bool {
        self.settings
            .max_calls
            .is_some_and(|max| self.calls_started >= max)
    }

    /// Whether a detection should start call handling.
    async fn accept(&mut self, call: &CallRecord) -> bool {
        let identity = call.identity();
        if self.is_duplicate(&identity) {
            self.stats.duplicates_ignored += 1;
            debug!(call = %identity, "Ignoring duplicate detection");
            return false;
        }

        if let Some(phone_state) = self.driver.phone_state(&mut self.session).await
            && !phone_state.is_actionable()
        {
            debug!(call = %identity, phone_state = %phone_state, "Call not actionable yet");
            return false;
        }
        true
    }

    fn is_duplicate(&self, identity: &CallIdentity) -> bool {
        [&self.active, &self.last_closed]
            .into_iter()
            .flatten()
            .any(|known| known.matches(identity))
    }

    // ============================================================================
    // Call handling
    // ============================================================================

    /// Drives one call to completion. Only fatal errors escape.
    async fn handle_call(&mut self, mut call: CallRecord) -> Result<()> {
        self.calls_started += 1;
        self.active = Some(call.identity());
        self.transition(ControllerState::InCall)?;
        info!(
            lead_id = %call.lead_id,
            call_log_id = call.call_log_id.as_deref().unwrap_or_default(),
            phone = %call.phone_number,
            caller = %call.display_name(),
            "Call connected"
        );
        self.emit(CallEvent::Connected { call: call.clone() });

        match self.run_call_sequence(&mut call).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => {
                if call.is_open() {
                    self.abandon(&call, &e);
                }
                Err(e)
            }
            Err(e) => {
                error!(lead_id = %call.lead_id, error = %e, "Call handling failed");
                if call.is_open() {
                    self.abandon(&call, &e);
                }
                self.active = None;
                self.last_closed = None;
                sleep_unless_stopped(&self.stop, self.settings.error_pause).await;
                if self.state != ControllerState::Listening {
                    self.transition(ControllerState::Listening)?;
                }
                Ok(())
            }
        }
    }

    async fn run_call_sequence(&mut self, call: &mut CallRecord) -> Result<()> {
        let connected_at = Instant::now();
        if !sleep_unless_stopped(&self.stop, self.settings.call_duration).await {
            info!(lead_id = %call.lead_id, "Stop requested mid-call; draining");
        }
        let talk_time = connected_at.elapsed();
        self.refresh_details(call).await;

        match self.driver.end_call(&mut self.session, call, talk_time).await {
            Ok(via) => {
                self.stats.total_call_time += talk_time;
                info!(lead_id = %call.lead_id, via, talk_secs = talk_time.as_secs(), "Call ended");
                self.emit(CallEvent::Ended {
                    call: call.clone(),
                    talk_time_ms: talk_time.as_millis() as u64,
                    via: via.to_string(),
                });
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(lead_id = %call.lead_id, error = %e, "End-call failed; continuing to disposition");
            }
        }

        self.transition(ControllerState::Disposing)?;
        tokio::time::sleep(self.settings.panel_wait).await;

        self.refresh_details(call).await;
        let status = self.driver.disposition_status().to_string();
        let (via, success) = match self.driver.dispose(&mut self.session, call).await {
            Ok(via) => (Some(via), true),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(lead_id = %call.lead_id, error = %e, "Disposition failed");
                (None, false)
            }
        };

        call.close(success.then(|| status.clone()));
        self.stats.calls_handled += 1;
        if success {
            self.stats.calls_dispositioned += 1;
            info!(lead_id = %call.lead_id, status = %status, via = via.unwrap_or_default(), "Call dispositioned");
        }
        self.emit(CallEvent::Dispositioned {
            call: call.clone(),
            status,
            via: via.map(str::to_string),
            success,
        });
        self.last_closed = self.active.take();

        self.transition(ControllerState::Recovering)?;
        self.recover_availability().await?;
        self.transition(ControllerState::Listening)
    }

    /// Waits for the agent to be available again.
    ///
    /// Polls the phone state until it reads `Available` or the timeout
    /// elapses (the loop then proceeds with a warning). Drivers that cannot
    /// observe the phone state re-assert availability instead.
    ///
    /// Skipped once a stop is requested: the agent must not rejoin the
    /// queue while shutdown is pending.
    async fn recover_availability(&mut self) -> Result<()> {
        if self.stop.is_cancelled() {
            info!("Stop requested; not returning to the queue");
            return Ok(());
        }
        let deadline = Instant::now() + self.settings.phone_state_timeout;
        loop {
            match self.driver.phone_state(&mut self.session).await {
                None => {
                    let via = self.driver.set_available(&mut self.session).await?;
                    info!(via, "Availability re-asserted");
                    return Ok(());
                }
                Some(state) if state.is_ready() => {
                    info!("Agent available again");
                    return Ok(());
                }
                Some(state) if Instant::now() >= deadline => {
                    warn!(
                        phone_state = %state,
                        timeout_secs = self.settings.phone_state_timeout.as_secs(),
                        "Phone state did not return to available; continuing"
                    );
                    return Ok(());
                }
                Some(state) => debug!(phone_state = %state, "Waiting for availability"),
            }
            if !sleep_unless_stopped(&self.stop, PHONE_STATE_POLL).await {
                return Ok(());
            }
        }
    }

    /// Lets the driver complete a record detected before its lead info.
    async fn refresh_details(&mut self, call: &mut CallRecord) {
        if call.has_details() {
            return;
        }
        self.driver.refresh_call(&mut self.session, call).await;
        if call.has_details() {
            self.active = Some(call.identity());
        }
    }

    fn abandon(&mut self, call: &CallRecord, reason: &AutoseatError) {
        self.stats.calls_abandoned += 1;
        warn!(lead_id = %call.lead_id, reason = %reason, "Call abandoned");
        self.emit(CallEvent::Abandoned {
            call: call.clone(),
            reason: reason.to_string(),
        });
    }

    // ============================================================================
    // Helpers
    // ============================================================================

    fn transition(&mut self, next: ControllerState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AutoseatError::internal(format!(
                "illegal state transition {} -> {}",
                self.state, next
            )));
        }
        info!(from = %self.state, to = %next, "State transition");
        self.state = next;
        Ok(())
    }

    fn emit(&self, event: CallEvent) {
        if let Some(events) = &self.events
            && events.send(event).is_err()
        {
            debug!("Call event receiver dropped");
        }
    }
}

/// Sleeps for `duration`; returns false when cut short by a stop request.
async fn sleep_unless_stopped(stop: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
