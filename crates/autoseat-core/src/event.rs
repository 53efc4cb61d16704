//! Per-call lifecycle events and the end-of-session summary.

use crate::call::CallRecord;
use crate::state::StopReason;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Lifecycle events emitted by the controller for each handled call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallEvent {
    /// A new call was accepted for handling
    Connected { call: CallRecord },
    /// The call was ended on the platform
    Ended {
        call: CallRecord,
        talk_time_ms: u64,
        via: String,
    },
    /// Disposition attempt finished (`call` is closed at this point)
    Dispositioned {
        call: CallRecord,
        status: String,
        via: Option<String>,
        success: bool,
    },
    /// The call sequence failed and the call was given up
    Abandoned { call: CallRecord, reason: String },
}

impl CallEvent {
    pub fn call(&self) -> &CallRecord {
        match self {
            CallEvent::Connected { call }
            | CallEvent::Ended { call, .. }
            | CallEvent::Dispositioned { call, .. }
            | CallEvent::Abandoned { call, .. } => call,
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub calls_handled: u32,
    pub calls_dispositioned: u32,
    pub calls_abandoned: u32,
    pub duplicates_ignored: u32,
    pub total_call_time: Duration,
}

impl SessionStats {
    pub fn average_call_duration(&self) -> Option<Duration> {
        if self.calls_handled == 0 {
            return None;
        }
        Some(self.total_call_time / self.calls_handled)
    }
}

/// Summary reported when the controller stops.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub stats: SessionStats,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session summary")?;
        writeln!(f, "  Stop reason:       {}", self.stop_reason)?;
        writeln!(f, "  Calls handled:     {}", self.stats.calls_handled)?;
        writeln!(f, "  Dispositioned:     {}", self.stats.calls_dispositioned)?;
        writeln!(f, "  Abandoned:         {}", self.stats.calls_abandoned)?;
        writeln!(f, "  Duplicates skipped: {}", self.stats.duplicates_ignored)?;
        writeln!(f, "  Elapsed:           {:.1}s", self.elapsed.as_secs_f64())?;
        match self.stats.average_call_duration() {
            Some(avg) => write!(f, "  Avg call duration: {:.1}s", avg.as_secs_f64()),
            None => write!(f, "  Avg call duration: n/a"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_call_duration() {
        let mut stats = SessionStats::default();
        assert!(stats.average_call_duration().is_none());

        stats.calls_handled = 2;
        stats.total_call_time = Duration::from_secs(30);
        assert_eq!(stats.average_call_duration(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_summary_display() {
        let summary = SessionSummary {
            stats: SessionStats {
                calls_handled: 1,
                calls_dispositioned: 1,
                total_call_time: Duration::from_secs(12),
                ..Default::default()
            },
            elapsed: Duration::from_secs(60),
            stop_reason: StopReason::BudgetReached,
        };
        let text = summary.to_string();
        assert!(text.contains("call budget reached"));
        assert!(text.contains("Avg call duration: 12.0s"));
    }
}
