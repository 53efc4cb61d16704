//! Call-session controller states and their legal transitions.

use serde::Serialize;
use std::fmt;
use strum::Display;

/// States of the call-session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum ControllerState {
    Idle,
    LoggingIn,
    SettingAvailable,
    Listening,
    InCall,
    Disposing,
    Recovering,
    Stopped,
}

impl ControllerState {
    /// Transition table. Any state may move to `Stopped`; `Stopped` is terminal.
    pub fn can_transition_to(self, next: ControllerState) -> bool {
        use ControllerState::*;

        if self == Stopped {
            return false;
        }
        if next == Stopped {
            return true;
        }
        matches!(
            (self, next),
            (Idle, LoggingIn)
                | (LoggingIn, SettingAvailable)
                | (SettingAvailable, Listening)
                | (Listening, InCall)
                | (InCall, Disposing)
                | (Disposing, Recovering)
                | (Recovering, Listening)
                // a failed call sequence is abandoned straight back to listening
                | (InCall, Listening)
                | (Disposing, Listening)
        )
    }
}

/// Why the controller stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Call budget reached
    BudgetReached,
    /// External stop request (signal)
    StopRequested,
    /// Unrecoverable authentication or session error
    Fatal(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::BudgetReached => write!(f, "call budget reached"),
            StopReason::StopRequested => write!(f, "stop requested"),
            StopReason::Fatal(message) => write!(f, "fatal error: {}", message),
        }
    }
}
