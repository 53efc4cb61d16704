//! Call records, call identity and the platform's phone state.

use crate::session::value_to_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identity of a detected call, used for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallIdentity {
    pub lead_id: String,
    pub call_log_id: Option<String>,
}

impl CallIdentity {
    pub fn new(lead_id: impl Into<String>, call_log_id: Option<String>) -> Self {
        Self {
            lead_id: lead_id.into(),
            call_log_id,
        }
    }

    /// Pair-based match: lead ids must be equal, and call-log ids must be
    /// equal whenever both sides carry one.
    pub fn matches(&self, other: &CallIdentity) -> bool {
        if self.lead_id != other.lead_id {
            return false;
        }
        match (&self.call_log_id, &other.call_log_id) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for CallIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.call_log_id {
            Some(call_log_id) => write!(f, "lead {} / call log {}", self.lead_id, call_log_id),
            None => write!(f, "lead {}", self.lead_id),
        }
    }
}

/// One detected and handled call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub lead_id: String,
    pub call_log_id: Option<String>,
    pub phone_code: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub detected_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub disposition_status: Option<String>,
}

impl CallRecord {
    /// A record known only by its identity (lead info not populated yet).
    pub fn minimal(identity: CallIdentity) -> Self {
        Self {
            lead_id: identity.lead_id,
            call_log_id: identity.call_log_id,
            phone_code: String::new(),
            phone_number: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            detected_at: Utc::now(),
            ended_at: None,
            disposition_status: None,
        }
    }

    /// Builds a record from the platform's lead `info` object.
    ///
    /// Returns `None` when the object carries no lead id. Ids may be JSON
    /// numbers or strings; missing text fields become empty strings.
    pub fn from_lead_info(info: &Value) -> Option<Self> {
        let lead_id = info.get("lead_id").and_then(value_to_id)?;
        let call_log_id = info.get("call_log_id").and_then(value_to_id);

        let text = |key: &str| -> String {
            match info.get(key) {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            }
        };

        Some(Self {
            phone_code: text("phone_code"),
            phone_number: text("phone_number"),
            first_name: text("first_name"),
            last_name: text("last_name"),
            ..Self::minimal(CallIdentity::new(lead_id, call_log_id))
        })
    }

    pub fn identity(&self) -> CallIdentity {
        CallIdentity::new(self.lead_id.clone(), self.call_log_id.clone())
    }

    /// True while detected but not yet closed.
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Closes the record with the applied disposition (if any).
    pub fn close(&mut self, disposition_status: Option<String>) {
        self.ended_at = Some(Utc::now());
        self.disposition_status = disposition_status;
    }

    /// Whether the lead details (number, name) are known.
    pub fn has_details(&self) -> bool {
        !self.phone_number.is_empty()
    }

    /// Copies the lead details of `fresh` into this record.
    ///
    /// Only for the same lead; fields already known are kept. Returns true
    /// when anything changed.
    pub fn fill_details(&mut self, fresh: &CallRecord) -> bool {
        if fresh.lead_id != self.lead_id {
            return false;
        }
        let mut changed = false;
        if self.call_log_id.is_none() && fresh.call_log_id.is_some() {
            self.call_log_id = fresh.call_log_id.clone();
            changed = true;
        }
        for (mine, theirs) in [
            (&mut self.phone_code, &fresh.phone_code),
            (&mut self.phone_number, &fresh.phone_number),
            (&mut self.first_name, &fresh.first_name),
            (&mut self.last_name, &fresh.last_name),
        ] {
            if mine.is_empty() && !theirs.is_empty() {
                mine.clone_from(theirs);
                changed = true;
            }
        }
        changed
    }

    /// Caller display name, or empty when unknown.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Coarse telephony state mirrored from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneState {
    Unknown,
    NotReady,
    Available,
    Ringing,
    InCall,
    WrapUp,
    Other(i64),
}

impl PhoneState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::NotReady,
            2 => Self::Available,
            3 => Self::Ringing,
            4 => Self::InCall,
            5 => Self::WrapUp,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::NotReady => 1,
            Self::Available => 2,
            Self::Ringing => 3,
            Self::InCall => 4,
            Self::WrapUp => 5,
            Self::Other(code) => *code,
        }
    }

    /// A detected call may be handled only in these states.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Available | Self::Ringing | Self::InCall)
    }

    /// Ready for the next call after a disposition.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for PhoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "Other({})", code),
            state => write!(f, "{:?}", state),
        }
    }
}
