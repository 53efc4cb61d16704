//! Call log CSV sink.
//!
//! Consumes the controller's [`CallEvent`] stream and appends one row per
//! closed call (dispositioned or abandoned). The file is the input of the
//! label merge.

use autoseat_core::{AutoseatError, CallEvent, CallRecord, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

/// One closed call as stored in the call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLogRow {
    pub detected_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub lead_id: String,
    pub call_log_id: Option<String>,
    pub phone_code: String,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub talk_time_secs: Option<u64>,
    pub disposition_status: Option<String>,
    /// `dispositioned`, `disposition_failed` or `abandoned`
    pub outcome: String,
}

impl CallLogRow {
    fn from_call(call: &CallRecord, talk_time_secs: Option<u64>, outcome: &str) -> Self {
        Self {
            detected_at: call.detected_at,
            ended_at: call.ended_at,
            lead_id: call.lead_id.clone(),
            call_log_id: call.call_log_id.clone(),
            phone_code: call.phone_code.clone(),
            phone_number: call.phone_number.clone(),
            first_name: call.first_name.clone(),
            last_name: call.last_name.clone(),
            talk_time_secs,
            disposition_status: call.disposition_status.clone(),
            outcome: outcome.to_string(),
        }
    }
}

/// Appends call rows to a CSV file, writing the header only for a new file.
pub struct CallLogWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    /// Talk time of ended calls not yet closed, keyed by lead id
    talk_times: HashMap<String, u64>,
}

impl CallLogWriter {
    pub fn open(path: &Path) -> Result<Self> {
        let has_content = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AutoseatError::io(format!("cannot open {}: {}", path.display(), e)))?;

        let writer = csv::WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(file);
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            talk_times: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records one event. Returns true when a row was written.
    pub fn record(&mut self, event: &CallEvent) -> Result<bool> {
        let row = match event {
            CallEvent::Connected { .. } => return Ok(false),
            CallEvent::Ended {
                call, talk_time_ms, ..
            } => {
                self.talk_times
                    .insert(call.lead_id.clone(), talk_time_ms / 1000);
                return Ok(false);
            }
            CallEvent::Dispositioned { call, success, .. } => {
                let outcome = if *success {
                    "dispositioned"
                } else {
                    "disposition_failed"
                };
                CallLogRow::from_call(call, self.talk_times.remove(&call.lead_id), outcome)
            }
            CallEvent::Abandoned { call, .. } => {
                CallLogRow::from_call(call, self.talk_times.remove(&call.lead_id), "abandoned")
            }
        };

        self.writer.serialize(&row)?;
        self.writer.flush()?;
        debug!(lead_id = %row.lead_id, outcome = %row.outcome, "Call logged");
        Ok(true)
    }

    /// Drains `events` until every sender is gone. Returns the rows written.
    pub async fn consume(mut self, mut events: UnboundedReceiver<CallEvent>) -> Result<usize> {
        let mut written = 0;
        while let Some(event) = events.recv().await {
            if self.record(&event)? {
                written += 1;
            }
        }
        self.writer.flush()?;
        Ok(written)
    }
}

/// Reads every row of a call log.
pub fn read_call_log(path: &Path) -> Result<Vec<CallLogRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AutoseatError::io(format!("cannot read {}: {}", path.display(), e)))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<CallLogRow>, _>>()?;
    Ok(rows)
}
