//! Joins the call log with spam labels and reports the label distribution.

use crate::call_log::{CallLogRow, read_call_log};
use crate::labels::{LabelRow, read_labels};
use autoseat_core::{AutoseatError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Label given to calls whose number never appeared in the label file.
pub const UNLABELED: &str = "Unlabeled";

/// Reduces a phone number to its national digits.
///
/// Keeps digits only and drops the leading country code `1` of an
/// 11-digit number. Returns `None` when no digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => None,
        11 if digits.starts_with('1') => Some(digits[1..].to_string()),
        _ => Some(digits),
    }
}

/// One call joined with its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub detected_at: DateTime<Utc>,
    pub lead_id: String,
    pub call_log_id: Option<String>,
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub talk_time_secs: Option<u64>,
    pub disposition_status: Option<String>,
    pub outcome: String,
    pub spam_label: String,
    pub label_date: Option<String>,
    pub label_time: Option<String>,
    pub caller_display_name: Option<String>,
}

/// Totals of a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    pub total: usize,
    pub labeled: usize,
    pub by_label: BTreeMap<String, usize>,
    pub by_disposition: BTreeMap<String, usize>,
}

impl DistributionReport {
    pub fn share(&self, count: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            count as f64 * 100.0 / self.total as f64
        }
    }

    fn write_section(
        &self,
        f: &mut fmt::Formatter<'_>,
        title: &str,
        counts: &BTreeMap<String, usize>,
    ) -> fmt::Result {
        write!(f, "\n  {}:", title)?;
        for (name, count) in counts {
            write!(f, "\n    {:<20} {:>5}  ({:.1}%)", name, count, self.share(*count))?;
        }
        Ok(())
    }
}

impl fmt::Display for DistributionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Call distribution: {} calls, {} labeled ({:.1}%)",
            self.total,
            self.labeled,
            self.share(self.labeled)
        )?;
        if self.total == 0 {
            return Ok(());
        }
        self.write_section(f, "By label", &self.by_label)?;
        self.write_section(f, "By disposition", &self.by_disposition)
    }
}

/// Joins `calls` with `labels` on the normalized phone number.
///
/// When a number was labeled more than once the last row wins.
pub fn merge(calls: &[CallLogRow], labels: &[LabelRow]) -> (Vec<MergedRow>, DistributionReport) {
    let mut index: HashMap<String, &LabelRow> = HashMap::new();
    for label in labels {
        if let Some(number) = normalize_phone(&label.number) {
            index.insert(number, label);
        }
    }

    let mut report = DistributionReport {
        total: calls.len(),
        ..Default::default()
    };
    let merged = calls
        .iter()
        .map(|call| {
            let label = normalize_phone(&call.phone_number).and_then(|n| index.get(&n).copied());
            let spam_label = label.map_or(UNLABELED.to_string(), |l| l.label.clone());
            if label.is_some() {
                report.labeled += 1;
            }
            *report.by_label.entry(spam_label.clone()).or_default() += 1;
            let disposition = call
                .disposition_status
                .clone()
                .unwrap_or_else(|| call.outcome.clone());
            *report.by_disposition.entry(disposition).or_default() += 1;

            MergedRow {
                detected_at: call.detected_at,
                lead_id: call.lead_id.clone(),
                call_log_id: call.call_log_id.clone(),
                phone_number: call.phone_number.clone(),
                first_name: call.first_name.clone(),
                last_name: call.last_name.clone(),
                talk_time_secs: call.talk_time_secs,
                disposition_status: call.disposition_status.clone(),
                outcome: call.outcome.clone(),
                spam_label,
                label_date: label.map(|l| l.date.clone()),
                label_time: label.map(|l| l.time.clone()),
                caller_display_name: label.and_then(|l| l.display_name.clone()),
            }
        })
        .collect();

    (merged, report)
}

/// Reads both CSVs, writes the merged CSV to `out` and returns the report.
pub fn merge_files(calls: &Path, labels: &Path, out: &Path) -> Result<DistributionReport> {
    let call_rows = read_call_log(calls)?;
    let label_rows = read_labels(labels)?;
    let (merged, report) = merge(&call_rows, &label_rows);

    let mut writer = csv::Writer::from_path(out)
        .map_err(|e| AutoseatError::io(format!("cannot write {}: {}", out.display(), e)))?;
    for row in &merged {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(
        calls = report.total,
        labeled = report.labeled,
        out = %out.display(),
        "Merged call log"
    );
    Ok(report)
}
