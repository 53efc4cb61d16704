//! Spam-label producer.
//!
//! Watches the caller-ID lines an attached Android phone prints to logcat,
//! classifies each caller and appends one row per number to a label CSV:
//!
//! ```text
//! Number,Label,Date,Time,DisplayName
//! +15551234567,Scam Likely,2024-05-02,14:03:11,
//! ```

use autoseat_core::{AutoseatError, Result};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use strum::{Display, EnumString};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Heartbeat cadence of the logcat watcher, in lines.
const HEARTBEAT_LINES: u64 = 100;

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"mAddress:\s*([^,)]+)").unwrap());
static DISPLAY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"mDisplayName:\s*([^,)]+)").unwrap());
static SPAM_FLAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"mIsSpamOrRisk:\s*(true|false)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
pub enum SpamLabel {
    Regular,
    Telemarketing,
    #[strum(serialize = "Scam Likely")]
    ScamLikely,
    Spam,
}

impl SpamLabel {
    pub const ALL: [SpamLabel; 4] = [
        SpamLabel::Regular,
        SpamLabel::Telemarketing,
        SpamLabel::ScamLikely,
        SpamLabel::Spam,
    ];
}

/// Caller information extracted from one logcat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    pub number: String,
    pub label: SpamLabel,
    pub display_name: Option<String>,
}

/// Parses a `CallerInfoData` logcat line.
///
/// Returns `None` for unrelated lines and for lines whose number is masked.
pub fn parse_caller_info(line: &str) -> Option<CallerInfo> {
    if !line.contains("CallerInfoData") || !line.contains("mIsSpamOrRisk") {
        return None;
    }

    let number = ADDRESS_RE
        .captures(line)
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty() && !n.contains("XXX"))?;

    let display_name = DISPLAY_NAME_RE
        .captures(line)
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty() && !n.contains("XXX") && n != "NULL");

    let is_spam = SPAM_FLAG_RE
        .captures(line)
        .is_some_and(|c| &c[1] == "true");
    let label = if !is_spam {
        SpamLabel::Regular
    } else {
        let lower = line.to_lowercase();
        if lower.contains("telemarket") {
            SpamLabel::Telemarketing
        } else if lower.contains("scam") {
            SpamLabel::ScamLikely
        } else {
            SpamLabel::Spam
        }
    };

    Some(CallerInfo {
        number,
        label,
        display_name,
    })
}

/// One row of the label CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRow {
    #[serde(rename = "Number")]
    pub number: String,
    #[serde(rename = "Label")]
    pub label: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    /// Absent in files from the older four-column recorder
    #[serde(rename = "DisplayName", default)]
    pub display_name: Option<String>,
}

/// Reads a label CSV (four or five columns).
pub fn read_labels(path: &Path) -> Result<Vec<LabelRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| AutoseatError::io(format!("cannot read {}: {}", path.display(), e)))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<LabelRow>, _>>()?;
    Ok(rows)
}

/// Appends classified callers to the label CSV, each number once.
pub struct LabelRecorder {
    writer: csv::Writer<File>,
    path: PathBuf,
    recorded: HashSet<String>,
}

impl LabelRecorder {
    /// Opens (or creates, with header) the label CSV.
    ///
    /// Numbers already present in an existing file are not recorded again.
    pub fn open(path: &Path) -> Result<Self> {
        let has_content = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
        let existing = if has_content {
            let rows = read_labels(path)?;
            info!(path = %path.display(), rows = rows.len(), "Using existing label file");
            rows.into_iter().map(|r| r.number).collect()
        } else {
            info!(path = %path.display(), "Creating label file");
            HashSet::new()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AutoseatError::io(format!("cannot open {}: {}", path.display(), e)))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if !has_content {
            writer.write_record(["Number", "Label", "Date", "Time", "DisplayName"])?;
            writer.flush()?;
        }

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            recorded: existing,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records `info` unless its number was seen before. Returns true when written.
    pub fn record(&mut self, info: &CallerInfo) -> Result<bool> {
        if self.recorded.contains(&info.number) {
            debug!(number = %info.number, "Number already recorded");
            return Ok(false);
        }

        let now = Local::now();
        let row = LabelRow {
            number: info.number.clone(),
            label: info.label.to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            display_name: info.display_name.clone(),
        };
        self.writer.write_record([
            row.number.as_str(),
            row.label.as_str(),
            row.date.as_str(),
            row.time.as_str(),
            row.display_name.as_deref().unwrap_or_default(),
        ])?;
        self.writer.flush()?;
        self.recorded.insert(info.number.clone());

        info!(
            number = %row.number,
            label = %row.label,
            display_name = row.display_name.as_deref().unwrap_or_default(),
            "Caller label recorded"
        );
        Ok(true)
    }
}

/// Counters of one watch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchStats {
    pub lines: u64,
    pub matched: u64,
    pub recorded: u64,
}

/// Runs `command` (e.g. `adb logcat -v time`) and records every caller it
/// reports until the stream ends or `stop` is cancelled.
pub async fn watch_logcat(
    command: &[String],
    recorder: &mut LabelRecorder,
    stop: CancellationToken,
) -> Result<WatchStats> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| AutoseatError::config("logcat command is empty"))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AutoseatError::io(format!("failed to start '{}': {}", program, e)))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AutoseatError::internal("logcat stdout not captured"))?;
    info!(program = %program, output = %recorder.path().display(), "Watching logcat");

    let mut lines = BufReader::new(stdout).lines();
    let mut stats = WatchStats::default();
    loop {
        let line = tokio::select! {
            _ = stop.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            warn!("Logcat stream ended");
            break;
        };

        stats.lines += 1;
        if stats.lines % HEARTBEAT_LINES == 0 {
            info!(lines = stats.lines, "Processed log lines");
        }

        if let Some(caller) = parse_caller_info(&line) {
            stats.matched += 1;
            if recorder.record(&caller)? {
                stats.recorded += 1;
            }
        } else if line.contains("CallerInfoData") && line.contains("mIsSpamOrRisk") {
            debug!(line = %line.trim(), "Caller line without a usable number");
        }
    }

    if let Err(e) = child.kill().await {
        debug!(error = %e, "Logcat process already gone");
    }
    info!(
        lines = stats.lines,
        recorded = stats.recorded,
        "Stopped watching logcat"
    );
    Ok(stats)
}

/// Per-label totals of a label CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelStats {
    pub total: usize,
    pub by_label: BTreeMap<String, usize>,
}

impl LabelStats {
    pub fn count(&self, label: SpamLabel) -> usize {
        self.by_label
            .get(&label.to_string())
            .copied()
            .unwrap_or_default()
    }
}

impl fmt::Display for LabelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            return write!(f, "No records");
        }
        writeln!(f, "Statistics:")?;
        write!(f, "  Total records: {}", self.total)?;
        for label in SpamLabel::ALL {
            write!(f, "\n  {}: {}", label, self.count(label))?;
        }
        Ok(())
    }
}

pub fn label_stats(path: &Path) -> Result<LabelStats> {
    let rows = read_labels(path)?;
    let mut stats = LabelStats {
        total: rows.len(),
        ..Default::default()
    };
    for row in rows {
        *stats.by_label.entry(row.label).or_default() += 1;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::tempdir;

    const SPAM_LINE: &str = "05-02 14:03:11.120 I/CallerInfo( 1234): CallerInfoData{mAddress: +15551234567, \
        mDisplayName: NULL, mIsSpamOrRisk: true, mSpamType: scam}";

    #[test]
    fn test_parse_scam_line() {
        let info = parse_caller_info(SPAM_LINE).unwrap();
        assert_eq!(info.number, "+15551234567");
        assert_eq!(info.label, SpamLabel::ScamLikely);
        assert_eq!(info.display_name, None);
    }

    #[test]
    fn test_parse_regular_line_keeps_display_name() {
        let line = "CallerInfoData{mAddress: 5559876543, mDisplayName: Pat Doe, mIsSpamOrRisk: false}";
        let info = parse_caller_info(line).unwrap();
        assert_eq!(info.label, SpamLabel::Regular);
        assert_eq!(info.display_name.as_deref(), Some("Pat Doe"));
    }

    #[test]
    fn test_spam_without_category_and_telemarketing() {
        let spam = "CallerInfoData{mAddress: 5550001111, mIsSpamOrRisk: true}";
        assert_eq!(parse_caller_info(spam).unwrap().label, SpamLabel::Spam);

        let tele = "CallerInfoData{mAddress: 5550001111, mIsSpamOrRisk: true, type=Telemarketer}";
        assert_eq!(parse_caller_info(tele).unwrap().label, SpamLabel::Telemarketing);
    }

    #[test]
    fn test_masked_and_unrelated_lines_are_skipped() {
        let masked = "CallerInfoData{mAddress: 555XXXXXXX, mIsSpamOrRisk: true}";
        assert!(parse_caller_info(masked).is_none());
        assert!(parse_caller_info("I/Telecom: onCallAdded").is_none());
        assert!(parse_caller_info("CallerInfoData{mAddress: 5551234567}").is_none());
    }

    #[test]
    fn test_label_names_round_trip() {
        assert_eq!(SpamLabel::ScamLikely.to_string(), "Scam Likely");
        assert_eq!(SpamLabel::from_str("Scam Likely").unwrap(), SpamLabel::ScamLikely);
    }

    #[test]
    fn test_recorder_writes_header_once_and_skips_known_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.csv");
        let info = parse_caller_info(SPAM_LINE).unwrap();

        let mut recorder = LabelRecorder::open(&path).unwrap();
        assert!(recorder.record(&info).unwrap());
        assert!(!recorder.record(&info).unwrap());
        drop(recorder);

        let mut reopened = LabelRecorder::open(&path).unwrap();
        assert!(!reopened.record(&info).unwrap());

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("Number,Label").count(), 1);

        let stats = label_stats(&path).unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.count(SpamLabel::ScamLikely), 1);
    }

    #[test]
    fn test_stats_of_four_column_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.csv");
        std::fs::write(
            &path,
            "Number,Label,Date,Time\n5551,Regular,2024-05-01,10:00:00\n5552,Spam,2024-05-01,10:05:00\n5553,Regular,2024-05-01,10:09:00\n",
        )
        .unwrap();

        let stats = label_stats(&path).unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(SpamLabel::Regular), 2);
        assert_eq!(stats.count(SpamLabel::Spam), 1);
        assert!(stats.to_string().contains("Total records: 3"));
    }
}
