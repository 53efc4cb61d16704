//! File-system and process side of Autoseat: configuration loading, the
//! call log, the spam-label producer and the call/label merge.

pub mod call_log;
pub mod config_service;
pub mod labels;
pub mod merge;

pub use call_log::{CallLogRow, CallLogWriter, read_call_log};
pub use config_service::ConfigService;
pub use labels::{LabelRecorder, LabelStats, SpamLabel, label_stats, parse_caller_info, watch_logcat};
pub use merge::{DistributionReport, merge, merge_files, normalize_phone};
