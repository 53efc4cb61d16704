use anyhow::{Context, Result};
use autoseat_application::orchestrator::LABELS_OUT_ENV;
use autoseat_infrastructure::{LabelRecorder, label_stats, watch_logcat};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const DEFAULT_LABELS_FILE: &str = "spam_calls_record.csv";

const LOGCAT_COMMAND: [&str; 4] = ["adb", "logcat", "-v", "time"];

/// Output path: flag, then the variable set by `autoseat run --with-labeler`.
fn resolve_output(out: Option<PathBuf>) -> PathBuf {
    out.or_else(|| {
        std::env::var(LABELS_OUT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_FILE))
}

pub async fn watch(out: Option<PathBuf>) -> Result<()> {
    let path = resolve_output(out);
    let mut recorder = LabelRecorder::open(&path)
        .with_context(|| format!("Failed to open label file {}", path.display()))?;

    let stop = CancellationToken::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; stopping label watch");
        }
        on_signal.cancel();
    });

    let command: Vec<String> = LOGCAT_COMMAND.iter().map(|s| s.to_string()).collect();
    let watched = watch_logcat(&command, &mut recorder, stop).await?;
    println!(
        "Processed {} lines, {} caller lines, {} new numbers",
        watched.lines, watched.matched, watched.recorded
    );

    println!("{}", label_stats(&path)?);
    Ok(())
}

pub fn stats(file: &Path) -> Result<()> {
    let stats = label_stats(file)
        .with_context(|| format!("Failed to read label file {}", file.display()))?;
    println!("{}", stats);
    Ok(())
}
