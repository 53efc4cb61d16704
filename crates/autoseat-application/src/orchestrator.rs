//! Orchestrator - process-level composition around one controller run.
//!
//! Wires signal-driven shutdown, the call-log sink, the optional external
//! label producer and the optional post-run merge.

use crate::controller::{CallSessionController, ControllerSettings};
use autoseat_core::config::LabelerConfig;
use autoseat_core::{AgentConfig, AutoseatError, Result, SeatDriver, SessionSummary};
use autoseat_infrastructure::call_log::CallLogWriter;
use autoseat_infrastructure::merge::{DistributionReport, merge_files};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Environment variable telling the label producer where to write.
pub const LABELS_OUT_ENV: &str = "AUTOSEAT_LABELS_OUT";

/// Flags a shutdown in progress so later triggers do not re-enter it.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    in_progress: AtomicBool,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the shutdown. Returns false if it was already claimed.
    pub fn begin(&self) -> bool {
        !self.in_progress.swap(true, Ordering::SeqCst)
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }
}

/// Cancels `stop` on the first termination signal; later signals only log.
pub fn spawn_signal_listener(stop: CancellationToken, guard: Arc<ShutdownGuard>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match wait_for_signal().await {
                Ok(signal) => handle_signal(signal, &stop, &guard),
                Err(e) => {
                    error!(error = %e, "Signal listener failed");
                    return;
                }
            }
        }
    })
}

/// Applies one termination trigger.
pub fn handle_signal(signal: &str, stop: &CancellationToken, guard: &ShutdownGuard) {
    if guard.begin() {
        info!(signal, "Stop requested; finishing the current call before shutting down");
        stop.cancel();
    } else {
        warn!(signal, "Shutdown already in progress");
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "Ctrl-C")
}

/// A running external label producer.
pub struct LabelerProcess {
    child: Child,
    program: String,
}

impl LabelerProcess {
    /// Starts the configured command; the child is killed if this handle is dropped.
    pub fn spawn(config: &LabelerConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| AutoseatError::config("labeler.command is empty"))?;

        let child = Command::new(program)
            .args(args)
            .env(LABELS_OUT_ENV, &config.output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AutoseatError::io(format!("failed to start label producer '{}': {}", program, e))
            })?;

        info!(
            pid = child.id(),
            program = %program,
            output = %config.output.display(),
            "Label producer started"
        );
        Ok(Self {
            child,
            program: program.clone(),
        })
    }

    /// Terminates the producer (if still running) and reaps it.
    pub async fn stop(mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                warn!(program = %self.program, %status, "Label producer exited early");
                return;
            }
            Ok(None) => {}
            Err(e) => warn!(program = %self.program, error = %e, "Cannot query label producer"),
        }
        match self.child.kill().await {
            Ok(()) => info!(program = %self.program, "Label producer stopped"),
            Err(e) => warn!(program = %self.program, error = %e, "Failed to stop label producer"),
        }
    }
}

/// Optional parts of the combined workflow.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run the label producer alongside the seat
    pub with_labeler: bool,
    /// Merge the call log with the labels after the seat stopped
    pub merge_after: bool,
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunReport {
    pub summary: SessionSummary,
    pub distribution: Option<DistributionReport>,
}

pub struct Orchestrator {
    config: AgentConfig,
    options: RunOptions,
    stop: CancellationToken,
    guard: Arc<ShutdownGuard>,
}

impl Orchestrator {
    pub fn new(config: AgentConfig, options: RunOptions) -> Self {
        Self {
            config,
            options,
            stop: CancellationToken::new(),
            guard: Arc::new(ShutdownGuard::new()),
        }
    }

    /// Token cancelled when a stop is requested.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn guard(&self) -> Arc<ShutdownGuard> {
        self.guard.clone()
    }

    /// Runs the seat with `driver` until it stops, then tears everything down.
    ///
    /// The label producer is started before the seat and stopped after it;
    /// the merge only runs after a run that did not end in a fatal error.
    pub async fn run(&self, driver: Box<dyn SeatDriver>) -> Result<RunReport> {
        let labeler = if self.options.with_labeler {
            Some(LabelerProcess::spawn(&self.config.labeler)?)
        } else {
            None
        };

        let writer = match CallLogWriter::open(&self.config.call_log.path) {
            Ok(writer) => writer,
            Err(e) => {
                if let Some(labeler) = labeler {
                    labeler.stop().await;
                }
                return Err(e);
            }
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let call_log = tokio::spawn(writer.consume(events_rx));
        let signals = spawn_signal_listener(self.stop.clone(), self.guard.clone());

        let settings = ControllerSettings::from_config(&self.config);
        let mut controller =
            CallSessionController::new(driver, settings, self.stop.clone()).with_events(events_tx);
        let outcome = controller.run().await;
        drop(controller);
        signals.abort();

        match call_log.await {
            Ok(Ok(records)) => info!(
                records,
                path = %self.config.call_log.path.display(),
                "Call log written"
            ),
            Ok(Err(e)) => warn!(error = %e, "Call log writer failed"),
            Err(e) => warn!(error = %e, "Call log writer task failed"),
        }

        if let Some(labeler) = labeler {
            labeler.stop().await;
        }

        let summary = outcome?;
        let distribution = if self.options.merge_after {
            self.merge()
        } else {
            None
        };
        Ok(RunReport {
            summary,
            distribution,
        })
    }

    fn merge(&self) -> Option<DistributionReport> {
        let labeler = &self.config.labeler;
        match merge_files(
            &self.config.call_log.path,
            &labeler.output,
            &labeler.merged_output,
        ) {
            Ok(report) => {
                info!(
                    merged = %labeler.merged_output.display(),
                    calls = report.total,
                    "Merged call log with labels"
                );
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Merge after run failed");
                None
            }
        }
    }
}
