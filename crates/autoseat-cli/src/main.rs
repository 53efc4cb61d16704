use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(name = "autoseat")]
#[command(about = "Autoseat - automated call-center agent seat", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, take calls until stopped, then log out
    Run(commands::run::RunArgs),
    /// Join a call log with a spam-label file
    Merge {
        #[arg(long)]
        calls: PathBuf,
        #[arg(long)]
        labels: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Record and inspect caller spam labels
    Labels {
        #[command(subcommand)]
        action: LabelsAction,
    },
}

#[derive(Subcommand)]
enum LabelsAction {
    /// Follow `adb logcat` and record caller labels
    Watch {
        /// Label CSV (defaults to $AUTOSEAT_LABELS_OUT, else spam_calls_record.csv)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print per-label totals of a label CSV
    Stats {
        #[arg(long, default_value = commands::labels::DEFAULT_LABELS_FILE)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match dispatch(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "autoseat failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Merge { calls, labels, out } => commands::merge::run(&calls, &labels, &out),
        Commands::Labels { action } => match action {
            LabelsAction::Watch { out } => commands::labels::watch(out).await,
            LabelsAction::Stats { file } => commands::labels::stats(&file),
        },
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
