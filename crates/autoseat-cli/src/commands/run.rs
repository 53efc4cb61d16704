use anyhow::{Context, Result};
use autoseat_application::{Orchestrator, RunOptions};
use autoseat_core::{AgentConfig, SeatDriver, TransportMode};
use autoseat_infrastructure::ConfigService;
use autoseat_interaction::{ApiDriver, BrowserDriver, DevToolsPage, PlatformClient, ReqwestTransport};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Config file (defaults to $AUTOSEAT_CONFIG, else ~/.config/autoseat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transport: `api` or `browser`
    #[arg(long)]
    mode: Option<TransportMode>,

    /// Stop after this many calls (0 = unlimited)
    #[arg(long)]
    max_calls: Option<u32>,

    /// Start the spam-label producer alongside the seat
    #[arg(long)]
    with_labeler: bool,

    /// Merge the call log with the labels once the seat stops
    #[arg(long)]
    merge_after: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(max_calls) = self.max_calls {
            config.max_calls = max_calls;
        }
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let mut config = ConfigService::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate()?;

    info!(
        mode = ?config.mode,
        base_url = %config.base_url,
        campaign = %config.campaign.id,
        max_calls = config.max_calls,
        "Starting seat"
    );
    let driver = build_driver(&config).await?;

    let orchestrator = Orchestrator::new(
        config,
        RunOptions {
            with_labeler: args.with_labeler,
            merge_after: args.merge_after,
        },
    );
    let report = orchestrator.run(driver).await?;

    println!("{}", report.summary);
    if let Some(distribution) = report.distribution {
        println!("{}", distribution);
    }
    Ok(())
}

async fn build_driver(config: &AgentConfig) -> Result<Box<dyn SeatDriver>> {
    let transport = ReqwestTransport::new(config.timing.request_timeout())?;
    let client = PlatformClient::new(
        Arc::new(transport),
        config.base_url.clone(),
        config.endpoints.clone(),
        config.campaign.clone(),
        config.codes.clone(),
    );

    let driver: Box<dyn SeatDriver> = match config.mode {
        TransportMode::Api => Box::new(ApiDriver::new(client, config.credentials.clone())),
        TransportMode::Browser => {
            let browser = &config.browser;
            let page = DevToolsPage::attach(
                &browser.devtools_url,
                &browser.page_url_contains,
                browser.command_timeout(),
            )
            .await
            .with_context(|| format!("Failed to attach to browser at {}", browser.devtools_url))?;
            Box::new(BrowserDriver::new(
                Arc::new(page),
                client,
                browser.clone(),
                config.timing.ui_retry_delay(),
            ))
        }
    };
    Ok(driver)
}
