//! `cosmic-dashboard` binary.
//!
//! Runs the terminal dashboard by default, or `--headless` to keep the
//! connection alive and log a status line periodically.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cosmic_client::WsTransport;
use cosmic_dashboard::{console, CosmicAgentApp, DashboardConfig, SystemMonitor};

const HEADLESS_REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Cosmic Agent Network dashboard.
#[derive(Parser, Debug)]
#[command(name = "cosmic-dashboard", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hostname the dashboard is considered to be served from.
    #[arg(long)]
    hostname: Option<String>,

    /// Backend URL, overriding hostname-based resolution.
    #[arg(long)]
    backend_url: Option<String>,

    /// Force demo mode (no connection attempts).
    #[arg(long)]
    demo: bool,

    /// Run without the terminal UI.
    #[arg(long)]
    headless: bool,
}

fn init_tracing(headless: bool) {
    let default = if headless { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    // The console owns the terminal; stray log lines would corrupt it.
    if headless {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::sink)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.headless);

    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    config.apply_env();
    if let Some(hostname) = &cli.hostname {
        config.set_hostname(hostname);
    }
    if let Some(url) = cli.backend_url {
        config.backend.backend_url = Some(url);
    }
    if cli.demo {
        config.backend.demo_mode = Some(true);
    }

    tracing::info!(
        backend = %config.backend.backend_url(),
        demo = config.backend.should_use_demo_mode(),
        "starting dashboard"
    );

    let app = CosmicAgentApp::new(config, WsTransport)?;
    if cli.headless {
        run_headless(app).await
    } else {
        console::run_console(app).await
    }
}

async fn run_headless(app: CosmicAgentApp) -> anyhow::Result<()> {
    let init = {
        let app = app.clone();
        tokio::spawn(async move { app.initialize().await })
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut report = tokio::time::interval(HEADLESS_REPORT_INTERVAL);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                }
                break;
            }
            _ = report.tick() => {
                let summary = SystemMonitor::from_state(&app.state()).summary();
                tracing::info!(%summary, "status");
            }
        }
    }

    init.abort();
    app.shutdown();
    Ok(())
}
