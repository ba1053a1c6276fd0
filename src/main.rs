// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use buildservd::config::{self, SupervisorConfig};
use buildservd::monitor::Supervisor;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "buildservd", version, about = "Build-and-serve supervisor")]
struct Cli {
    /// Supervisor config file (default: $BUILDSERVD_CONFIG or the packaged
    /// path).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between monitor ticks; overrides the config file and
    /// $BUILDSERVD_INTERVAL.
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let cli = Cli::parse();
    info!("buildservd starting (version {})", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let config = SupervisorConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;
    let interval = Duration::from_secs(cli.interval.unwrap_or_else(|| config.interval_secs()));

    let mut supervisor = Supervisor::new(config, interval)?;
    supervisor.run().await?;

    info!("buildservd shutting down");
    Ok(())
}
