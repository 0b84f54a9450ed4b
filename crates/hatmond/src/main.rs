//! hatmon daemon - chart plotter hat shutdown monitor
//!
//! Keeps the running line asserted and powers the host off when the hat
//! holds the shutdown line active long enough.

use anyhow::{Context, Result};
use clap::Parser;
use hatmon_common::{Config, DaemonError, SystemClock};
use hatmond::cli::Cli;
use hatmond::gpio::SysfsGpio;
use hatmond::{bootstrap, Actions};
use std::env;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref(), |key| env::var(key).ok())
        .map_err(DaemonError::from)
        .context("cannot load configuration")?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!(target: "hatmond", "starting {}", env!("CARGO_PKG_VERSION"));

    let actions = Actions::system(&config, cli.dry_run);
    let mut gpio = SysfsGpio::new(config.gpio.sysfs_root.clone());
    let scheduler = bootstrap(&config, &mut gpio, SystemClock, actions)
        .context("cannot take control of the GPIO lines")?;

    let report = scheduler.run()?;
    info!(
        target: "hatmond",
        "shutdown sequence complete after {} ms grace",
        report.grace_waited.as_millis()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let code = match run(&cli) {
        Ok(()) => 0,
        Err(err) => {
            error!(target: "hatmond", "{err:#}");
            err.downcast_ref::<DaemonError>()
                .map(DaemonError::exit_code)
                .unwrap_or(1)
        }
    };
    std::process::exit(code);
}
