//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Watches the chart plotter hat's shutdown line and powers the host off.
#[derive(Parser, Debug)]
#[command(name = "hatmond")]
#[command(about = "Shutdown monitor for the chart plotter hat", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to /etc/hatmon/config.toml when present)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Detect and log, but do not kill processes or power off
    #[arg(long)]
    pub dry_run: bool,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["hatmond"]).unwrap();
        assert!(cli.config.is_none());
        assert!(!cli.dry_run);
        assert!(!cli.print_config);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn all_flags() {
        let cli = Cli::try_parse_from([
            "hatmond",
            "-c",
            "/tmp/hat.toml",
            "--dry-run",
            "--print-config",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/hat.toml")));
        assert!(cli.dry_run);
        assert!(cli.print_config);
        assert_eq!(cli.log_level, "debug");
    }
}
