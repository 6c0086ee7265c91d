use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::Config;
use crate::duration::parse_duration;

/// Probe blockchain node APIs round-robin and emit per-phase latency telemetry.
#[derive(Debug, Parser)]
#[command(name = "nodebeat", version, about)]
pub struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/nodebeat/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Time between probe cycles, e.g. "1s" or "500ms"
    #[arg(short, long, value_parser = |s: &str| parse_duration(s).map_err(|e| e.to_string()))]
    pub period: Option<Duration>,

    /// Node list JSON file
    #[arg(short, long)]
    pub nodes: Option<PathBuf>,

    /// Default log level; RUST_LOG still takes precedence
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(period) = self.period {
            config.period = period;
        }
        if let Some(nodes) = &self.nodes {
            config.nodes = nodes.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}
