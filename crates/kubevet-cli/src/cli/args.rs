use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kubevet",
    version,
    about = "Validation outcome cache and hot-reloadable check registry for Kubernetes objects"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve the check configuration and print the enabled checks
    Checks(ChecksArgs),
    /// Serve check registry snapshots, reloading when the config file changes
    Watch(WatchArgs),
    Version,
}

#[derive(Args, Clone, Debug)]
pub struct ChecksArgs {
    /// Check configuration file (falls back to the built-in default when missing)
    #[arg(long, env = "KUBEVET_CONFIG", default_value = kubevet_core::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Clone, Debug)]
pub struct WatchArgs {
    #[arg(long, env = "KUBEVET_CONFIG", default_value = kubevet_core::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Config file poll interval (milliseconds)
    #[arg(long, default_value_t = 250)]
    pub poll_ms: u64,

    /// Debounce file changes before reloading (milliseconds)
    #[arg(long, default_value_t = 350)]
    pub debounce_ms: u64,

    /// Keep cached outcomes when a new snapshot is installed
    #[arg(long)]
    pub keep_cache: bool,
}
