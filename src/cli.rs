use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "aerops",
    version,
    about = "Grain silo aeration scheduler with weather-driven fan decisions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override SQLite data directory
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the forecast and 24-hour fan schedule for an establishment
    Schedule {
        establishment_id: i64,
        /// Print the dashboard view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the edge-device payload and acknowledge pending changes
    Poll { establishment_id: i64 },
    /// Flag every silo of an establishment as changed
    MarkModified { establishment_id: i64 },
    /// Report whether an establishment has unacknowledged changes
    Check { establishment_id: i64 },
    /// Load establishments and silos from a YAML file
    Import { file: PathBuf },
    /// Record an internal grain temperature reading
    Reading { silo_id: i64, temperature: f64 },
    /// Replace a silo's intelligent profile from a YAML file
    Profile { silo_id: i64, file: PathBuf },
    /// Enable, disable or show the switch that lets any aerator run
    Aerators {
        #[arg(value_enum)]
        action: SwitchAction,
    },
    /// Record the measured aerator current of an establishment, in amperes
    Current { establishment_id: i64, amps: f64 },
    /// Set the aerator current limit of an establishment; omit amps to remove it
    CurrentLimit {
        establishment_id: i64,
        amps: Option<f64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SwitchAction {
    Enable,
    Disable,
    Status,
}
