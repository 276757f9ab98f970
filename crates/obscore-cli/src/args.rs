use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Parser)]
#[command(name = "obscore")]
#[command(about = "Record, query and replay obscore sessions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Workspace data directory. Defaults to the resolution order
    /// documented on `obscore_sdk::Config` (OBSCORE_PATH, XDG data dir,
    /// `~/.obscore`).
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Append a single message event to a session's log.
    Record {
        /// Session id to append to.
        #[arg(long)]
        session: String,
        /// Message role (e.g. "user", "assistant").
        #[arg(long, default_value = "user")]
        role: String,
        /// Message content.
        content: String,
    },

    /// Inspect (query) a session's events, optionally filtered by type.
    Inspect {
        /// Session id to query.
        #[arg(long)]
        session: String,
        /// Restrict to these event types (repeatable).
        #[arg(long = "type")]
        types: Vec<String>,
        /// Cap the number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Replay a session's events at a given speed.
    Replay {
        /// Session id to replay.
        #[arg(long)]
        session: String,
        /// Playback speed multiplier (1.0 = real time).
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
        /// Deliver every event immediately, ignoring original timing.
        #[arg(long)]
        skip_timing: bool,
    },
}
