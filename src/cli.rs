use clap::{Args, Parser, Subcommand};
use event_collector::config::ConfigOverrides;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "event-collector", version, about = "Local event collector")]
pub struct Cli {
    /// Configuration file path (default: ./collector.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: OverrideArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the collector (default)
    Serve,

    /// Resolve and validate configuration without starting
    Check,

    /// Show the health of a running collector
    Status {
        /// Base URL of the collector (default: built from host and port)
        #[arg(long)]
        url: Option<String>,

        /// Print the raw health JSON
        #[arg(long)]
        json: bool,
    },
}

/// Explicit overrides; each wins over `COLLECTOR_*` variables and the file
#[derive(Args, Debug, Clone, Default)]
pub struct OverrideArgs {
    /// Bind host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Bind port
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// SQLite database file
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Delete events older than this many hours
    #[arg(long, global = true)]
    pub retention_hours: Option<u64>,

    /// Keep at most this many events
    #[arg(long, global = true)]
    pub max_rows: Option<u64>,

    #[arg(long, global = true)]
    pub flush_interval_ms: Option<u64>,

    #[arg(long, global = true)]
    pub flush_batch_size: Option<usize>,

    #[arg(long, global = true)]
    pub flush_queue_threshold: Option<usize>,

    #[arg(long, global = true)]
    pub max_queue_size: Option<usize>,

    #[arg(long, global = true)]
    pub retention_interval_ms: Option<u64>,

    #[arg(long, global = true)]
    pub shutdown_timeout_ms: Option<u64>,

    /// Comma-separated payload keys to redact
    #[arg(long, global = true)]
    pub redact_keys: Option<String>,

    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// pretty or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            db_path: args.db_path.map(|p| p.display().to_string()),
            retention_hours: args.retention_hours,
            max_rows: args.max_rows,
            flush_interval_ms: args.flush_interval_ms,
            flush_batch_size: args.flush_batch_size,
            flush_queue_threshold: args.flush_queue_threshold,
            max_queue_size: args.max_queue_size,
            retention_interval_ms: args.retention_interval_ms,
            shutdown_timeout_ms: args.shutdown_timeout_ms,
            redact_keys: args.redact_keys,
            log_level: args.log_level,
            log_format: args.log_format,
        }
    }
}

impl Cli {
    /// Get the command to execute, defaulting to Serve if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
