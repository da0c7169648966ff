use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use uuid::Uuid;

/// Command-line arguments for the missive binary.
#[derive(Debug, Parser)]
#[command(name = "missive", version, about = "Mission order generation service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "MISSIVE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API and, when enabled, the cycle scheduler.
    Serve(Box<ServeArgs>),
    /// Run one bounded processing cycle and exit.
    #[command(name = "run-cycle")]
    RunCycle(RunCycleArgs),
    /// Issue an API key for a caller.
    #[command(name = "issue-key")]
    IssueKey(IssueKeyArgs),
    /// Revoke an API key; requests using it are rejected from then on.
    #[command(name = "revoke-key")]
    RevokeKey(RevokeKeyArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle the in-process cycle scheduler.
    #[arg(
        long = "jobs-run-scheduler",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub jobs_run_scheduler: Option<bool>,

    /// Override the cycle cron expression (six fields, seconds first).
    #[arg(long = "jobs-cycle-schedule", value_name = "CRON")]
    pub jobs_cycle_schedule: Option<String>,

    /// Override the document storage directory.
    #[arg(long = "storage-directory", value_name = "PATH")]
    pub storage_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunCycleArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Jobs processed concurrently in this cycle.
    #[arg(long = "max-batches", value_name = "COUNT")]
    pub max_batches: Option<u32>,

    /// Override the document storage directory.
    #[arg(long = "storage-directory", value_name = "PATH")]
    pub storage_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct IssueKeyArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Caller label; owns every job enqueued with the key.
    #[arg(long, value_name = "NAME")]
    pub name: String,

    /// Granted scopes (jobs_write, jobs_read); defaults to both.
    #[arg(long = "scope", value_name = "SCOPE")]
    pub scopes: Vec<String>,

    /// Days until the key expires; never when omitted.
    #[arg(long = "expires-in-days", value_name = "DAYS")]
    pub expires_in_days: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct RevokeKeyArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Id of the key to revoke.
    #[arg(long, value_name = "UUID")]
    pub id: Uuid,
}
