//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::documents::DocumentSettings;
use crate::application::jobs::cycle_schedule;
use crate::application::render::AssetNames;
use crate::domain::types::Direction;

pub use cli::{
    CliArgs, Command, DatabaseOverride, IssueKeyArgs, RevokeKeyArgs, RunCycleArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "missive";
const ENV_PREFIX: &str = "MISSIVE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_STALE_AFTER_SECS: u64 = 600;
const DEFAULT_FAN_OUT: u32 = 4;
const DEFAULT_MAX_BATCHES: u32 = 4;
const DEFAULT_CYCLE_SCHEDULE: &str = "0 * * * * *";
const DEFAULT_STORAGE_DIR: &str = "var/artifacts";
const DEFAULT_ASSET_DIR: &str = "assets";
const DEFAULT_ASSET_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LOGO: &str = "logo.jpg";
const DEFAULT_WATERMARK: &str = "watermark.jpg";
const DEFAULT_STAMP: &str = "stamp.jpg";
const DEFAULT_ARABIC_FONT: &str = "Amiri-Regular.ttf";
const DEFAULT_LATIN_FONT: &str = "DejaVuSans.ttf";
const DEFAULT_VERIFY_BASE_URL: &str = "http://127.0.0.1:3000/verify";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub jobs: JobsSettings,
    pub storage: StorageSettings,
    pub assets: AssetSettings,
    pub documents: DocumentSettings,
    /// `None` when mail delivery is disabled.
    pub mail: Option<MailSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub stale_after: Duration,
    pub fan_out: NonZeroU32,
    pub max_batches: NonZeroU32,
    /// Validated six-field cron expression.
    pub cycle_schedule: String,
    pub run_scheduler: bool,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Clone)]
pub enum AssetLocation {
    Directory(PathBuf),
    Remote(Url),
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub location: AssetLocation,
    /// Upper bound on one remote asset request, connect through body.
    pub fetch_timeout: Duration,
    pub names: AssetNames,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub starttls: bool,
    pub from: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::RunCycle(args)) => raw.apply_run_cycle_overrides(args),
        Some(Command::IssueKey(args)) => raw.apply_database_override(&args.database),
        Some(Command::RevokeKey(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    jobs: RawJobsSettings,
    storage: RawStorageSettings,
    assets: RawAssetSettings,
    documents: RawDocumentSettings,
    mail: RawMailSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(run) = overrides.jobs_run_scheduler {
            self.jobs.run_scheduler = Some(run);
        }
        if let Some(schedule) = overrides.jobs_cycle_schedule.as_ref() {
            self.jobs.cycle_schedule = Some(schedule.clone());
        }
        if let Some(directory) = overrides.storage_directory.as_ref() {
            self.storage.directory = Some(directory.clone());
        }

        self.apply_database_override(&overrides.database);
    }

    fn apply_run_cycle_overrides(&mut self, args: &RunCycleArgs) {
        if let Some(max) = args.max_batches {
            self.jobs.max_batches = Some(max);
        }
        if let Some(directory) = args.storage_directory.as_ref() {
            self.storage.directory = Some(directory.clone());
        }
        self.apply_database_override(&args.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            jobs,
            storage,
            assets,
            documents,
            mail,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            jobs: build_jobs_settings(jobs)?,
            storage: build_storage_settings(storage)?,
            assets: build_asset_settings(assets)?,
            documents: build_document_settings(documents)?,
            mail: build_mail_settings(mail)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let stale_secs = jobs.stale_after_seconds.unwrap_or(DEFAULT_STALE_AFTER_SECS);
    if stale_secs == 0 {
        return Err(LoadError::invalid(
            "jobs.stale_after_seconds",
            "must be greater than zero",
        ));
    }

    let schedule = jobs
        .cycle_schedule
        .unwrap_or_else(|| DEFAULT_CYCLE_SCHEDULE.to_string());
    cycle_schedule(&schedule)
        .map_err(|err| LoadError::invalid("jobs.cycle_schedule", err.to_string()))?;

    Ok(JobsSettings {
        stale_after: Duration::from_secs(stale_secs),
        fan_out: non_zero_u32(
            jobs.fan_out.unwrap_or(DEFAULT_FAN_OUT).into(),
            "jobs.fan_out",
        )?,
        max_batches: non_zero_u32(
            jobs.max_batches.unwrap_or(DEFAULT_MAX_BATCHES).into(),
            "jobs.max_batches",
        )?,
        cycle_schedule: schedule,
        run_scheduler: jobs.run_scheduler.unwrap_or(true),
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let directory = storage
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.directory",
            "path must not be empty",
        ));
    }
    Ok(StorageSettings { directory })
}

fn build_asset_settings(assets: RawAssetSettings) -> Result<AssetSettings, LoadError> {
    let location = match non_blank(assets.base_url) {
        Some(raw) => {
            let mut url = Url::parse(&raw)
                .map_err(|err| LoadError::invalid("assets.base_url", err.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "assets.base_url",
                    "scheme must be http or https",
                ));
            }
            // `Url::join` replaces the last segment unless the path ends with a slash.
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            AssetLocation::Remote(url)
        }
        None => AssetLocation::Directory(
            assets
                .directory
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSET_DIR)),
        ),
    };

    let timeout_secs = assets
        .fetch_timeout_seconds
        .unwrap_or(DEFAULT_ASSET_FETCH_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "assets.fetch_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let name = |value: Option<String>, default: &str, key: &'static str| {
        let value = value.unwrap_or_else(|| default.to_string());
        if value.trim().is_empty() {
            Err(LoadError::invalid(key, "file name must not be empty"))
        } else {
            Ok(value.trim().to_string())
        }
    };

    Ok(AssetSettings {
        location,
        fetch_timeout: Duration::from_secs(timeout_secs),
        names: AssetNames {
            logo: name(assets.logo, DEFAULT_LOGO, "assets.logo")?,
            watermark: name(assets.watermark, DEFAULT_WATERMARK, "assets.watermark")?,
            stamp: name(assets.stamp, DEFAULT_STAMP, "assets.stamp")?,
            arabic_font: name(assets.arabic_font, DEFAULT_ARABIC_FONT, "assets.arabic_font")?,
            latin_font: name(assets.latin_font, DEFAULT_LATIN_FONT, "assets.latin_font")?,
        },
    })
}

fn build_document_settings(
    documents: RawDocumentSettings,
) -> Result<DocumentSettings, LoadError> {
    let direction = match documents.direction.as_deref() {
        Some(raw) => Direction::try_from(raw)
            .map_err(|_| LoadError::invalid("documents.direction", "expected `rtl` or `ltr`"))?,
        None => Direction::Rtl,
    };

    let verify_base_url = documents
        .verify_base_url
        .unwrap_or_else(|| DEFAULT_VERIFY_BASE_URL.to_string());
    let parsed = Url::parse(verify_base_url.trim())
        .map_err(|err| LoadError::invalid("documents.verify_base_url", err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "documents.verify_base_url",
            "scheme must be http or https",
        ));
    }

    Ok(DocumentSettings {
        direction,
        authority: documents.authority.unwrap_or_default().trim().to_string(),
        title: documents.title.unwrap_or_default().trim().to_string(),
        order_suffix: documents.order_suffix.unwrap_or_default().trim().to_string(),
        instructions: documents.instructions.unwrap_or_default().trim().to_string(),
        verify_base_url: verify_base_url.trim().to_string(),
    })
}

fn build_mail_settings(mail: RawMailSettings) -> Result<Option<MailSettings>, LoadError> {
    if !mail.enabled.unwrap_or(false) {
        return Ok(None);
    }

    let host = non_blank(mail.host)
        .ok_or_else(|| LoadError::invalid("mail.host", "required when mail is enabled"))?;
    let from = non_blank(mail.from)
        .ok_or_else(|| LoadError::invalid("mail.from", "required when mail is enabled"))?;
    let port = mail.port.unwrap_or(DEFAULT_SMTP_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "mail.port",
            "port must be greater than zero",
        ));
    }

    Ok(Some(MailSettings {
        host,
        port,
        username: non_blank(mail.username),
        password: mail.password,
        starttls: mail.starttls.unwrap_or(true),
        from,
    }))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    stale_after_seconds: Option<u64>,
    fan_out: Option<u32>,
    max_batches: Option<u32>,
    cycle_schedule: Option<String>,
    run_scheduler: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAssetSettings {
    directory: Option<PathBuf>,
    base_url: Option<String>,
    fetch_timeout_seconds: Option<u64>,
    logo: Option<String>,
    watermark: Option<String>,
    stamp: Option<String>,
    arabic_font: Option<String>,
    latin_font: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDocumentSettings {
    direction: Option<String>,
    authority: Option<String>,
    title: Option<String>,
    order_suffix: Option<String>,
    instructions: Option<String>,
    verify_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMailSettings {
    enabled: Option<bool>,
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    starttls: Option<bool>,
    from: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests;
