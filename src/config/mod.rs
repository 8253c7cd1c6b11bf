//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "chatlens";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;
const DEFAULT_STATE_PATH: &str = ".chatlens/state.json";
const DEFAULT_TEMPLATES_DIR: &str = "templates";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub logging: LoggingSettings,
    pub state: StateSettings,
    pub templates: TemplateSettings,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
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
pub struct StateSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TemplateSettings {
    pub directory: PathBuf,
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

    builder = builder.add_source(Environment::with_prefix("CHATLENS").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_cli(cli);
    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    remote: RawRemoteSettings,
    logging: RawLoggingSettings,
    state: RawStateSettings,
    templates: RawTemplateSettings,
}

impl RawSettings {
    fn apply_cli(&mut self, cli: &CliArgs) {
        self.apply_logging_overrides(&cli.logging);

        match &cli.command {
            Command::Watch(args) => {
                self.apply_remote_overrides(&args.remote);
                if let Some(delay) = args.reconnect_delay_ms {
                    self.remote.reconnect_delay_ms = Some(delay);
                }
                if let Some(path) = args.state_file.as_ref() {
                    self.state.path = Some(path.clone());
                }
            }
            Command::Render(args) => self.apply_remote_overrides(&args.remote),
            Command::List(args) => self.apply_remote_overrides(&args.remote),
            Command::Annotate(_) => {}
            Command::Template(args) => match &args.command {
                TemplateCommand::Extract(extract) => {
                    if let Some(directory) = extract.templates_dir.as_ref() {
                        self.templates.directory = Some(directory.clone());
                    }
                }
                TemplateCommand::Inject(_) => {}
            },
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_remote_overrides(&mut self, overrides: &RemoteOverrides) {
        if let Some(url) = overrides.base_url.as_ref() {
            self.remote.base_url = Some(url.clone());
        }
        if let Some(seconds) = overrides.request_timeout_seconds {
            self.remote.request_timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            remote,
            logging,
            state,
            templates,
        } = raw;

        Ok(Self {
            remote: build_remote_settings(remote)?,
            logging: build_logging_settings(logging)?,
            state: build_state_settings(state)?,
            templates: build_template_settings(templates)?,
        })
    }
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let raw_url = remote
        .base_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = Url::parse(&raw_url).map_err(|err| {
        LoadError::invalid("remote.base_url", format!("invalid URL `{raw_url}`: {err}"))
    })?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "remote.base_url",
            format!("unsupported scheme `{}`", base_url.scheme()),
        ));
    }

    let timeout_secs = remote
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "remote.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let reconnect_ms = remote
        .reconnect_delay_ms
        .unwrap_or(DEFAULT_RECONNECT_DELAY_MS);
    if reconnect_ms == 0 {
        return Err(LoadError::invalid(
            "remote.reconnect_delay_ms",
            "must be greater than zero",
        ));
    }

    Ok(RemoteSettings {
        base_url,
        request_timeout: Duration::from_secs(timeout_secs),
        reconnect_delay: Duration::from_millis(reconnect_ms),
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

fn build_state_settings(state: RawStateSettings) -> Result<StateSettings, LoadError> {
    let path = non_empty_path(state.path, DEFAULT_STATE_PATH);
    if path.file_name().is_none() {
        return Err(LoadError::invalid("state.path", "must name a file"));
    }
    Ok(StateSettings { path })
}

fn build_template_settings(templates: RawTemplateSettings) -> Result<TemplateSettings, LoadError> {
    Ok(TemplateSettings {
        directory: non_empty_path(templates.directory, DEFAULT_TEMPLATES_DIR),
    })
}

fn non_empty_path(value: Option<PathBuf>, default: &str) -> PathBuf {
    value
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(default))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
    reconnect_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStateSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTemplateSettings {
    directory: Option<PathBuf>,
}
