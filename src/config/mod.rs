//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::{
    CliArgs, Command, LoggingOverrides, LookupArgs, LookupOverrides, RunArgs, ServeArgs,
    TopicOverrides, WriteConfigArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "caloriecounter";
const ENV_PREFIX: &str = "CALORIECOUNTER";
const DEFAULT_SOURCE_TOPIC: &str = "revspace/bank/sale";
const DEFAULT_DESTINATION_TOPIC: &str = "revspace/bar/energy";
const DEFAULT_OFF_URL: &str = "https://world.openfoodfacts.org";
const DEFAULT_OFF_TIMEOUT_MS: u64 = 3000;
const DEFAULT_STORAGE_ROOT: &str = ".";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
const DEFAULT_SERVER_PORT: u16 = 3050;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub topics: TopicSettings,
    pub lookup: LookupSettings,
    pub logging: LoggingSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone)]
pub struct TopicSettings {
    pub source: String,
    pub destination: String,
}

#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub url: Url,
    pub timeout: Duration,
    pub storage_root: PathBuf,
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
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("failed to render configuration template: {0}")]
    Template(#[from] toml::ser::Error),
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
        Some(Command::Run(args)) => raw.apply_run_overrides(args),
        Some(Command::Serve(args)) => raw.apply_serve_overrides(args),
        Some(Command::Lookup(args)) => {
            raw.apply_logging_overrides(&args.logging);
            raw.apply_lookup_overrides(&args.lookup);
        }
        Some(Command::WriteConfig(_)) | None => {}
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

/// TOML document holding every setting at its default value.
pub fn default_template() -> Result<String, LoadError> {
    Ok(toml::to_string_pretty(&RawSettings::with_defaults())?)
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    topics: RawTopicSettings,
    openfoodfacts: RawLookupSettings,
    logging: RawLoggingSettings,
    server: RawServerSettings,
}

impl RawSettings {
    fn with_defaults() -> Self {
        Self {
            topics: RawTopicSettings {
                source: Some(DEFAULT_SOURCE_TOPIC.to_string()),
                destination: Some(DEFAULT_DESTINATION_TOPIC.to_string()),
            },
            openfoodfacts: RawLookupSettings {
                url: Some(DEFAULT_OFF_URL.to_string()),
                timeout_ms: Some(DEFAULT_OFF_TIMEOUT_MS),
                storage: Some(PathBuf::from(DEFAULT_STORAGE_ROOT)),
            },
            logging: RawLoggingSettings {
                level: Some(DEFAULT_LOG_LEVEL.to_string()),
                json: Some(false),
            },
            server: RawServerSettings {
                host: Some(DEFAULT_SERVER_HOST.to_string()),
                port: Some(DEFAULT_SERVER_PORT),
            },
        }
    }

    fn apply_run_overrides(&mut self, overrides: &RunArgs) {
        self.apply_logging_overrides(&overrides.logging);
        self.apply_lookup_overrides(&overrides.lookup);
        self.apply_topic_overrides(&overrides.topics);
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeArgs) {
        self.apply_logging_overrides(&overrides.logging);
        self.apply_lookup_overrides(&overrides.lookup);
        self.apply_topic_overrides(&overrides.topics);

        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
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

    fn apply_lookup_overrides(&mut self, overrides: &LookupOverrides) {
        if let Some(url) = overrides.off_url.as_ref() {
            self.openfoodfacts.url = Some(url.clone());
        }
        if let Some(timeout) = overrides.off_timeout_ms {
            self.openfoodfacts.timeout_ms = Some(timeout);
        }
        if let Some(root) = overrides.storage_root.as_ref() {
            self.openfoodfacts.storage = Some(root.clone());
        }
    }

    fn apply_topic_overrides(&mut self, overrides: &TopicOverrides) {
        if let Some(topic) = overrides.source_topic.as_ref() {
            self.topics.source = Some(topic.clone());
        }
        if let Some(topic) = overrides.destination_topic.as_ref() {
            self.topics.destination = Some(topic.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            topics,
            openfoodfacts,
            logging,
            server,
        } = raw;

        let topics = build_topic_settings(topics)?;
        let lookup = build_lookup_settings(openfoodfacts)?;
        let logging = build_logging_settings(logging)?;
        let server = build_server_settings(server)?;

        Ok(Self {
            topics,
            lookup,
            logging,
            server,
        })
    }
}

fn build_topic_settings(topics: RawTopicSettings) -> Result<TopicSettings, LoadError> {
    let source = non_empty(topics.source, DEFAULT_SOURCE_TOPIC, "topics.source")?;
    let destination = non_empty(
        topics.destination,
        DEFAULT_DESTINATION_TOPIC,
        "topics.destination",
    )?;
    Ok(TopicSettings {
        source,
        destination,
    })
}

fn build_lookup_settings(lookup: RawLookupSettings) -> Result<LookupSettings, LoadError> {
    let raw_url = lookup.url.unwrap_or_else(|| DEFAULT_OFF_URL.to_string());
    let url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("openfoodfacts.url", format!("failed to parse: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "openfoodfacts.url",
            "scheme must be http or https",
        ));
    }

    let timeout_ms = lookup.timeout_ms.unwrap_or(DEFAULT_OFF_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "openfoodfacts.timeout_ms",
            "must be greater than zero",
        ));
    }

    let storage_root = lookup
        .storage
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_ROOT));
    if storage_root.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "openfoodfacts.storage",
            "path must not be empty",
        ));
    }

    Ok(LookupSettings {
        url,
        timeout: Duration::from_millis(timeout_ms),
        storage_root,
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

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server
        .host
        .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_SERVER_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let candidate = format!("{host}:{port}");
    let addr = candidate.parse().map_err(|err| {
        LoadError::invalid("server.addr", format!("invalid address `{candidate}`: {err}"))
    })?;

    Ok(ServerSettings { addr })
}

fn non_empty(value: Option<String>, default: &str, key: &'static str) -> Result<String, LoadError> {
    let value = value.unwrap_or_else(|| default.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoadError::invalid(key, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawTopicSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawLookupSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
}
