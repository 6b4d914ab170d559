use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the caloriecounter binary.
#[derive(Debug, Parser)]
#[command(
    name = "caloriecounter",
    version,
    about = "Tallies the energy of scanned products"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CALORIECOUNTER_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Read bar codes from stdin, one per line, and print running totals.
    Run(Box<RunArgs>),
    /// Accept bar codes over HTTP and retain published totals per topic.
    Serve(Box<ServeArgs>),
    /// Resolve a single bar code without keeping a total.
    Lookup(LookupArgs),
    /// Write a configuration file holding every default setting.
    #[command(name = "write-config")]
    WriteConfig(WriteConfigArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
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
}

#[derive(Debug, Args, Default, Clone)]
pub struct LookupOverrides {
    /// Override the Open Food Facts base URL.
    #[arg(long = "off-url", value_name = "URL")]
    pub off_url: Option<String>,

    /// Override the Open Food Facts request timeout.
    #[arg(long = "off-timeout-ms", value_name = "MS")]
    pub off_timeout_ms: Option<u64>,

    /// Override the storage root holding the cache and reject partitions.
    #[arg(long = "storage-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub storage_root: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct TopicOverrides {
    /// Override the topic inbound bar codes are read from.
    #[arg(long = "source-topic", value_name = "TOPIC")]
    pub source_topic: Option<String>,

    /// Override the topic totals are published to.
    #[arg(long = "destination-topic", value_name = "TOPIC")]
    pub destination_topic: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub lookup: LookupOverrides,

    #[command(flatten)]
    pub topics: TopicOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub lookup: LookupOverrides,

    #[command(flatten)]
    pub topics: TopicOverrides,

    /// Override the ingress listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the ingress listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,
}

#[derive(Debug, Args, Clone)]
pub struct LookupArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub lookup: LookupOverrides,

    /// Bar code to resolve.
    #[arg(value_name = "BARCODE")]
    pub bar_code: String,
}

#[derive(Debug, Args, Clone)]
pub struct WriteConfigArgs {
    /// Destination file.
    #[arg(
        value_name = "FILE",
        value_hint = ValueHint::FilePath,
        default_value = "caloriecounter.toml"
    )]
    pub file: PathBuf,

    /// Replace the file if it already exists.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub force: bool,
}
