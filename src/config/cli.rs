use std::path::PathBuf;

use clap::{
    ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser,
};

use crate::presentation::terminal::OutputFormat;

/// Command-line arguments for the chatlens binary.
#[derive(Debug, Parser)]
#[command(name = "chatlens", version, about = "Live chat template debugger")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CHATLENS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Follow a template live, re-rendering as the service reports changes.
    Watch(Box<WatchArgs>),
    /// Render a template once and print the annotated output.
    Render(RenderArgs),
    /// Print a list published by the service as JSON.
    List(ListArgs),
    /// Annotate a local file without contacting the service.
    Annotate(AnnotateArgs),
    /// Move chat templates in and out of tokenizer_config.json files.
    Template(TemplateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RemoteOverrides {
    /// Override the render service base URL.
    #[arg(long = "server", value_name = "URL", value_hint = ValueHint::Url)]
    pub base_url: Option<String>,

    /// Override the per-request timeout.
    #[arg(long = "request-timeout-seconds", value_name = "SECONDS")]
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub remote: RemoteOverrides,

    /// Override the delay before resubscribing to notifications.
    #[arg(long = "reconnect-delay-ms", value_name = "MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Override where the selection is persisted.
    #[arg(long = "state-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub state_file: Option<PathBuf>,

    /// Keep the selection in memory only.
    #[arg(long, action = ArgAction::SetTrue)]
    pub ephemeral: bool,

    /// Open this template on start.
    #[arg(long, value_name = "PATH")]
    pub file: Option<String>,

    /// Select this test case on start.
    #[arg(long = "test-case", value_name = "NAME")]
    pub test_case: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub remote: RemoteOverrides,

    /// Template path as listed by the service.
    #[arg(long, value_name = "PATH")]
    pub file: String,

    #[arg(long = "test-case", value_name = "NAME", default_value = "basic")]
    pub test_case: String,

    #[arg(
        long = "add-generation-prompt",
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value = "true"
    )]
    pub add_generation_prompt: bool,

    #[arg(
        long = "add-system-prompt",
        value_name = "BOOL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value = "false"
    )]
    pub add_system_prompt: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub remote: RemoteOverrides,

    #[arg(value_enum)]
    pub target: ListTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListTarget {
    Files,
    TestCases,
    Tokens,
}

#[derive(Debug, Args, Clone)]
pub struct AnnotateArgs {
    /// File to annotate; stdin when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: Option<PathBuf>,

    /// JSON object of token names to literal text.
    #[arg(long, value_name = "JSON_FILE", value_hint = ValueHint::FilePath)]
    pub vocabulary: Option<PathBuf>,

    /// Extra marker pattern, tried after the built-in ones. Repeatable.
    #[arg(long = "marker", value_name = "REGEX")]
    pub markers: Vec<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
    pub format: OutputFormat,
}

#[derive(Debug, Args, Clone)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum TemplateCommand {
    /// Copy chat_template out of a tokenizer_config.json.
    Extract(ExtractArgs),
    /// Write a template file into a tokenizer_config.json.
    Inject(InjectArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ExtractArgs {
    /// Path to tokenizer_config.json.
    #[arg(value_name = "CONFIG", value_hint = ValueHint::FilePath)]
    pub config: PathBuf,

    /// Output file (default: <templates dir>/<model>_template.jinja).
    #[arg(short, long, value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Override the templates directory.
    #[arg(long = "templates-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub templates_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct InjectArgs {
    #[arg(value_name = "TEMPLATE", value_hint = ValueHint::FilePath)]
    pub template: PathBuf,

    #[arg(value_name = "CONFIG", value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}
