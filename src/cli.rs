//! Command-line interface for consolectl
//!
//! The static surface (global options, resources, list/get/watch flags and
//! the bulk input flags) is declared with clap's derive API. Create, edit
//! and delete commands additionally get one flag per declared input field;
//! those are registered at runtime from the field descriptors by
//! [`command`], and read back through [`MatchesSource`].
//!
//! # Examples
//!
//! ```text
//! consolectl users list --range-start 51 --range-end 101
//! consolectl users create --email ann@example.com --role admin
//! consolectl devices create --from-file devices.csv --file-format csv --continue-on-error
//! consolectl policies edit pol-7 --priority 10
//! consolectl proxies delete --id px-3
//! ```

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Args, Command, CommandFactory, Parser, Subcommand};

use crate::bulk::{BulkOptions, InputSource};
use crate::error::InputError;
use crate::fields::{Field, FieldSource, Value, VarType};
use crate::models::{BulkModel, Device, IdRecord, Policy, Resource, User};
use crate::output::OutputFormat;
use crate::pagination::RangeArgs;

/// Main command-line interface structure for consolectl
#[derive(Parser, Debug)]
#[command(
    name = "consolectl",
    about = "Command-line client for the security-management console",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API key (otherwise CONSOLECTL_API_KEY or the config file)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Console base URL
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Items requested per page from listing endpoints
    #[arg(long, global = true)]
    pub page_size: Option<i64>,

    /// Request timeout in milliseconds
    #[arg(short = 't', long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Output format for results
    #[arg(short = 'o', long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug) when RUST_LOG is unset
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Persist --api-key, --base-url and --page-size to the user config file
    Configure,
    /// Show the effective configuration (API key masked)
    ConfigShow,
    /// User accounts
    #[command(subcommand)]
    Users(ModelCommand),
    /// Managed devices
    #[command(subcommand)]
    Devices(ModelCommand),
    /// Security policies
    #[command(subcommand)]
    Policies(ModelCommand),
    /// Proxy endpoints
    #[command(subcommand)]
    Proxies(ReadOnlyCommand),
}

impl Commands {
    /// Resource addressed by a resource subcommand
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Commands::Users(_) => Some(Resource::Users),
            Commands::Devices(_) => Some(Resource::Devices),
            Commands::Policies(_) => Some(Resource::Policies),
            Commands::Proxies(_) => Some(Resource::Proxies),
            _ => None,
        }
    }
}

/// Operations on resources that can be created and edited
#[derive(Subcommand, Debug)]
pub enum ModelCommand {
    /// List a range of objects
    List(ListArgs),
    /// Fetch one object by id
    Get { id: String },
    /// Create one object from flags, or many from a file
    Create(BulkArgs),
    /// Change fields of an existing object
    Edit { id: String },
    /// Delete one object by id, or many from a file
    Delete(BulkArgs),
    /// Print objects as they appear
    Watch(WatchArgs),
}

/// Operations on resources that cannot be created from the CLI
#[derive(Subcommand, Debug)]
pub enum ReadOnlyCommand {
    /// List a range of objects
    List(ListArgs),
    /// Fetch one object by id
    Get { id: String },
    /// Delete one object by id, or many from a file
    Delete(BulkArgs),
    /// Print objects as they appear
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// First item to return, 1-based [default: 1]
    #[arg(long, allow_negative_numbers = true)]
    pub range_start: Option<i64>,

    /// Item to stop before; 0 for the end of the data [default: start + 50]
    #[arg(long, allow_negative_numbers = true)]
    pub range_end: Option<i64>,

    /// Return every item
    #[arg(long)]
    pub list_all: bool,
}

impl ListArgs {
    pub fn range(&self) -> RangeArgs {
        RangeArgs::new(self.range_start, self.range_end, self.list_all)
    }
}

#[derive(Args, Debug, Clone)]
pub struct BulkArgs {
    /// Read records from a file instead of flags
    #[arg(short = 'f', long, value_name = "PATH")]
    pub from_file: Option<PathBuf>,

    /// Format of --from-file: json or csv
    #[arg(short = 'i', long, default_value = "json")]
    pub file_format: String,

    /// Keep going when a record fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Print failures only
    #[arg(long)]
    pub errors_only: bool,
}

impl BulkArgs {
    pub fn source(&self) -> Result<InputSource, InputError> {
        InputSource::from_args(self.from_file.as_deref(), &self.file_format)
    }

    pub fn options(&self) -> BulkOptions {
        BulkOptions {
            continue_on_error: self.continue_on_error,
            errors_only: self.errors_only,
            multi: true,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Seconds between polls
    #[arg(long, default_value = "10")]
    pub interval_secs: u64,
}

/// Full command definition including the per-field flags
pub fn command() -> Command {
    let mut cmd = Cli::command();
    for resource in ["users", "devices", "policies", "proxies"] {
        cmd = cmd.mut_subcommand(resource, |sub| {
            sub.mut_subcommand("delete", |c| with_field_args(c, &IdRecord::fields()))
        });
    }
    cmd.mut_subcommand("users", with_model_args::<User>)
        .mut_subcommand("devices", with_model_args::<Device>)
        .mut_subcommand("policies", with_model_args::<Policy>)
}

fn with_model_args<M: BulkModel>(cmd: Command) -> Command {
    let fields = M::fields();
    cmd.mut_subcommand("create", |c| with_field_args(c, &fields))
        .mut_subcommand("edit", |c| with_field_args(c, &fields))
}

/// Adds one optional flag per field to `cmd`
pub fn with_field_args(cmd: Command, fields: &[Field]) -> Command {
    cmd.args(fields.iter().map(field_arg))
}

fn field_arg(field: &Field) -> Arg {
    let arg = Arg::new(field.name)
        .long(field.name.replace('_', "-"))
        .help(field.help)
        .required(false);

    match field.var_type() {
        VarType::Bool => arg
            .value_name("BOOL")
            .num_args(0..=1)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new()),
        VarType::Int => arg.value_name("N").value_parser(value_parser!(i64)),
        VarType::Str => arg.value_name("TEXT"),
        VarType::IntList => arg
            .value_name("N,...")
            .action(ArgAction::Append)
            .value_delimiter(',')
            .value_parser(value_parser!(i64)),
        VarType::StrList => arg
            .value_name("TEXT,...")
            .action(ArgAction::Append)
            .value_delimiter(','),
    }
}

/// Innermost subcommand matches, where the per-field flags live
pub fn leaf_matches(matches: &ArgMatches) -> &ArgMatches {
    match matches.subcommand() {
        Some((_, sub)) => leaf_matches(sub),
        None => matches,
    }
}

/// Field values given explicitly on the command line
pub struct MatchesSource<'a> {
    matches: &'a ArgMatches,
}

impl<'a> MatchesSource<'a> {
    pub fn new(matches: &'a ArgMatches) -> Self {
        Self { matches }
    }
}

impl FieldSource for MatchesSource<'_> {
    fn explicit(&self, field: &Field) -> Option<Value> {
        let id = field.name;
        if self.matches.value_source(id) != Some(ValueSource::CommandLine) {
            return None;
        }
        match field.var_type() {
            VarType::Bool => self.matches.get_one::<bool>(id).copied().map(Value::Bool),
            VarType::Int => self.matches.get_one::<i64>(id).copied().map(Value::Int),
            VarType::Str => self.matches.get_one::<String>(id).cloned().map(Value::Str),
            VarType::IntList => self
                .matches
                .get_many::<i64>(id)
                .map(|values| Value::IntList(values.copied().collect())),
            VarType::StrList => self
                .matches
                .get_many::<String>(id)
                .map(|values| Value::StrList(values.cloned().collect())),
        }
    }
}
