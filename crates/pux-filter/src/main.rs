//! filter-1pux - keep selected accounts and vaults of a 1Password export.
//!
//! Subcommands:
//! - `filter`: write a new export with only the selected vaults and the
//!   attachment files their items reference
//! - `inspect`: list accounts, vaults and archive diagnostics

use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use pux_filter::commands::{build_selection, run_filter, InspectReport};
use pux_filter::config::FilterConfig;
use pux_filter::exit_codes::ExitCode;
use pux_filter::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;

/// Filter a 1Password .1pux export down to selected accounts and vaults
#[derive(Parser)]
#[command(name = "filter-1pux")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log output format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Omit timestamps from human log lines
    #[arg(long, global = true)]
    no_log_timestamps: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a filtered copy of an export
    Filter(FilterArgs),

    /// Describe the accounts and vaults of an export
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Source .1pux archive
    input: PathBuf,

    /// Destination archive (must not exist)
    output: PathBuf,

    /// Keep a vault (name or uuid) in every account; `*` keeps all vaults
    #[arg(long = "vault", value_name = "NAME_OR_UUID")]
    vaults: Vec<String>,

    /// Keep a vault of one account (names or uuids); `*` matches anything
    #[arg(
        long = "account-vault",
        num_args = 2,
        value_names = ["ACCOUNT", "VAULT"],
        action = clap::ArgAction::Append
    )]
    account_vaults: Vec<String>,

    /// Attachment copy buffer size in bytes
    #[arg(long, value_name = "BYTES")]
    buffer_size: Option<usize>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Source .1pux archive
    input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = InspectFormat::Json)]
    format: InspectFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum InspectFormat {
    Json,
    Human,
}

// ============================================================================
// Main entry point
// ============================================================================

fn exit_on_parse_error(e: clap::Error) -> ! {
    let code = if e.use_stderr() {
        ExitCode::ArgsError
    } else {
        ExitCode::Clean
    };
    let _ = e.print();
    std::process::exit(code.as_i32());
}

fn main() {
    let matches = Cli::command()
        .try_get_matches()
        .unwrap_or_else(|e| exit_on_parse_error(e));
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| exit_on_parse_error(e));

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config = LogConfig::from_env(cli_level, cli.global.log_format)
        .with_timestamps(!cli.global.no_log_timestamps);
    init_logging(&log_config);

    let exit_code = match &cli.command {
        Commands::Filter(args) => {
            run_filter_command(args, matches.subcommand_matches("filter"))
        }
        Commands::Inspect(args) => run_inspect_command(args),
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

/// Pair each value of `id` with its position on the command line.
fn positioned(matches: Option<&ArgMatches>, id: &str, values: &[String]) -> Vec<(usize, String)> {
    let indices = matches
        .and_then(|m| m.indices_of(id))
        .map(|i| i.collect::<Vec<_>>())
        .unwrap_or_default();
    indices.into_iter().zip(values.iter().cloned()).collect()
}

fn run_filter_command(args: &FilterArgs, matches: Option<&ArgMatches>) -> ExitCode {
    let config = match FilterConfig::load(args.buffer_size) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::ArgsError;
        }
    };

    let selection = build_selection(
        &positioned(matches, "vaults", &args.vaults),
        &positioned(matches, "account_vaults", &args.account_vaults),
    );
    match run_filter(&args.input, &args.output, selection.as_ref(), &config) {
        Ok(report) => print_json(&report),
        Err(e) => {
            let code = ExitCode::from(&e);
            error!(kind = e.kind(), exit_code = %code, "Filter failed");
            eprintln!("error: {e}");
            code
        }
    }
}

fn run_inspect_command(args: &InspectArgs) -> ExitCode {
    match InspectReport::load(&args.input) {
        Ok(report) => match args.format {
            InspectFormat::Json => print_json(&report),
            InspectFormat::Human => {
                print!("{}", report.render_human());
                ExitCode::Clean
            }
        },
        Err(e) => {
            let code = ExitCode::from(&e);
            error!(kind = e.kind(), exit_code = %code, "Inspect failed");
            eprintln!("error: {e}");
            code
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("error: failed to serialize output: {e}");
            ExitCode::InternalError
        }
    }
}
