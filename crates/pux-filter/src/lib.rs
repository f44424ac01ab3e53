//! Command-line front end for filtering 1Password `.1pux` exports.
//!
//! The `filter-1pux` binary turns command-line selection flags into a
//! [`pux_archive::SelectionSpec`], resolves runtime configuration, sets up
//! logging, and maps library errors onto stable exit codes. All archive
//! handling lives in `pux-archive`.

pub mod commands;
pub mod config;
pub mod exit_codes;
pub mod logging;

pub use commands::{build_selection, run_filter, FilterReport, InspectReport};
pub use config::{ConfigError, FilterConfig};
pub use exit_codes::ExitCode;
