//! CLI module for apivault
//!
//! A thin adapter over [`crate::vault::ApiVault`]: arguments become a
//! [`crate::vault::VaultRequest`], the response is one JSON object on stdout.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, run, run_command, to_request};
pub use errors::{CliError, CliResult};
pub use io::{read_spec_file, write_error, write_response};
