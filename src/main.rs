//! apivault CLI entry point
//!
//! Parses arguments and dispatches via `cli::run`. The JSON response has
//! already been written to stdout; failures also go to stderr and exit
//! non-zero.

use apivault::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
