//! JSON output for the CLI
//!
//! Every command writes exactly one JSON object to stdout. Logs go to
//! stderr, so stdout stays machine-readable.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::spec::SpecFormat;
use crate::tree::SpecTree;

/// Read and decode a spec file, by extension or content probe
pub fn read_spec_file(path: &Path) -> CliResult<SpecTree> {
    let bytes = fs::read(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    SpecFormat::detect(name, &bytes)
        .decode(&bytes)
        .map_err(|e| CliError::usage(format!("{}: {}", path.display(), e)))
}

fn write_line(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}
