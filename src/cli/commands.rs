//! CLI command implementations
//!
//! Commands are thin: each one is translated into a [`VaultRequest`] and
//! executed by the library. Only `init` and reading spec files happen here.

use std::fs;

use serde_json::{json, Value};

use crate::audit::{AuditEventKind, AuditQuery};
use crate::config::VaultConfig;
use crate::ids::{ApiId, VersionTag};
use crate::lock::LOCK_DIR;
use crate::vault::{ApiVault, CreateApi, CreateVersion, VaultRequest, VersionSource};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_spec_file, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments, runs the command and writes exactly one JSON response.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(&cli) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), &e.message())?;
            Err(e)
        }
    }
}

/// Run one command and return its response payload
pub fn run_command(cli: &Cli) -> CliResult<Value> {
    let config = VaultConfig::load(&cli.config)?;

    if let Command::Init = cli.command {
        return init(&config);
    }
    if !config.data_path().is_dir() {
        return Err(CliError::config_error(format!(
            "Data directory {} does not exist. Run 'apivault init' first.",
            config.data_path().display()
        )));
    }

    let request = to_request(&cli.command, &cli.actor)?;
    let vault = ApiVault::open(&config);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::io_error(format!("Failed to create tokio runtime: {}", e)))?;
    Ok(rt.block_on(vault.execute(request))?)
}

/// Create the data directory and the lock directory inside it
pub fn init(config: &VaultConfig) -> CliResult<Value> {
    let data_dir = config.data_path();
    let lock_dir = data_dir.join(LOCK_DIR);
    fs::create_dir_all(&lock_dir).map_err(|e| {
        CliError::config_error(format!("Failed to create directory {:?}: {}", lock_dir, e))
    })?;
    Ok(json!({
        "initialized": true,
        "data_dir": data_dir.display().to_string(),
    }))
}

fn api_id(raw: &str) -> CliResult<ApiId> {
    ApiId::new(raw).map_err(|e| CliError::usage(e.to_string()))
}

fn version_tag(raw: &str) -> CliResult<VersionTag> {
    VersionTag::new(raw).map_err(|e| CliError::usage(e.to_string()))
}

fn optional_tag(raw: Option<&String>) -> CliResult<Option<VersionTag>> {
    raw.map(|v| version_tag(v)).transpose()
}

/// Translate parsed arguments into a vault request
pub fn to_request(command: &Command, actor: &str) -> CliResult<VaultRequest> {
    let actor = actor.to_string();
    Ok(match command {
        Command::Init => {
            return Err(CliError::usage("init is not a vault operation"));
        }
        Command::CreateApi {
            api_id: id,
            version,
            name,
            owner,
            description,
            file,
        } => VaultRequest::CreateApi(CreateApi {
            api_id: api_id(id)?,
            name: name.clone(),
            owner: owner.clone(),
            description: description.clone(),
            version: match version {
                Some(v) => version_tag(v)?,
                None => VersionTag::timestamp_now(),
            },
            spec: read_spec_file(file)?,
            format: None,
            actor,
        }),
        Command::Import {
            api_id: id,
            version,
            file,
            from,
            description,
            current,
        } => {
            let from = optional_tag(from.as_ref())?;
            let source = match (file, from) {
                (Some(file), parent) => VersionSource::Content {
                    spec: read_spec_file(file)?,
                    parent,
                },
                (None, Some(from)) => VersionSource::Copy { from },
                (None, None) => {
                    return Err(CliError::usage("import needs --file, --from, or both"));
                }
            };
            VaultRequest::CreateVersion(CreateVersion {
                api_id: api_id(id)?,
                version: version_tag(version)?,
                source,
                actor,
                description: description.clone(),
                make_current: *current,
                format: None,
            })
        }
        Command::Versions { api_id: None } => VaultRequest::ListApis,
        Command::Versions { api_id: Some(id) } => VaultRequest::ListVersions {
            api_id: api_id(id)?,
        },
        Command::Show { api_id: id, version } => VaultRequest::GetSpec {
            api_id: api_id(id)?,
            version: optional_tag(version.as_ref())?,
        },
        Command::SetCurrent {
            api_id: id,
            version,
            reason,
        } => VaultRequest::SetCurrent {
            api_id: api_id(id)?,
            version: version_tag(version)?,
            actor,
            reason: reason.clone(),
        },
        Command::SetStable {
            api_id: id,
            version,
            reason,
        } => VaultRequest::SetStable {
            api_id: api_id(id)?,
            version: version_tag(version)?,
            actor,
            reason: reason.clone(),
        },
        Command::DeleteVersion {
            api_id: id,
            version,
            reason,
        } => VaultRequest::DeleteVersion {
            api_id: api_id(id)?,
            version: version_tag(version)?,
            actor,
            reason: reason.clone(),
        },
        Command::Diff { api_id: id, from, to } => VaultRequest::Compare {
            api_id: api_id(id)?,
            from: version_tag(from)?,
            to: version_tag(to)?,
        },
        Command::Audit {
            api_id: id,
            version,
            kind,
            by,
            limit,
        } => VaultRequest::AuditLog {
            api_id: api_id(id)?,
            query: AuditQuery {
                version: optional_tag(version.as_ref())?,
                kind: kind.as_deref().map(AuditEventKind::from),
                actor: by.clone(),
                since: None,
                until: None,
                limit: *limit,
            },
        },
        Command::Lineage { api_id: id, version } => VaultRequest::Lineage {
            api_id: api_id(id)?,
            version: version_tag(version)?,
        },
        Command::Validate { api_id: id, version } => VaultRequest::Validate {
            api_id: api_id(id)?,
            version: version_tag(version)?,
            actor,
        },
    })
}
