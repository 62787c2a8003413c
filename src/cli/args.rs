//! CLI argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// apivault - versioned API specification store
#[derive(Parser, Debug)]
#[command(name = "apivault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./apivault.json")]
    pub config: PathBuf,

    /// Acting user recorded in the audit log
    #[arg(long, global = true, default_value = "cli")]
    pub actor: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data directory layout
    Init,

    /// Register a new API from a spec file
    CreateApi {
        api_id: String,
        /// First version tag; a timestamp tag when omitted
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        description: Option<String>,
        /// Spec file (.yaml, .yml or .json)
        #[arg(long)]
        file: PathBuf,
    },

    /// Add a version, from a spec file or by copying another version
    Import {
        api_id: String,
        version: String,
        /// Spec file; omit to copy `--from`
        #[arg(long)]
        file: Option<PathBuf>,
        /// Parent version
        #[arg(long)]
        from: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Make the new version current
        #[arg(long)]
        current: bool,
    },

    /// List registered APIs, or the versions of one
    Versions { api_id: Option<String> },

    /// Print a version's content (current version by default)
    Show {
        api_id: String,
        version: Option<String>,
    },

    /// Point `current` at a version
    SetCurrent {
        api_id: String,
        version: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Point `latest_stable` at a version
    SetStable {
        api_id: String,
        version: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Delete a version that is neither current nor latest stable
    DeleteVersion {
        api_id: String,
        version: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Structural diff between two versions
    Diff {
        api_id: String,
        from: String,
        to: String,
    },

    /// Audit trail, newest first
    Audit {
        api_id: String,
        #[arg(long)]
        version: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        by: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ancestors of a version, nearest first
    Lineage { api_id: String, version: String },

    /// Lint a version and record the result
    Validate { api_id: String, version: String },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
