//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::Preset;
use crate::servicedesk::{OrderBy, SortBy};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// IssueTally - monthly requirement/bug tallies from version exports
///
/// Counts requirements and bugs per month and per country in a JSON
/// version export, and lists incidents from a service-desk view.
///
/// Examples:
///   issuetally tally document.json
///   issuetally tally document.json --preset strict
///   issuetally tally document.json --any-year --format json --output tally.json
///   issuetally incidents --view-id 123 --sort-by last-update --order-by desc
///   issuetally --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .issuetally.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .issuetally.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Tally requirements and bugs per month and country
    Tally(TallyArgs),
    /// List incidents from a service-desk view
    Incidents(IncidentArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct TallyArgs {
    /// JSON export with a top-level "data" array
    ///
    /// Defaults to the config's general.input (document.json)
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Start from a built-in aggregation policy
    #[arg(long, value_name = "PRESET")]
    pub preset: Option<Preset>,

    /// Countries kept verbatim (comma-separated)
    ///
    /// Example: --countries Chile,Ecuador
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub countries: Option<Vec<String>>,

    /// Tracked month codes in report order (comma-separated)
    ///
    /// Example: --months 05,06,07
    #[arg(long, value_name = "LIST", value_delimiter = ',')]
    pub months: Option<Vec<String>>,

    /// Only count versions dated in this year
    #[arg(long, value_name = "YEAR", conflicts_with = "any_year")]
    pub year: Option<String>,

    /// Disable the year filter
    #[arg(long, conflicts_with = "year")]
    pub any_year: bool,

    /// Fail when a detail lacks "observation" or "type"
    #[arg(long, conflicts_with = "lenient")]
    pub strict: bool,

    /// Default missing "observation"/"type" instead of failing
    #[arg(long, conflicts_with = "strict")]
    pub lenient: bool,

    /// Output format (text, json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct IncidentArgs {
    /// Incident-listing endpoint
    #[arg(long, value_name = "URL", env = "SERVICE_DESK_URL")]
    pub url: Option<String>,

    /// View to list incidents from
    #[arg(long, value_name = "ID")]
    pub view_id: Option<u64>,

    /// Sort field
    #[arg(long, value_name = "FIELD")]
    pub sort_by: Option<SortBy>,

    /// Sort direction
    #[arg(long, value_name = "DIR")]
    pub order_by: Option<OrderBy>,

    /// Page cursor from a previous listing
    #[arg(long, value_name = "KEY")]
    pub page_key: Option<String>,

    /// Basic-auth user name
    #[arg(long, value_name = "USER", env = "SERVICE_DESK_USER")]
    pub username: Option<String>,

    /// Basic-auth password (prefer the environment variable)
    #[arg(long, value_name = "PASSWORD", env = "SERVICE_DESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Output format for the tally report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain console lines (default)
    #[default]
    Text,
    /// JSON format
    Json,
    /// Markdown tables
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            None => Err("A command is required: tally or incidents".to_string()),
            Some(Command::Tally(_)) => Ok(()),
            Some(Command::Incidents(incidents)) => incidents.validate(),
        }
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

impl IncidentArgs {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref url) = self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Service-desk URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.view_id == Some(0) {
            return Err("View id must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }
}
