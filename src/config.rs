//! Configuration file handling.
//!
//! This module handles loading `.issuetally.toml` files, the two built-in
//! aggregation presets, and merging CLI overrides on top of both.

use crate::cli::{IncidentArgs, OutputFormat, TallyArgs};
use crate::error::{TallyError, TallyResult};
use crate::servicedesk::{OrderBy, SortBy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".issuetally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregation policy.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,

    /// Service-desk API settings. Passwords are never read from here.
    #[serde(default)]
    pub service_desk: ServiceDeskConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default input document path.
    #[serde(default = "default_input")]
    pub input: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
        }
    }
}

fn default_input() -> String {
    "document.json".to_string()
}

/// Built-in aggregation policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Five countries, any year, missing fields are fatal.
    Strict,
    /// Six countries, 2024 only, missing fields fall back to defaults.
    Season2024,
}

/// Aggregation policy.
///
/// When the `[aggregation]` table is present but `required_year` is left
/// out, no year filter applies. Omitting the whole table yields the
/// `season2024` preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Observation values kept verbatim; anything else becomes `Undefined`.
    #[serde(default = "default_countries")]
    pub valid_countries: Vec<String>,

    /// Tracked month codes, in report order.
    #[serde(default = "default_months")]
    pub valid_months: Vec<String>,

    /// Only count versions dated in this year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_year: Option<String>,

    /// Treat absent `observation`/`type` keys as errors.
    #[serde(default)]
    pub strict: bool,

    /// `type` values counted as requirements.
    #[serde(default = "default_requirement_types")]
    pub requirement_types: Vec<String>,

    /// `type` values counted as bugs.
    #[serde(default = "default_bug_types")]
    pub bug_types: Vec<String>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Season2024)
    }
}

fn default_countries() -> Vec<String> {
    vec!["Ecuador", "Colombia", "Chile", "España", "Regional", "Venezuela"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_months() -> Vec<String> {
    vec!["05", "06", "07", "08", "09"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_requirement_types() -> Vec<String> {
    vec!["Requirement".to_string(), "Requerimiento".to_string()]
}

fn default_bug_types() -> Vec<String> {
    vec!["Bug".to_string(), "Defecto".to_string()]
}

impl AggregationConfig {
    /// Builds one of the built-in policies.
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Strict => Self {
                valid_countries: default_countries()
                    .into_iter()
                    .filter(|c| c != "Venezuela")
                    .collect(),
                valid_months: default_months(),
                required_year: None,
                strict: true,
                requirement_types: default_requirement_types(),
                bug_types: default_bug_types(),
            },
            Preset::Season2024 => Self {
                valid_countries: default_countries(),
                valid_months: default_months(),
                required_year: Some("2024".to_string()),
                strict: false,
                requirement_types: default_requirement_types(),
                bug_types: default_bug_types(),
            },
        }
    }

    /// `strict` or `lenient`.
    pub fn mode_name(&self) -> &'static str {
        if self.strict {
            "strict"
        } else {
            "lenient"
        }
    }

    /// Check that month codes and type labels are usable.
    pub fn validate(&self) -> TallyResult<()> {
        if self.valid_months.is_empty() {
            return Err(TallyError::Config(
                "at least one valid month is required".to_string(),
            ));
        }

        for month in &self.valid_months {
            let ok = month.len() == 2
                && month.chars().all(|c| c.is_ascii_digit())
                && matches!(month.parse::<u8>(), Ok(1..=12));
            if !ok {
                return Err(TallyError::Config(format!(
                    "invalid month code '{}': expected 01-12",
                    month
                )));
            }
        }

        if self.requirement_types.is_empty() || self.bug_types.is_empty() {
            return Err(TallyError::Config(
                "requirement_types and bug_types must not be empty".to_string(),
            ));
        }

        if let Some(label) = self
            .requirement_types
            .iter()
            .find(|t| self.bug_types.contains(*t))
        {
            return Err(TallyError::Config(format!(
                "type '{}' is listed as both requirement and bug",
                label
            )));
        }

        Ok(())
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Write the report here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Service-desk API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDeskConfig {
    /// Incident-listing endpoint.
    #[serde(default = "default_endpoint")]
    pub url: String,

    /// Basic-auth user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// View to list incidents from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<u64>,

    #[serde(default)]
    pub sort_by: SortBy,

    #[serde(default)]
    pub order_by: OrderBy,

    /// Opaque page cursor from a previous listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ServiceDeskConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint(),
            username: None,
            view_id: None,
            sort_by: SortBy::default(),
            order_by: OrderBy::default(),
            page_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    "https://mesadeservicios.degasa.com.ar/service-desk/api/incidents.details.by.view".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load `.issuetally.toml` from `dir`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let default_path = dir.join(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(&default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Pick the configuration for a run: the explicit path if given, else
    /// `.issuetally.toml` in `dir`, else built-in defaults.
    ///
    /// A config file that exists but fails to load is an error, never a
    /// silent fallback to defaults.
    pub fn resolve(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from: {}", path.display());
            return Self::load(path);
        }

        match Self::load_from_dir(dir)? {
            Some(config) => {
                info!("Loaded default config from {}", CONFIG_FILE_NAME);
                Ok(config)
            }
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Merge `tally` arguments into this configuration.
    ///
    /// A preset replaces the whole aggregation policy first; individual
    /// flags then override single fields.
    pub fn merge_with_tally_args(&mut self, args: &TallyArgs) {
        if let Some(preset) = args.preset {
            self.aggregation = AggregationConfig::from_preset(preset);
        }

        if let Some(ref input) = args.input {
            self.general.input = input.display().to_string();
        }
        if let Some(ref countries) = args.countries {
            self.aggregation.valid_countries = countries.clone();
        }
        if let Some(ref months) = args.months {
            self.aggregation.valid_months = months.clone();
        }

        if args.any_year {
            self.aggregation.required_year = None;
        } else if let Some(ref year) = args.year {
            self.aggregation.required_year = Some(year.clone());
        }

        if args.strict {
            self.aggregation.strict = true;
        } else if args.lenient {
            self.aggregation.strict = false;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref output) = args.output {
            self.report.output = Some(output.display().to_string());
        }
    }

    /// Merge `incidents` arguments into this configuration.
    pub fn merge_with_incident_args(&mut self, args: &IncidentArgs) {
        let desk = &mut self.service_desk;

        if let Some(ref url) = args.url {
            desk.url = url.clone();
        }
        if let Some(ref username) = args.username {
            desk.username = Some(username.clone());
        }
        if let Some(view_id) = args.view_id {
            desk.view_id = Some(view_id);
        }
        if let Some(sort_by) = args.sort_by {
            desk.sort_by = sort_by;
        }
        if let Some(order_by) = args.order_by {
            desk.order_by = order_by;
        }
        if let Some(ref page_key) = args.page_key {
            desk.page_key = Some(page_key.clone());
        }
        if let Some(timeout) = args.timeout {
            desk.timeout_seconds = timeout;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
