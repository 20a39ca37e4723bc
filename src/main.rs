//! IssueTally - monthly requirement/bug tallies from version exports
//!
//! A CLI tool that counts requirements and bugs per month and per
//! country in a JSON version export, and lists incidents from a
//! service-desk view.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (bad input, config, transport, or a non-200 listing)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod servicedesk;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, IncidentArgs, OutputFormat, TallyArgs};
use config::Config;
use models::{AggregationTable, ReportMetadata};
use servicedesk::ServiceDeskClient;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("IssueTally v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args.command);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .issuetally.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  .issuetally.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .issuetally.toml")?;

    println!("✅ Created .issuetally.toml with default settings.");
    println!("   Edit it to customize countries, months, year filter, and the service desk.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr; stdout carries the report.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

async fn run(args: Args) -> Result<i32> {
    let config = load_config(&args)?;

    match args.command {
        Some(Command::Tally(tally)) => run_tally(config, &tally),
        Some(Command::Incidents(incidents)) => run_incidents(config, incidents).await,
        None => Ok(0),
    }
}

/// Aggregate the export and emit the report.
fn run_tally(mut config: Config, args: &TallyArgs) -> Result<i32> {
    config.merge_with_tally_args(args);
    config.aggregation.validate()?;

    let policy = &config.aggregation;
    let input = PathBuf::from(&config.general.input);
    info!(
        "Tallying {} ({} mode, year: {})",
        input.display(),
        policy.mode_name(),
        policy.required_year.as_deref().unwrap_or("any")
    );

    let document = analysis::load_document(&input)?;

    let output = match config.report.format {
        OutputFormat::Text => {
            let table = analysis::aggregate(&document, policy)?;
            warn_if_empty(&table);
            report::generate_text_report(&table, &policy.valid_months)
        }
        format => {
            let (table, stats) = analysis::aggregate_with_stats(&document, policy)?;
            warn_if_empty(&table);
            let metadata = ReportMetadata {
                source: input.display().to_string(),
                generated_at: Utc::now(),
                mode: policy.mode_name().to_string(),
                required_year: policy.required_year.clone(),
                valid_months: policy.valid_months.clone(),
                valid_countries: policy.valid_countries.clone(),
                stats,
            };
            let tally = report::build_report(&table, &policy.valid_months, metadata);
            if format == OutputFormat::Json {
                report::generate_json_report(&tally)?
            } else {
                report::generate_markdown_report(&tally)
            }
        }
    };

    match config.report.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path))?;
            info!("Report saved to {}", path);
        }
        None => print!("{}", output),
    }

    Ok(0)
}

fn warn_if_empty(table: &AggregationTable) {
    if table.is_empty() {
        warn!("No requirements or bugs matched the configured months and year");
    }
}

/// List incidents from the configured service-desk view.
async fn run_incidents(mut config: Config, args: IncidentArgs) -> Result<i32> {
    config.merge_with_incident_args(&args);

    let (client, query) = ServiceDeskClient::from_config(&config.service_desk, args.password)?;
    let result = client.list_incidents(&query).await;

    let mut stdout = std::io::stdout();
    servicedesk::write_listing(&mut stdout, result)
}

/// Load configuration from `--config`, `.issuetally.toml`, or defaults.
fn load_config(args: &Args) -> Result<Config> {
    Config::resolve(args.config.as_deref(), Path::new("."))
}
