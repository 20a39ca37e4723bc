//! Report generation.
//!
//! This module renders an aggregation table as console lines, JSON or
//! Markdown. Months are always emitted in the configured order.

use crate::models::{
    AggregationTable, CategoryTally, MonthTally, ReportMetadata, TallyReport,
};
use anyhow::Result;

const REQUIREMENTS_LABEL: &str = "Requerimientos";
const BUGS_LABEL: &str = "Bugs";

/// Render the console report, one entry per line.
///
/// Each month in `valid_months` gets a header, even when it has no entries.
pub fn format_report(table: &AggregationTable, valid_months: &[String]) -> Vec<String> {
    let mut lines = Vec::new();

    for month in valid_months {
        lines.push(format!("Month: {}", month));
        for (observation, counts) in table.categories(month) {
            lines.push(format!(
                "  {}: {}: {}, {}: {}",
                observation, REQUIREMENTS_LABEL, counts.requirements, BUGS_LABEL, counts.bugs
            ));
        }
    }

    lines
}

/// Generate the plain-text report.
pub fn generate_text_report(table: &AggregationTable, valid_months: &[String]) -> String {
    let mut output = format_report(table, valid_months).join("\n");
    output.push('\n');
    output
}

/// Build the serializable report for `valid_months`.
pub fn build_report(
    table: &AggregationTable,
    valid_months: &[String],
    metadata: ReportMetadata,
) -> TallyReport {
    let months = valid_months
        .iter()
        .map(|month| MonthTally {
            month: month.clone(),
            categories: table
                .categories(month)
                .map(|(observation, counts)| CategoryTally {
                    observation: observation.to_string(),
                    requirements: counts.requirements,
                    bugs: counts.bugs,
                })
                .collect(),
            totals: table.month_totals(month),
        })
        .collect();

    TallyReport { metadata, months }
}

/// Generate a JSON report.
pub fn generate_json_report(report: &TallyReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a Markdown report with one table per month.
pub fn generate_markdown_report(report: &TallyReport) -> String {
    let mut output = String::new();

    output.push_str("# Issue Tally\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    for month in &report.months {
        output.push_str(&generate_month_section(month));
    }

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Source:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Mode:** {}\n", metadata.mode));
    match metadata.required_year {
        Some(ref year) => section.push_str(&format!("- **Year:** {}\n", year)),
        None => section.push_str("- **Year:** any\n"),
    }
    section.push_str(&format!(
        "- **Versions:** {} read, {} outside tracked months, {} outside year\n",
        metadata.stats.records_seen, metadata.stats.skipped_by_month, metadata.stats.skipped_by_year
    ));
    section.push('\n');

    section
}

fn generate_month_section(month: &MonthTally) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "## Month {} ({} issues)\n\n",
        month.month,
        month.totals.total()
    ));

    if month.categories.is_empty() {
        section.push_str("No requirements or bugs recorded.\n\n");
        return section;
    }

    section.push_str(&format!("| Country | {} | {} |\n", REQUIREMENTS_LABEL, BUGS_LABEL));
    section.push_str("|:---|:---:|:---:|\n");
    for category in &month.categories {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            category.observation, category.requirements, category.bugs
        ));
    }
    section.push_str(&format!(
        "| **Total** | **{}** | **{}** |\n\n",
        month.totals.requirements, month.totals.bugs
    ));

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AggregationStats, IssueKind};
    use chrono::Utc;

    fn months(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    fn create_test_table() -> AggregationTable {
        let mut table = AggregationTable::new();
        table.entry_mut("06", "Chile").record(IssueKind::Bug);
        table.entry_mut("06", "Chile").record(IssueKind::Requirement);
        table.entry_mut("06", "Undefined").record(IssueKind::Bug);
        table.entry_mut("05", "Ecuador").record(IssueKind::Requirement);
        table
    }

    fn create_test_metadata() -> ReportMetadata {
        ReportMetadata {
            source: "document.json".to_string(),
            generated_at: Utc::now(),
            mode: "lenient".to_string(),
            required_year: Some("2024".to_string()),
            valid_months: months(&["05", "06", "07"]),
            valid_countries: vec!["Chile".to_string(), "Ecuador".to_string()],
            stats: AggregationStats {
                records_seen: 3,
                skipped_by_month: 1,
                ..AggregationStats::default()
            },
        }
    }

    #[test]
    fn test_format_report_follows_configured_month_order() {
        let table = create_test_table();
        let lines = format_report(&table, &months(&["07", "06", "05"]));

        assert_eq!(
            lines,
            vec![
                "Month: 07",
                "Month: 06",
                "  Chile: Requerimientos: 1, Bugs: 1",
                "  Undefined: Requerimientos: 0, Bugs: 1",
                "Month: 05",
                "  Ecuador: Requerimientos: 1, Bugs: 0",
            ]
        );
    }

    #[test]
    fn test_format_report_empty_table_keeps_headers() {
        let lines = format_report(&AggregationTable::new(), &months(&["05", "06"]));
        assert_eq!(lines, vec!["Month: 05", "Month: 06"]);
    }

    #[test]
    fn test_text_report_ends_with_newline() {
        let text = generate_text_report(&create_test_table(), &months(&["05"]));
        assert_eq!(text, "Month: 05\n  Ecuador: Requerimientos: 1, Bugs: 0\n");
    }

    #[test]
    fn test_build_report_includes_empty_months() {
        let report = build_report(
            &create_test_table(),
            &months(&["05", "06", "07"]),
            create_test_metadata(),
        );

        assert_eq!(report.months.len(), 3);
        assert_eq!(report.months[1].categories.len(), 2);
        assert_eq!(report.months[1].totals.bugs, 2);
        assert!(report.months[2].categories.is_empty());
    }

    #[test]
    fn test_generate_json_report() {
        let report = build_report(
            &create_test_table(),
            &months(&["05", "06"]),
            create_test_metadata(),
        );
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"required_year\": \"2024\""));
        assert!(json.contains("\"observation\": \"Chile\""));

        let parsed: TallyReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.months, report.months);
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = build_report(
            &create_test_table(),
            &months(&["05", "06", "07"]),
            create_test_metadata(),
        );
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# Issue Tally"));
        assert!(markdown.contains("## Month 06 (3 issues)"));
        assert!(markdown.contains("| Chile | 1 | 1 |"));
        assert!(markdown.contains("| **Total** | **1** | **2** |"));
        assert!(markdown.contains("No requirements or bugs recorded."));
        assert!(markdown.contains("- **Year:** 2024"));
    }
}
