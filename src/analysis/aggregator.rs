//! Month/observation aggregation of version exports.
//!
//! One pass over the document: versions are filtered by month and
//! optional year, then each detail's observation is normalized and its
//! type classified before the matching counter is bumped.

use crate::config::AggregationConfig;
use crate::error::{TallyError, TallyResult};
use crate::models::{
    AggregationStats, AggregationTable, DetailRecord, IssueKind, VersionDocument,
    NO_TYPE, UNDEFINED_OBSERVATION,
};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Month and year of a `DD/MM/YYYY` date, borrowed from the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParts<'a> {
    pub month: &'a str,
    pub year: &'a str,
}

/// Split a slash-separated date without validating the components.
/// The day is not used.
pub fn split_date(date: &str, index: usize) -> TallyResult<DateParts<'_>> {
    let mut parts = date.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(month), Some(year)) => Ok(DateParts { month, year }),
        _ => Err(TallyError::MalformedDate {
            date: date.to_string(),
            index,
        }),
    }
}

/// Read and parse an export document.
pub fn load_document(path: &Path) -> Result<VersionDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse document: {}", path.display()))
}

/// Build the month/observation table for `document`.
///
/// Any malformed date or (in strict mode) missing field aborts the run;
/// no partial table is returned.
pub fn aggregate(
    document: &VersionDocument,
    config: &AggregationConfig,
) -> TallyResult<AggregationTable> {
    aggregate_with_stats(document, config).map(|(table, _)| table)
}

/// Like [`aggregate`], also returning pass statistics.
pub fn aggregate_with_stats(
    document: &VersionDocument,
    config: &AggregationConfig,
) -> TallyResult<(AggregationTable, AggregationStats)> {
    let mut table = AggregationTable::new();
    let mut stats = AggregationStats::default();

    for (index, version) in document.data.iter().enumerate() {
        stats.records_seen += 1;
        let date = split_date(&version.date, index)?;

        if !config.valid_months.iter().any(|m| m == date.month) {
            debug!("Skipping version #{} ({}): month not tracked", index, version.date);
            stats.skipped_by_month += 1;
            continue;
        }

        if let Some(ref year) = config.required_year {
            if date.year != year {
                debug!("Skipping version #{} ({}): year != {}", index, version.date, year);
                stats.skipped_by_year += 1;
                continue;
            }
        }

        for (detail_index, detail) in version.details.iter().enumerate() {
            let observation = resolve_observation(detail, config, index, detail_index)?;
            let issue_type = resolve_type(detail, config, index, detail_index)?;

            match classify(issue_type, config) {
                Some(kind) => {
                    table.entry_mut(date.month, observation).record(kind);
                    stats.details_counted += 1;
                }
                None => stats.details_ignored += 1,
            }
        }
    }

    info!(
        "Aggregated {} versions: {} skipped by month, {} by year, {} details counted",
        stats.records_seen, stats.skipped_by_month, stats.skipped_by_year, stats.details_counted
    );

    Ok((table, stats))
}

/// Map an observation onto a recognized country or `Undefined`.
fn resolve_observation<'a>(
    detail: &'a DetailRecord,
    config: &AggregationConfig,
    version_index: usize,
    detail_index: usize,
) -> TallyResult<&'a str> {
    let value = match &detail.observation {
        Some(value) => value.as_deref(),
        None if config.strict => {
            return Err(TallyError::MissingField {
                field: "observation",
                version_index,
                detail_index,
            })
        }
        None => None,
    };

    Ok(match value {
        Some(country) if config.valid_countries.iter().any(|c| c == country) => country,
        _ => UNDEFINED_OBSERVATION,
    })
}

fn resolve_type<'a>(
    detail: &'a DetailRecord,
    config: &AggregationConfig,
    version_index: usize,
    detail_index: usize,
) -> TallyResult<Option<&'a str>> {
    match &detail.issue_type {
        Some(value) => Ok(value.as_deref()),
        None if config.strict => Err(TallyError::MissingField {
            field: "type",
            version_index,
            detail_index,
        }),
        None => Ok(Some(NO_TYPE)),
    }
}

/// Classify a resolved type label. Unknown and null labels are not counted.
fn classify(issue_type: Option<&str>, config: &AggregationConfig) -> Option<IssueKind> {
    let label = issue_type?;
    if config.requirement_types.iter().any(|t| t == label) {
        Some(IssueKind::Requirement)
    } else if config.bug_types.iter().any(|t| t == label) {
        Some(IssueKind::Bug)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preset;
    use crate::models::{CountEntry, VersionRecord};

    const FIXTURE: &str = include_str!("../../fixtures/document.json");

    fn parse(json: &str) -> VersionDocument {
        serde_json::from_str(json).unwrap()
    }

    fn version(date: &str, details: Vec<DetailRecord>) -> VersionRecord {
        VersionRecord {
            date: date.to_string(),
            details,
        }
    }

    fn counts(requirements: u64, bugs: u64) -> CountEntry {
        CountEntry { requirements, bugs }
    }

    fn season() -> AggregationConfig {
        AggregationConfig::from_preset(Preset::Season2024)
    }

    fn strict() -> AggregationConfig {
        AggregationConfig::from_preset(Preset::Strict)
    }

    #[test]
    fn test_split_date() {
        let parts = split_date("15/06/2024", 0).unwrap();
        assert_eq!(parts.month, "06");
        assert_eq!(parts.year, "2024");

        let extra = split_date("15/06/2024/x", 0).unwrap();
        assert_eq!(extra.year, "2024");

        assert!(matches!(
            split_date("15/06", 4),
            Err(TallyError::MalformedDate { index: 4, .. })
        ));
        assert!(split_date("", 0).is_err());
    }

    #[test]
    fn test_chile_peru_scenario() {
        let doc = parse(
            r#"{"data":[{"date":"15/06/2024","details":[
                {"observation":"Chile","type":"Bug"},
                {"observation":"Chile","type":"Requerimiento"},
                {"observation":"Peru","type":"Bug"}]}]}"#,
        );

        let table = aggregate(&doc, &season()).unwrap();

        assert_eq!(table.get("06", "Chile"), Some(&counts(1, 1)));
        assert_eq!(table.get("06", "Undefined"), Some(&counts(0, 1)));
        assert!(table.get("06", "Peru").is_none());
    }

    #[test]
    fn test_month_outside_range_contributes_nothing() {
        let doc = VersionDocument {
            data: vec![
                version("01/04/2024", vec![DetailRecord::new("Chile", "Bug")]),
                version("30/10/2024", vec![DetailRecord::new("Chile", "Requirement")]),
            ],
        };

        let (table, stats) = aggregate_with_stats(&doc, &season()).unwrap();

        assert!(table.is_empty());
        assert_eq!(stats.skipped_by_month, 2);
        assert_eq!(stats.details_counted, 0);
    }

    #[test]
    fn test_year_filter() {
        let doc = VersionDocument {
            data: vec![
                version("10/06/2023", vec![DetailRecord::new("Chile", "Bug")]),
                version("10/06/2024", vec![DetailRecord::new("Chile", "Bug")]),
            ],
        };

        let (table, stats) = aggregate_with_stats(&doc, &season()).unwrap();
        assert_eq!(table.count("06", "Chile"), counts(0, 1));
        assert_eq!(stats.skipped_by_year, 1);

        let any_year = aggregate(&doc, &strict()).unwrap();
        assert_eq!(any_year.count("06", "Chile"), counts(0, 2));
    }

    #[test]
    fn test_observation_normalization_is_case_sensitive() {
        let doc = VersionDocument {
            data: vec![version(
                "01/07/2024",
                vec![
                    DetailRecord::new("chile", "Bug"),
                    DetailRecord::new("Chile", "Bug"),
                    DetailRecord::new("España", "Requirement"),
                ],
            )],
        };

        let table = aggregate(&doc, &season()).unwrap();

        assert_eq!(table.count("07", "Undefined"), counts(0, 1));
        assert_eq!(table.count("07", "Chile"), counts(0, 1));
        assert_eq!(table.count("07", "España"), counts(1, 0));
    }

    #[test]
    fn test_venezuela_only_in_season_preset() {
        let doc = VersionDocument {
            data: vec![version("01/08/2024", vec![DetailRecord::new("Venezuela", "Bug")])],
        };

        let season_table = aggregate(&doc, &season()).unwrap();
        assert_eq!(season_table.count("08", "Venezuela"), counts(0, 1));

        let strict_table = aggregate(&doc, &strict()).unwrap();
        assert_eq!(strict_table.count("08", "Venezuela"), CountEntry::default());
        assert_eq!(strict_table.count("08", "Undefined"), counts(0, 1));
    }

    #[test]
    fn test_defecto_counts_as_bug() {
        let doc = parse(
            r#"{"data":[{"date":"01/06/2024","details":[
                {"observation":"Chile","type":"Defecto"},
                {"observation":"Chile","type":"Requerimiento"}]}]}"#,
        );

        let table = aggregate(&doc, &season()).unwrap();
        assert_eq!(table.count("06", "Chile"), counts(1, 1));

        let strict_table = aggregate(&doc, &strict()).unwrap();
        assert_eq!(strict_table.count("06", "Chile"), counts(1, 1));
    }

    #[test]
    fn test_uncounted_types_do_not_hide_siblings() {
        let doc = parse(
            r#"{"data":[{"date":"02/09/2024","details":[
                {"observation":"Ecuador","type":"Enhancement"},
                {"observation":"Ecuador"},
                {"observation":"Ecuador","type":"Bug"}]}]}"#,
        );

        let (table, stats) = aggregate_with_stats(&doc, &season()).unwrap();

        assert_eq!(table.count("09", "Ecuador"), counts(0, 1));
        assert_eq!(stats.details_ignored, 2);
    }

    #[test]
    fn test_uncounted_only_record_leaves_no_entry() {
        let doc = parse(
            r#"{"data":[{"date":"02/09/2024","details":[
                {"observation":"Ecuador","type":"Enhancement"}]}]}"#,
        );

        let table = aggregate(&doc, &season()).unwrap();
        assert!(table.get("09", "Ecuador").is_none());
    }

    #[test]
    fn test_lenient_defaults_missing_fields() {
        let doc = parse(r#"{"data":[{"date":"05/05/2024","details":[{"type":"Bug"}, {}]}]}"#);

        let table = aggregate(&doc, &season()).unwrap();
        assert_eq!(table.count("05", "Undefined"), counts(0, 1));
    }

    #[test]
    fn test_strict_rejects_missing_observation() {
        let doc = parse(
            r#"{"data":[
                {"date":"05/05/2024","details":[{"observation":"Chile","type":"Bug"}]},
                {"date":"06/06/2024","details":[{"type":"Bug"}]}]}"#,
        );

        let err = aggregate(&doc, &strict()).unwrap_err();
        assert!(matches!(
            err,
            TallyError::MissingField {
                field: "observation",
                version_index: 1,
                detail_index: 0
            }
        ));
    }

    #[test]
    fn test_strict_rejects_missing_type() {
        let doc = parse(r#"{"data":[{"date":"05/05/2024","details":[{"observation":"Chile"}]}]}"#);

        let err = aggregate(&doc, &strict()).unwrap_err();
        assert!(matches!(err, TallyError::MissingField { field: "type", .. }));
    }

    #[test]
    fn test_strict_accepts_null_values() {
        let doc = parse(
            r#"{"data":[{"date":"05/05/2024","details":[
                {"observation":null,"type":"Bug"},
                {"observation":"Chile","type":null}]}]}"#,
        );

        let table = aggregate(&doc, &strict()).unwrap();
        assert_eq!(table.count("05", "Undefined"), counts(0, 1));
        assert!(table.get("05", "Chile").is_none());
    }

    #[test]
    fn test_strict_skipped_records_are_not_checked() {
        let doc = parse(r#"{"data":[{"date":"05/11/2024","details":[{}]}]}"#);
        assert!(aggregate(&doc, &strict()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_date_aborts_run() {
        let doc = VersionDocument {
            data: vec![
                version("01/06/2024", vec![DetailRecord::new("Chile", "Bug")]),
                version("2024-06-01", vec![DetailRecord::new("Chile", "Bug")]),
            ],
        };

        let err = aggregate(&doc, &season()).unwrap_err();
        assert!(matches!(err, TallyError::MalformedDate { index: 1, .. }));
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let doc = parse(FIXTURE);
        let config = season();

        let first = aggregate_with_stats(&doc, &config).unwrap();
        let second = aggregate_with_stats(&doc, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fixture_totals() {
        let doc = parse(FIXTURE);
        let (table, stats) = aggregate_with_stats(&doc, &season()).unwrap();

        assert_eq!(stats.records_seen, 6);
        assert_eq!(stats.skipped_by_month, 2);
        assert_eq!(stats.skipped_by_year, 1);

        assert_eq!(table.count("05", "Ecuador"), counts(1, 1));
        assert_eq!(table.count("05", "Undefined"), counts(1, 0));
        assert_eq!(table.count("06", "Chile"), counts(1, 1));
        assert_eq!(table.count("06", "Undefined"), counts(0, 1));
        assert_eq!(table.count("09", "Venezuela"), counts(0, 1));

        let may: Vec<&str> = table.categories("05").map(|(k, _)| k).collect();
        assert_eq!(may, vec!["Ecuador", "Undefined"]);
    }

    #[test]
    fn test_counted_equals_sum_of_entries() {
        let doc = parse(FIXTURE);
        let config = season();
        let (table, stats) = aggregate_with_stats(&doc, &config).unwrap();

        let total: u64 = config
            .valid_months
            .iter()
            .map(|m| table.month_totals(m).total())
            .sum();
        assert_eq!(total, stats.details_counted as u64);
    }

    #[test]
    fn test_load_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("document.json");
        std::fs::write(&path, FIXTURE).unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.data.len(), 6);

        let missing = load_document(&dir.path().join("missing.json")).unwrap_err();
        assert!(format!("{:#}", missing).contains("Failed to read document"));
    }
}
