//! Data models for the tally tool.
//!
//! This module contains the input document structures, the aggregation
//! table built from them, the service-desk incident shape, and the
//! serializable report.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Observation label used for absent or unrecognized countries.
pub const UNDEFINED_OBSERVATION: &str = "Undefined";

/// Type label substituted for an absent `type` in lenient mode. Never counted.
pub const NO_TYPE: &str = "No-type";

/// Top-level export document: `{"data": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionDocument {
    /// Version records in export order.
    pub data: Vec<VersionRecord>,
}

/// One release/version entry.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionRecord {
    /// Release date as `DD/MM/YYYY`.
    pub date: String,
    /// Issues shipped in this version.
    pub details: Vec<DetailRecord>,
}

/// One issue within a version.
///
/// Both fields distinguish a missing key (`None`) from an explicit JSON
/// `null` (`Some(None)`); only the former counts as structurally absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DetailRecord {
    #[serde(default, deserialize_with = "present")]
    pub observation: Option<Option<String>>,

    #[serde(rename = "type", default, deserialize_with = "present")]
    pub issue_type: Option<Option<String>>,
}

impl DetailRecord {
    /// Creates a detail with both fields present.
    #[cfg(test)]
    pub fn new(observation: &str, issue_type: &str) -> Self {
        Self {
            observation: Some(Some(observation.to_string())),
            issue_type: Some(Some(issue_type.to_string())),
        }
    }
}

/// Marks a key as present, keeping `null` distinguishable from absence.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// The two counted issue kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    Requirement,
    Bug,
}

/// Per month/observation tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub requirements: u64,
    pub bugs: u64,
}

impl CountEntry {
    /// Increments the counter for `kind`.
    pub fn record(&mut self, kind: IssueKind) {
        match kind {
            IssueKind::Requirement => self.requirements += 1,
            IssueKind::Bug => self.bugs += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.requirements + self.bugs
    }
}

impl std::ops::AddAssign for CountEntry {
    fn add_assign(&mut self, other: Self) {
        self.requirements += other.requirements;
        self.bugs += other.bugs;
    }
}

/// Month code → observation → counts.
///
/// Inner maps keep first-seen order. Pairs never recorded are absent and
/// read back as zero through [`AggregationTable::count`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationTable {
    months: IndexMap<String, IndexMap<String, CountEntry>>,
}

impl AggregationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `month`/`observation`, inserting a zero entry
    /// first when the pair has not been seen.
    pub fn entry_mut(&mut self, month: &str, observation: &str) -> &mut CountEntry {
        self.months
            .entry(month.to_string())
            .or_default()
            .entry(observation.to_string())
            .or_default()
    }

    /// Returns the entry if the pair was recorded.
    pub fn get(&self, month: &str, observation: &str) -> Option<&CountEntry> {
        self.months.get(month)?.get(observation)
    }

    /// Returns the counts for a pair, zero when absent.
    #[allow(dead_code)] // Point lookup; reports iterate categories instead
    pub fn count(&self, month: &str, observation: &str) -> CountEntry {
        self.get(month, observation).copied().unwrap_or_default()
    }

    /// Observations recorded for `month`, in first-seen order.
    pub fn categories<'a>(
        &'a self,
        month: &str,
    ) -> impl Iterator<Item = (&'a str, &'a CountEntry)> + 'a {
        self.months
            .get(month)
            .into_iter()
            .flat_map(|inner| inner.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Sum of all observations for `month`.
    pub fn month_totals(&self, month: &str) -> CountEntry {
        let mut totals = CountEntry::default();
        for (_, entry) in self.categories(month) {
            totals += *entry;
        }
        totals
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }
}

/// Counters describing one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationStats {
    /// Version records read from the document.
    pub records_seen: usize,
    /// Records dropped because their month is not tracked.
    pub skipped_by_month: usize,
    /// Records dropped by the year filter.
    pub skipped_by_year: usize,
    /// Details that incremented a counter.
    pub details_counted: usize,
    /// Details in accepted records whose type is not counted.
    pub details_ignored: usize,
}

/// Incident identifier as returned by the service desk (numeric or text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncidentId {
    Number(i64),
    Text(String),
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentId::Number(n) => write!(f, "{}", n),
            IncidentId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One incident from the service-desk view listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub title: String,
}

/// Metadata about a tally report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Path of the input document.
    pub source: String,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// `strict` or `lenient`.
    pub mode: String,
    /// Year filter in effect, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_year: Option<String>,
    /// Tracked months, in report order.
    pub valid_months: Vec<String>,
    /// Recognized observation values.
    pub valid_countries: Vec<String>,
    /// Statistics from the aggregation pass.
    pub stats: AggregationStats,
}

/// Counts for one observation within a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub observation: String,
    pub requirements: u64,
    pub bugs: u64,
}

/// One month of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthTally {
    pub month: String,
    pub categories: Vec<CategoryTally>,
    pub totals: CountEntry,
}

/// The complete tally report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyReport {
    pub metadata: ReportMetadata,
    pub months: Vec<MonthTally>,
}
