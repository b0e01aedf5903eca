//! Statistic model produced by the analysis engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on the number of most frequent values kept per column.
pub const MAX_TOP_VALUES: usize = 10;

/// Semantic type assigned to a column before its statistics are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataTypeTag {
    Numeric,
    Categorical,
    Boolean,
    Datetime,
    Text,
    Unknown,
}

impl DataTypeTag {
    /// All tags in display order.
    pub const ALL: [DataTypeTag; 6] = [
        DataTypeTag::Numeric,
        DataTypeTag::Categorical,
        DataTypeTag::Boolean,
        DataTypeTag::Datetime,
        DataTypeTag::Text,
        DataTypeTag::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataTypeTag::Numeric => "numeric",
            DataTypeTag::Categorical => "categorical",
            DataTypeTag::Boolean => "boolean",
            DataTypeTag::Datetime => "datetime",
            DataTypeTag::Text => "text",
            DataTypeTag::Unknown => "unknown",
        }
    }

    /// Whether distinct counts and top values are reported for this tag.
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            DataTypeTag::Categorical | DataTypeTag::Boolean | DataTypeTag::Text
        )
    }
}

impl fmt::Display for DataTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: String,
    pub frequency: u64,
}

impl ValueFrequency {
    pub fn new(value: impl Into<String>, frequency: u64) -> Self {
        Self {
            value: value.into(),
            frequency,
        }
    }
}

/// Summary of one column.
///
/// `count + missing_count` equals the dataset's row count. Numeric fields are
/// only present for numeric columns with at least one present value;
/// `distinct_count` and `top_values` only for categorical, boolean and text
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub column_name: String,
    pub dtype: DataTypeTag,
    pub count: u64,
    pub missing_count: u64,
    pub mean_val: Option<f64>,
    /// Population standard deviation.
    pub std_val: Option<f64>,
    pub min_val: Option<f64>,
    pub max_val: Option<f64>,
    pub lower_quartile: Option<f64>,
    pub median: Option<f64>,
    pub upper_quartile: Option<f64>,
    pub distinct_count: Option<u64>,
    /// Most frequent values, frequency descending, ties in first-seen order.
    pub top_values: Option<Vec<ValueFrequency>>,
}

impl ColumnStatistics {
    /// Creates statistics carrying only the counts.
    pub fn counts_only(
        column_name: impl Into<String>,
        dtype: DataTypeTag,
        count: u64,
        missing_count: u64,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            dtype,
            count,
            missing_count,
            mean_val: None,
            std_val: None,
            min_val: None,
            max_val: None,
            lower_quartile: None,
            median: None,
            upper_quartile: None,
            distinct_count: None,
            top_values: None,
        }
    }

    /// Rows covered by this entry.
    pub fn total_rows(&self) -> u64 {
        self.count + self.missing_count
    }

    /// Share of missing values in `[0, 1]`, zero for an empty dataset.
    pub fn missing_ratio(&self) -> f64 {
        let total = self.total_rows();
        if total == 0 {
            0.0
        } else {
            self.missing_count as f64 / total as f64
        }
    }

    /// Whether any numeric summary field is populated.
    pub fn has_numeric_summary(&self) -> bool {
        self.mean_val.is_some()
    }
}

/// A column whose analysis failed and was recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    pub column: String,
    pub message: String,
}

/// Output of a full analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub row_count: u64,
    /// One entry per column, in source column order.
    pub statistics: Vec<ColumnStatistics>,
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisReport {
    pub fn new(row_count: u64) -> Self {
        Self {
            row_count,
            statistics: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Looks up the statistics of a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.statistics.iter().find(|s| s.column_name == name)
    }

    pub fn column_count(&self) -> usize {
        self.statistics.len()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_only_has_no_optional_fields() {
        let stats = ColumnStatistics::counts_only("when", DataTypeTag::Datetime, 4, 1);
        assert_eq!(stats.total_rows(), 5);
        assert!(!stats.has_numeric_summary());
        assert!(stats.distinct_count.is_none());
        assert!(stats.top_values.is_none());
        assert!((stats.missing_ratio() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_ratio_of_empty_dataset() {
        let stats = ColumnStatistics::counts_only("x", DataTypeTag::Unknown, 0, 0);
        assert_eq!(stats.missing_ratio(), 0.0);
    }

    #[test]
    fn test_dtype_serializes_lowercase() {
        let json = serde_json::to_string(&DataTypeTag::Categorical).unwrap();
        assert_eq!(json, "\"categorical\"");
        let tag: DataTypeTag = serde_json::from_str("\"datetime\"").unwrap();
        assert_eq!(tag, DataTypeTag::Datetime);
    }

    #[test]
    fn test_report_lookup() {
        let mut report = AnalysisReport::new(3);
        report
            .statistics
            .push(ColumnStatistics::counts_only("a", DataTypeTag::Text, 3, 0));
        assert!(report.column("a").is_some());
        assert!(report.column("b").is_none());
        assert_eq!(report.column_count(), 1);
        assert!(!report.has_warnings());
    }
}
