//! Column type classification.
//!
//! Classification looks at the declared storage type first. Only string-like
//! columns are sampled: a sample is assigned the first of datetime, boolean
//! and numeric whose match share reaches the confidence threshold, and is
//! otherwise categorical or text depending on its number of distinct values.

use std::collections::HashSet;

use arrow::datatypes::DataType;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyzers::types::DataTypeTag;

/// How a column's declared storage type maps onto a semantic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageClass {
    /// The storage type alone determines the tag.
    Known(DataTypeTag),
    /// Values are strings and must be sampled.
    Textual,
    /// Nested, binary or otherwise unsupported storage.
    Unsupported,
}

/// Maps an Arrow storage type to a [`StorageClass`].
pub fn classify_storage(data_type: &DataType) -> StorageClass {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64
        | DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Decimal128(_, _)
        | DataType::Decimal256(_, _) => StorageClass::Known(DataTypeTag::Numeric),
        DataType::Boolean => StorageClass::Known(DataTypeTag::Boolean),
        DataType::Date32
        | DataType::Date64
        | DataType::Time32(_)
        | DataType::Time64(_)
        | DataType::Timestamp(_, _) => StorageClass::Known(DataTypeTag::Datetime),
        DataType::Null => StorageClass::Known(DataTypeTag::Unknown),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => StorageClass::Textual,
        DataType::Dictionary(_, value) => match classify_storage(value) {
            StorageClass::Textual => StorageClass::Textual,
            other => other,
        },
        _ => StorageClass::Unsupported,
    }
}

struct ValuePatterns {
    float: Regex,
    date_iso: Regex,
    date_us: Regex,
    date_eu: Regex,
    datetime_iso: Regex,
    time: Regex,
    boolean: Regex,
}

// Patterns are compile-time constants and known to be valid.
#[allow(clippy::expect_used)]
static PATTERNS: Lazy<ValuePatterns> = Lazy::new(|| ValuePatterns {
    float: Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("valid float regex"),
    date_iso: Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"),
    date_us: Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid date regex"),
    date_eu: Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{4}$").expect("valid date regex"),
    datetime_iso: Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$")
        .expect("valid datetime regex"),
    time: Regex::new(r"(?i)^\d{1,2}:\d{2}(:\d{2})?(\s?(AM|PM))?$").expect("valid time regex"),
    boolean: Regex::new(r"(?i)^(true|false|t|f|yes|no|y|n)$").expect("valid boolean regex"),
});

/// Match counts gathered over a sample.
#[derive(Debug, Default)]
pub struct SampleStats {
    pub present: usize,
    pub numeric_matches: usize,
    pub boolean_matches: usize,
    pub temporal_matches: usize,
    pub distinct: usize,
}

impl SampleStats {
    fn share(&self, matches: usize) -> f64 {
        if self.present == 0 {
            0.0
        } else {
            matches as f64 / self.present as f64
        }
    }
}

/// Classifies sampled string values.
#[derive(Debug, Clone)]
pub struct ValueClassifier {
    confidence: f64,
    categorical_threshold: usize,
}

impl ValueClassifier {
    pub fn new(confidence: f64, categorical_threshold: usize) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            categorical_threshold,
        }
    }

    /// Gathers match statistics. Blank values are ignored.
    pub fn sample_stats<S: AsRef<str>>(&self, samples: &[S]) -> SampleStats {
        let mut stats = SampleStats::default();
        let mut distinct = HashSet::new();

        for sample in samples {
            let value = sample.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            stats.present += 1;
            distinct.insert(value);

            if is_temporal(value) {
                stats.temporal_matches += 1;
            }
            if PATTERNS.boolean.is_match(value) {
                stats.boolean_matches += 1;
            }
            if PATTERNS.float.is_match(value) {
                stats.numeric_matches += 1;
            }
        }

        stats.distinct = distinct.len();
        stats
    }

    /// Assigns a tag to a sample of values.
    pub fn classify<S: AsRef<str>>(&self, samples: &[S]) -> DataTypeTag {
        let stats = self.sample_stats(samples);
        if stats.present == 0 {
            return DataTypeTag::Text;
        }

        let reaches = |matches: usize| stats.share(matches) + f64::EPSILON >= self.confidence;
        if reaches(stats.temporal_matches) {
            DataTypeTag::Datetime
        } else if reaches(stats.boolean_matches) {
            DataTypeTag::Boolean
        } else if reaches(stats.numeric_matches) {
            DataTypeTag::Numeric
        } else if stats.distinct <= self.categorical_threshold {
            DataTypeTag::Categorical
        } else {
            DataTypeTag::Text
        }
    }
}

fn is_temporal(value: &str) -> bool {
    PATTERNS.date_iso.is_match(value)
        || PATTERNS.date_us.is_match(value)
        || PATTERNS.date_eu.is_match(value)
        || PATTERNS.datetime_iso.is_match(value)
        || PATTERNS.time.is_match(value)
}
