//! Column analysis: type classification and per-column statistics.
//!
//! ## Type classification
//!
//! Every column gets exactly one [`DataTypeTag`]. Numeric, boolean and
//! temporal storage types map directly. String columns are sampled and the
//! sample decides between datetime, boolean, numeric, categorical and text.
//! `1`/`0` are treated as numbers, never as booleans.
//!
//! ## Statistics
//!
//! [`TabularAnalysis`] asks a [`Backend`](crate::backends::Backend) for one
//! [`ColumnStatistics`] per column:
//!
//! - numeric columns carry mean, population standard deviation, min, max and
//!   quartiles over non-missing values
//! - categorical, boolean and text columns carry the distinct count and, below
//!   the cardinality threshold, up to ten most frequent values
//! - every column carries `count` and `missing_count`, which always add up to
//!   the dataset's row count
//!
//! A column that cannot be analysed is reported as `unknown` with a warning
//! instead of failing the whole run.

pub mod classify;
pub mod errors;
pub mod tabular;
pub mod types;

pub use classify::{classify_storage, StorageClass, ValueClassifier};
pub use errors::{AnalyzerError, AnalyzerResult};
pub use tabular::{Analysis, AnalysisConfig, TabularAnalysis, TabularAnalysisBuilder};
pub use types::{
    AnalysisReport, AnalysisWarning, ColumnStatistics, DataTypeTag, ValueFrequency,
    MAX_TOP_VALUES,
};
