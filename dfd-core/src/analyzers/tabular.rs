//! Tabular analysis over any [`Backend`].
//!
//! Each column is classified, then summarised by the backend. A failing
//! column never aborts the run: it is reported with `dtype = unknown`, its
//! counts are recovered where possible and a warning is recorded.
//!
//! # Example
//!
//! ```rust
//! use dfd_core::analyzers::{Analysis, TabularAnalysis};
//! use dfd_core::backends::{ArrowBackend, Backend, DataSource};
//! use dfd_core::test_fixtures::people_table;
//!
//! let backend = ArrowBackend::new();
//! let dataset = backend.load(DataSource::arrow(people_table())).unwrap();
//!
//! let analysis = TabularAnalysis::builder()
//!     .sample_size(500)
//!     .cardinality_threshold(50)
//!     .build();
//! let report = analysis.analyse(&backend, &dataset).unwrap();
//! assert_eq!(report.statistics.len(), 2);
//! ```

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::analyzers::classify::{classify_storage, StorageClass, ValueClassifier};
use crate::analyzers::errors::{AnalyzerError, AnalyzerResult};
use crate::analyzers::types::{
    AnalysisReport, AnalysisWarning, ColumnStatistics, DataTypeTag, MAX_TOP_VALUES,
};
use crate::backends::{Backend, Dataset, SummaryRequest};
use crate::error::Result;
use crate::logging::truncate_field;

/// Configuration for tabular analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Non-missing values sampled to classify string columns (default: 1000)
    pub sample_size: usize,
    /// Columns with more distinct values only report the distinct count (default: 1000)
    pub cardinality_threshold: u64,
    /// Sampled string columns with at most this many distinct values are categorical (default: 100)
    pub categorical_threshold: usize,
    /// Share of sampled values that must match a type for it to be chosen (default: 1.0)
    pub type_confidence: f64,
    /// Number of most frequent values reported, capped at 10 (default: 10)
    pub top_k: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            cardinality_threshold: 1000,
            categorical_threshold: 100,
            type_confidence: 1.0,
            top_k: MAX_TOP_VALUES,
        }
    }
}

impl AnalysisConfig {
    /// Checks that the settings are usable.
    pub fn validate(&self) -> AnalyzerResult<()> {
        if self.sample_size == 0 {
            return Err(AnalyzerError::invalid_config("sample_size must be positive"));
        }
        // Zero would let every sample vote for the first type tried.
        if !(self.type_confidence > 0.0 && self.type_confidence <= 1.0) {
            return Err(AnalyzerError::invalid_config(format!(
                "type_confidence must be within (0, 1], got {}",
                self.type_confidence
            )));
        }
        Ok(())
    }
}

/// Builder for [`TabularAnalysis`].
pub struct TabularAnalysisBuilder {
    config: AnalysisConfig,
}

impl TabularAnalysisBuilder {
    /// Set the number of values sampled for classification
    pub fn sample_size(mut self, size: usize) -> Self {
        self.config.sample_size = size;
        self
    }

    /// Set the distinct-count limit above which top values are omitted
    pub fn cardinality_threshold(mut self, threshold: u64) -> Self {
        self.config.cardinality_threshold = threshold;
        self
    }

    /// Set the categorical versus text threshold
    pub fn categorical_threshold(mut self, threshold: usize) -> Self {
        self.config.categorical_threshold = threshold;
        self
    }

    /// Set the share of values that must match a type
    pub fn type_confidence(mut self, confidence: f64) -> Self {
        self.config.type_confidence = confidence;
        self
    }

    /// Set the number of top values reported
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TabularAnalysis {
        TabularAnalysis::with_config(self.config)
    }
}

/// An analysis over one data domain.
pub trait Analysis {
    /// Short name of the data domain.
    fn domain(&self) -> &'static str;

    /// Computes statistics for every column of the dataset.
    fn analyse(&self, backend: &dyn Backend, dataset: &Dataset) -> Result<AnalysisReport>;
}

/// Analysis of flat tables.
#[derive(Debug, Clone)]
pub struct TabularAnalysis {
    config: AnalysisConfig,
    classifier: ValueClassifier,
}

impl TabularAnalysis {
    pub fn builder() -> TabularAnalysisBuilder {
        TabularAnalysisBuilder {
            config: AnalysisConfig::default(),
        }
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(mut config: AnalysisConfig) -> Self {
        config.top_k = config.top_k.min(MAX_TOP_VALUES);
        let classifier =
            ValueClassifier::new(config.type_confidence, config.categorical_threshold);
        Self { config, classifier }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Chooses the semantic type of a column.
    pub fn classify_column(
        &self,
        backend: &dyn Backend,
        dataset: &Dataset,
        column: &str,
    ) -> AnalyzerResult<DataTypeTag> {
        let storage = backend.storage_type(dataset, column)?;
        match classify_storage(&storage) {
            StorageClass::Known(tag) => Ok(tag),
            StorageClass::Textual => {
                let samples = backend.sample_values(dataset, column, self.config.sample_size)?;
                let tag = self.classifier.classify(&samples);
                debug!(
                    column = column,
                    samples = samples.len(),
                    first = %truncate_field(samples.first().map(String::as_str).unwrap_or(""), 64),
                    dtype = %tag,
                    "Classified sampled column"
                );
                Ok(tag)
            }
            StorageClass::Unsupported => Err(AnalyzerError::unsupported_type(column, storage)),
        }
    }

    /// Classifies and summarises one column.
    #[instrument(skip(self, backend, dataset))]
    pub fn analyse_column(
        &self,
        backend: &dyn Backend,
        dataset: &Dataset,
        column: &str,
        row_count: u64,
    ) -> AnalyzerResult<ColumnStatistics> {
        let dtype = self.classify_column(backend, dataset, column)?;
        let request = SummaryRequest {
            dtype,
            cardinality_threshold: self.config.cardinality_threshold,
            top_k: self.config.top_k,
        };
        let stats = backend.summarize_column(dataset, column, &request)?;

        if stats.total_rows() != row_count {
            return Err(AnalyzerError::invalid_data(format!(
                "column '{column}' covers {} rows but the dataset has {row_count}",
                stats.total_rows()
            )));
        }
        Ok(stats)
    }

    /// Statistics for a column whose analysis failed.
    fn recover(
        &self,
        backend: &dyn Backend,
        dataset: &Dataset,
        column: &str,
        row_count: u64,
    ) -> ColumnStatistics {
        let missing = match backend.missing_count(dataset, column) {
            Ok(missing) if missing <= row_count => missing,
            _ => row_count,
        };
        ColumnStatistics::counts_only(column, DataTypeTag::Unknown, row_count - missing, missing)
    }
}

impl Default for TabularAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl Analysis for TabularAnalysis {
    fn domain(&self) -> &'static str {
        "tabular"
    }

    #[instrument(skip(self, backend, dataset), fields(engine = %backend.kind(), location = dataset.location()))]
    fn analyse(&self, backend: &dyn Backend, dataset: &Dataset) -> Result<AnalysisReport> {
        self.config.validate()?;
        let start = Instant::now();
        let columns = backend.columns(dataset)?;
        let row_count = backend.row_count(dataset)?;

        info!(
            columns = columns.len(),
            rows = row_count,
            sample_size = self.config.sample_size,
            "Starting tabular analysis"
        );

        let mut report = AnalysisReport::new(row_count);
        for column in &columns {
            match self.analyse_column(backend, dataset, column, row_count) {
                Ok(stats) => {
                    debug!(column = %column, dtype = %stats.dtype, count = stats.count, "Analysed column");
                    report.statistics.push(stats);
                }
                Err(e) => {
                    warn!(column = %column, error = %e, "Column analysis failed, reporting as unknown");
                    report
                        .statistics
                        .push(self.recover(backend, dataset, column, row_count));
                    report.warnings.push(AnalysisWarning {
                        column: column.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            columns = report.statistics.len(),
            warnings = report.warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Completed tabular analysis"
        );
        Ok(report)
    }
}
