//! Pipeline configuration.
//!
//! [`DatasheetConfig`] is what the command line builds from its flags, or
//! reads from a JSON file:
//!
//! ```json
//! {
//!   "backend": "arrow",
//!   "sample_size": 500,
//!   "dataset_name": "Customers",
//!   "version": "2.0",
//!   "answers": {
//!     "motivation": { "Who created the dataset?": "The analytics team." }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::analyzers::tabular::AnalysisConfig;
use crate::backends::BackendKind;
use crate::error::{DatasheetError, Result};
use crate::template::render::DatasetMetadata;

/// Settings for one datasheet build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasheetConfig {
    /// Engine used to analyse the data (default: auto)
    pub backend: BackendKind,
    /// Values sampled to classify string columns (default: 1000)
    pub sample_size: usize,
    /// Columns with more distinct values omit top values (default: 1000)
    pub cardinality_threshold: u64,
    pub dataset_name: String,
    pub version: String,
    /// Date printed in the overview; omitted when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_on: Option<NaiveDate>,
    /// Answers written into a freshly generated template, keyed by section
    /// id and then question text
    pub answers: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for DatasheetConfig {
    fn default() -> Self {
        let analysis = AnalysisConfig::default();
        let metadata = DatasetMetadata::default();
        Self {
            backend: BackendKind::Auto,
            sample_size: analysis.sample_size,
            cardinality_threshold: analysis.cardinality_threshold,
            dataset_name: metadata.name,
            version: metadata.version,
            generated_on: None,
            answers: BTreeMap::new(),
        }
    }
}

impl DatasheetConfig {
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            ..Self::default()
        }
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_cardinality_threshold(mut self, threshold: u64) -> Self {
        self.cardinality_threshold = threshold;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.generated_on = Some(date);
        self
    }

    /// Adds a pre-filled answer.
    pub fn with_answer(
        mut self,
        section_id: impl Into<String>,
        question: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.answers
            .entry(section_id.into())
            .or_default()
            .insert(question.into(), text.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DatasheetError::configuration(format!(
                "cannot read config {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset_name.trim().is_empty() {
            return Err(DatasheetError::configuration("dataset_name cannot be empty"));
        }
        self.analysis_config().validate()?;
        Ok(())
    }

    /// Analysis settings derived from this configuration.
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            sample_size: self.sample_size,
            cardinality_threshold: self.cardinality_threshold,
            ..AnalysisConfig::default()
        }
    }

    /// Overview metadata derived from this configuration.
    pub fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            name: self.dataset_name.clone(),
            version: self.version.clone(),
            generated_on: self.generated_on,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DatasheetConfig::default();
        assert_eq!(config.backend, BackendKind::Auto);
        assert_eq!(config.sample_size, 1000);
        assert_eq!(config.cardinality_threshold, 1000);
        assert!(config.answers.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = DatasheetConfig::from_json(
            r#"{
                "backend": "datafusion",
                "dataset_name": "Customers",
                "generated_on": "2024-01-15",
                "answers": {"motivation": {"Who created the dataset?": "Us"}}
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::DataFusion);
        assert_eq!(config.sample_size, 1000);
        assert_eq!(config.version, "1.0");
        assert_eq!(config.generated_on, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(config.answers["motivation"]["Who created the dataset?"], "Us");

        let metadata = config.metadata();
        assert_eq!(metadata.name, "Customers");
        assert_eq!(metadata.generated_on, config.generated_on);
    }

    #[test]
    fn test_invalid_values() {
        let err = DatasheetConfig::from_json(r#"{"backend": "pandas"}"#).unwrap_err();
        assert!(matches!(err, DatasheetError::Serialization(_)));

        let err = DatasheetConfig::from_json(r#"{"sample_size": 0}"#).unwrap_err();
        assert!(err.to_string().contains("sample_size"));

        let err = DatasheetConfig::new("  ").validate().unwrap_err();
        assert!(matches!(err, DatasheetError::Configuration(_)));
    }

    #[test]
    fn test_builders() {
        let config = DatasheetConfig::new("People")
            .with_backend(BackendKind::Arrow)
            .with_version("3")
            .with_sample_size(20)
            .with_cardinality_threshold(5)
            .with_answer("uses", "Q", "A");
        let analysis = config.analysis_config();
        assert_eq!(analysis.sample_size, 20);
        assert_eq!(analysis.cardinality_threshold, 5);
        assert_eq!(config.answers["uses"]["Q"], "A");
    }
}
