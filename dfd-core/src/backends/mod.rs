//! Dataframe engine adapters.
//!
//! A [`Backend`] loads tabular data into a [`Dataset`] and computes per-column
//! summaries. Two engines are provided:
//!
//! - [`ArrowBackend`]: eager Arrow compute kernels over in-memory record
//!   batches. This is the faster, lower-memory engine and is preferred by
//!   automatic selection.
//! - [`DataFusionBackend`]: the DataFusion SQL engine, driven synchronously
//!   from a private current-thread runtime.
//!
//! Both produce identical [`ColumnStatistics`] for the same data, so the rest
//! of the pipeline never needs to know which engine ran.
//!
//! # Example
//!
//! ```rust,no_run
//! use dfd_core::backends::{resolve_backend, BackendKind, DataSource, EngineAvailability};
//!
//! # fn example() -> dfd_core::error::Result<()> {
//! let source = DataSource::path("data/customers.csv");
//! let backend = resolve_backend(BackendKind::Auto, &source, EngineAvailability::compiled())?;
//! let dataset = backend.load(source)?;
//! println!("{} rows", backend.row_count(&dataset)?);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use arrow::datatypes::{DataType, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::errors::{AnalyzerError, AnalyzerResult};
use crate::analyzers::types::{ColumnStatistics, DataTypeTag, MAX_TOP_VALUES};
use crate::error::{DatasheetError, Result};

#[cfg(feature = "arrow-backend")]
mod arrow_engine;
#[cfg(feature = "datafusion-backend")]
mod datafusion_engine;
pub mod numeric;

#[cfg(feature = "arrow-backend")]
pub use arrow_engine::ArrowBackend;
#[cfg(feature = "datafusion-backend")]
pub use datafusion_engine::DataFusionBackend;

/// Number of records read to infer the schema of a text file.
pub const SCHEMA_INFERENCE_RECORDS: usize = 100_000;

/// Label used in messages for data that did not come from a file.
pub(crate) const IN_MEMORY_LOCATION: &str = "<in-memory table>";

/// A concrete dataframe engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Arrow,
    DataFusion,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Arrow => "arrow",
            EngineKind::DataFusion => "datafusion",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine selector as configured by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Arrow,
    DataFusion,
    #[default]
    Auto,
}

impl BackendKind {
    /// The engine named explicitly, `None` for `auto`.
    pub fn engine(&self) -> Option<EngineKind> {
        match self {
            BackendKind::Arrow => Some(EngineKind::Arrow),
            BackendKind::DataFusion => Some(EngineKind::DataFusion),
            BackendKind::Auto => None,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.engine() {
            Some(engine) => fmt::Display::fmt(&engine, f),
            None => f.write_str("auto"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = DatasheetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arrow" => Ok(BackendKind::Arrow),
            "datafusion" => Ok(BackendKind::DataFusion),
            "auto" => Ok(BackendKind::Auto),
            other => Err(DatasheetError::configuration(format!(
                "unknown backend '{other}', expected one of: arrow, datafusion, auto"
            ))),
        }
    }
}

/// Which engines can be used at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineAvailability {
    pub arrow: bool,
    pub datafusion: bool,
}

impl EngineAvailability {
    /// The engines compiled into this build.
    pub fn compiled() -> Self {
        Self {
            arrow: cfg!(feature = "arrow-backend"),
            datafusion: cfg!(feature = "datafusion-backend"),
        }
    }

    pub fn none() -> Self {
        Self {
            arrow: false,
            datafusion: false,
        }
    }

    pub fn is_available(&self, engine: EngineKind) -> bool {
        match engine {
            EngineKind::Arrow => self.arrow,
            EngineKind::DataFusion => self.datafusion,
        }
    }
}

impl Default for EngineAvailability {
    fn default() -> Self {
        Self::compiled()
    }
}

/// On-disk formats both engines can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Tsv,
    Parquet,
    /// Newline-delimited JSON records.
    Json,
}

impl SourceFormat {
    /// Detects the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(SourceFormat::Csv),
            Some("tsv") => Ok(SourceFormat::Tsv),
            Some("parquet") => Ok(SourceFormat::Parquet),
            Some("json") => Ok(SourceFormat::Json),
            Some(other) => Err(DatasheetError::unsupported_source(
                path.display().to_string(),
                format!("unsupported file extension '.{other}', expected .csv, .tsv, .parquet or .json"),
            )),
            None => Err(DatasheetError::unsupported_source(
                path.display().to_string(),
                "file has no extension, expected .csv, .tsv, .parquet or .json",
            )),
        }
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            SourceFormat::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Record batches sharing one schema.
#[derive(Debug, Clone)]
pub struct ArrowTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl ArrowTable {
    /// Creates a table, checking that every batch matches the schema.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        if let Some(batch) = batches.iter().find(|b| b.schema().fields() != schema.fields()) {
            return Err(DatasheetError::unsupported_source(
                IN_MEMORY_LOCATION,
                format!(
                    "record batch schema {:?} does not match table schema {:?}",
                    batch.schema(),
                    schema
                ),
            ));
        }
        Ok(Self { schema, batches })
    }

    /// Creates a table from a single batch.
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

/// A table already held in memory by one of the engines.
#[derive(Debug, Clone)]
pub enum InMemoryTable {
    Arrow(ArrowTable),
    #[cfg(feature = "datafusion-backend")]
    DataFusion(datafusion::dataframe::DataFrame),
}

impl InMemoryTable {
    /// The engine this table belongs to.
    pub fn engine(&self) -> EngineKind {
        match self {
            InMemoryTable::Arrow(_) => EngineKind::Arrow,
            #[cfg(feature = "datafusion-backend")]
            InMemoryTable::DataFusion(_) => EngineKind::DataFusion,
        }
    }
}

/// Where the data to analyse comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    Path(PathBuf),
    Table(InMemoryTable),
}

impl DataSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        DataSource::Path(path.into())
    }

    pub fn arrow(table: ArrowTable) -> Self {
        DataSource::Table(InMemoryTable::Arrow(table))
    }

    #[cfg(feature = "datafusion-backend")]
    pub fn dataframe(frame: datafusion::dataframe::DataFrame) -> Self {
        DataSource::Table(InMemoryTable::DataFusion(frame))
    }

    /// Path or placeholder used in messages.
    pub fn location(&self) -> String {
        match self {
            DataSource::Path(path) => path.display().to_string(),
            DataSource::Table(_) => IN_MEMORY_LOCATION.to_string(),
        }
    }

    /// The engine an in-memory table belongs to.
    pub fn native_engine(&self) -> Option<EngineKind> {
        match self {
            DataSource::Path(_) => None,
            DataSource::Table(table) => Some(table.engine()),
        }
    }
}

/// Engine-specific loaded data.
#[derive(Debug, Clone)]
pub(crate) enum LoadedTable {
    Arrow(ArrowTable),
    #[cfg(feature = "datafusion-backend")]
    DataFusion(datafusion_engine::RegisteredTable),
}

/// Opaque handle to loaded tabular data, tagged with its engine.
#[derive(Debug, Clone)]
pub struct Dataset {
    location: String,
    schema: SchemaRef,
    table: LoadedTable,
}

impl Dataset {
    pub(crate) fn new(location: impl Into<String>, schema: SchemaRef, table: LoadedTable) -> Self {
        Self {
            location: location.into(),
            schema,
            table,
        }
    }

    /// The engine that loaded this dataset.
    pub fn engine(&self) -> EngineKind {
        match &self.table {
            LoadedTable::Arrow(_) => EngineKind::Arrow,
            #[cfg(feature = "datafusion-backend")]
            LoadedTable::DataFusion(_) => EngineKind::DataFusion,
        }
    }

    /// Path or placeholder the data was loaded from.
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    pub(crate) fn table(&self) -> &LoadedTable {
        &self.table
    }

    fn wrong_engine(&self, expected: EngineKind) -> DatasheetError {
        DatasheetError::unsupported_source(
            self.location.clone(),
            format!(
                "dataset was loaded by the {} engine and cannot be used with the {} engine",
                self.engine(),
                expected
            ),
        )
    }
}

/// Parameters for summarising one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRequest {
    /// Semantic type chosen by classification.
    pub dtype: DataTypeTag,
    /// Top values are omitted when a column has more distinct values.
    pub cardinality_threshold: u64,
    /// Maximum number of top values.
    pub top_k: usize,
}

impl SummaryRequest {
    pub fn new(dtype: DataTypeTag) -> Self {
        Self {
            dtype,
            cardinality_threshold: 1000,
            top_k: MAX_TOP_VALUES,
        }
    }

    pub fn with_cardinality_threshold(mut self, threshold: u64) -> Self {
        self.cardinality_threshold = threshold;
        self
    }
}

/// Capabilities every dataframe engine provides.
pub trait Backend: Send + Sync + fmt::Debug {
    /// The engine implemented by this adapter.
    fn kind(&self) -> EngineKind;

    /// Loads a file or adopts an in-memory table of this engine.
    fn load(&self, source: DataSource) -> Result<Dataset>;

    /// Column names in source order.
    fn columns(&self, dataset: &Dataset) -> Result<Vec<String>> {
        self.check_engine(dataset)?;
        Ok(dataset
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect())
    }

    /// Number of rows in the dataset.
    fn row_count(&self, dataset: &Dataset) -> Result<u64>;

    /// Declared storage type of a column.
    fn storage_type(&self, dataset: &Dataset, column: &str) -> AnalyzerResult<DataType> {
        self.check_engine(dataset)
            .map_err(|e| AnalyzerError::invalid_data(e.to_string()))?;
        dataset
            .schema()
            .field_with_name(column)
            .map(|field| field.data_type().clone())
            .map_err(|_| AnalyzerError::ColumnNotFound(column.to_string()))
    }

    /// Up to `limit` non-missing values rendered as strings, in row order.
    fn sample_values(
        &self,
        dataset: &Dataset,
        column: &str,
        limit: usize,
    ) -> AnalyzerResult<Vec<String>>;

    /// Computes the statistics of one column.
    fn summarize_column(
        &self,
        dataset: &Dataset,
        column: &str,
        request: &SummaryRequest,
    ) -> AnalyzerResult<ColumnStatistics>;

    /// Number of missing values in a column.
    fn missing_count(&self, dataset: &Dataset, column: &str) -> AnalyzerResult<u64>;

    /// Rejects datasets loaded by another engine.
    fn check_engine(&self, dataset: &Dataset) -> Result<()> {
        if dataset.engine() == self.kind() {
            Ok(())
        } else {
            Err(dataset.wrong_engine(self.kind()))
        }
    }
}

/// Picks and constructs the backend for a source.
///
/// An explicit engine must be available. `auto` uses the engine an in-memory
/// table belongs to, otherwise prefers Arrow, then DataFusion.
pub fn resolve_backend(
    kind: BackendKind,
    source: &DataSource,
    availability: EngineAvailability,
) -> Result<Box<dyn Backend>> {
    let engine = match kind.engine() {
        Some(engine) => engine,
        None => match source.native_engine() {
            Some(native) => native,
            None if availability.arrow => EngineKind::Arrow,
            None if availability.datafusion => EngineKind::DataFusion,
            None => return Err(DatasheetError::NoBackendAvailable),
        },
    };

    if !availability.is_available(engine) {
        return Err(DatasheetError::EngineUnavailable { engine });
    }

    debug!(requested = %kind, engine = %engine, "Resolved backend");
    instantiate(engine)
}

fn instantiate(engine: EngineKind) -> Result<Box<dyn Backend>> {
    match engine {
        #[cfg(feature = "arrow-backend")]
        EngineKind::Arrow => Ok(Box::new(ArrowBackend::new())),
        #[cfg(feature = "datafusion-backend")]
        EngineKind::DataFusion => Ok(Box::new(DataFusionBackend::new()?)),
        #[allow(unreachable_patterns)]
        other => Err(DatasheetError::EngineUnavailable { engine: other }),
    }
}
