//! Eager Arrow engine.

use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{new_empty_array, Array, ArrayRef, AsArray};
use arrow::buffer::NullBuffer;
use arrow::compute::{cast, concat};
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Float64Type};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, instrument};

use super::numeric::{FrequencyCounter, NumericSummary};
use super::{
    ArrowTable, Backend, DataSource, Dataset, EngineKind, InMemoryTable, LoadedTable,
    SourceFormat, SummaryRequest, IN_MEMORY_LOCATION, SCHEMA_INFERENCE_RECORDS,
};
use crate::analyzers::errors::{AnalyzerError, AnalyzerResult};
use crate::analyzers::types::{ColumnStatistics, DataTypeTag};
use crate::error::{DatasheetError, Result};

/// Backend computing statistics with Arrow kernels over in-memory batches.
#[derive(Debug, Clone, Default)]
pub struct ArrowBackend;

impl ArrowBackend {
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self))]
    fn read_file(&self, path: &Path) -> Result<ArrowTable> {
        let format = SourceFormat::from_path(path)?;
        let location = path.display().to_string();
        let file = File::open(path).map_err(|e| {
            DatasheetError::data_source_with_source(&location, "cannot open file", Box::new(e))
        })?;

        let decode = |e: ArrowError| {
            DatasheetError::data_source_with_source(
                &location,
                format!("failed to decode {format:?} data"),
                Box::new(e),
            )
        };

        let (schema, batches) = match format {
            SourceFormat::Csv | SourceFormat::Tsv => {
                let mut file = file;
                let csv_format = Format::default()
                    .with_header(true)
                    .with_delimiter(format.delimiter());
                let (schema, _) = csv_format
                    .infer_schema(&mut file, Some(SCHEMA_INFERENCE_RECORDS))
                    .map_err(decode)?;
                file.rewind()?;
                let schema = Arc::new(schema);
                let reader = arrow::csv::ReaderBuilder::new(Arc::clone(&schema))
                    .with_format(csv_format)
                    .build(file)
                    .map_err(decode)?;
                let batches = reader.collect::<std::result::Result<Vec<_>, _>>().map_err(decode)?;
                (schema, batches)
            }
            SourceFormat::Json => {
                let mut reader = BufReader::new(file);
                let (schema, _) = arrow::json::reader::infer_json_schema_from_seekable(
                    &mut reader,
                    Some(SCHEMA_INFERENCE_RECORDS),
                )
                .map_err(decode)?;
                reader.rewind()?;
                let schema = Arc::new(schema);
                let json = arrow::json::ReaderBuilder::new(Arc::clone(&schema))
                    .build(reader)
                    .map_err(decode)?;
                let batches = json.collect::<std::result::Result<Vec<_>, _>>().map_err(decode)?;
                (schema, batches)
            }
            SourceFormat::Parquet => {
                let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
                    DatasheetError::data_source_with_source(
                        &location,
                        "failed to read parquet metadata",
                        Box::new(e),
                    )
                })?;
                let schema = Arc::clone(builder.schema());
                let reader = builder.build().map_err(|e| {
                    DatasheetError::data_source_with_source(
                        &location,
                        "failed to read parquet data",
                        Box::new(e),
                    )
                })?;
                let batches = reader.collect::<std::result::Result<Vec<_>, _>>().map_err(decode)?;
                (schema, batches)
            }
        };

        ArrowTable::try_new(schema, batches)
    }

    fn table<'a>(&self, dataset: &'a Dataset) -> Result<&'a ArrowTable> {
        match dataset.table() {
            LoadedTable::Arrow(table) => Ok(table),
            #[cfg(feature = "datafusion-backend")]
            LoadedTable::DataFusion(_) => Err(dataset.wrong_engine(EngineKind::Arrow)),
        }
    }

    /// The whole column as one array.
    fn column_array(&self, dataset: &Dataset, column: &str) -> AnalyzerResult<ArrayRef> {
        let table = self
            .table(dataset)
            .map_err(|e| AnalyzerError::invalid_data(e.to_string()))?;
        let schema = table.schema();
        let index = schema
            .index_of(column)
            .map_err(|_| AnalyzerError::ColumnNotFound(column.to_string()))?;

        let arrays: Vec<&dyn Array> = table
            .batches()
            .iter()
            .map(|batch: &RecordBatch| batch.column(index).as_ref())
            .collect();
        if arrays.is_empty() {
            return Ok(new_empty_array(schema.field(index).data_type()));
        }
        Ok(concat(&arrays)?)
    }
}

/// Visits the present values of an array rendered as strings.
fn for_each_present(
    array: &dyn Array,
    mut visit: impl FnMut(String) -> bool,
) -> AnalyzerResult<()> {
    let nulls: Option<NullBuffer> = array.logical_nulls();
    let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
    for row in 0..array.len() {
        if nulls.as_ref().is_some_and(|n| n.is_null(row)) {
            continue;
        }
        if !visit(formatter.value(row).to_string()) {
            break;
        }
    }
    Ok(())
}

fn numeric_summary(array: &ArrayRef) -> AnalyzerResult<NumericSummary> {
    let floats = cast(array, &DataType::Float64)?;
    let values: Vec<f64> = floats
        .as_primitive::<Float64Type>()
        .iter()
        .flatten()
        .collect();
    Ok(NumericSummary::from_values(values))
}

impl Backend for ArrowBackend {
    fn kind(&self) -> EngineKind {
        EngineKind::Arrow
    }

    fn load(&self, source: DataSource) -> Result<Dataset> {
        let (location, table) = match source {
            DataSource::Path(path) => (path.display().to_string(), self.read_file(&path)?),
            DataSource::Table(InMemoryTable::Arrow(table)) => (IN_MEMORY_LOCATION.to_string(), table),
            #[cfg(feature = "datafusion-backend")]
            DataSource::Table(other) => {
                return Err(DatasheetError::unsupported_source(
                    IN_MEMORY_LOCATION,
                    format!(
                        "in-memory table belongs to the {} engine, not arrow",
                        other.engine()
                    ),
                ))
            }
        };

        debug!(
            location = %location,
            rows = table.num_rows(),
            columns = table.schema().fields().len(),
            "Loaded dataset with arrow engine"
        );
        Ok(Dataset::new(location, table.schema(), LoadedTable::Arrow(table)))
    }

    fn row_count(&self, dataset: &Dataset) -> Result<u64> {
        Ok(self.table(dataset)?.num_rows() as u64)
    }

    fn sample_values(
        &self,
        dataset: &Dataset,
        column: &str,
        limit: usize,
    ) -> AnalyzerResult<Vec<String>> {
        let array = self.column_array(dataset, column)?;
        let mut samples = Vec::with_capacity(limit.min(array.len()));
        if limit == 0 {
            return Ok(samples);
        }
        for_each_present(array.as_ref(), |value| {
            samples.push(value);
            samples.len() < limit
        })?;
        Ok(samples)
    }

    #[instrument(skip(self, dataset, request), fields(dtype = %request.dtype))]
    fn summarize_column(
        &self,
        dataset: &Dataset,
        column: &str,
        request: &SummaryRequest,
    ) -> AnalyzerResult<ColumnStatistics> {
        let array = self.column_array(dataset, column)?;
        let missing = array.logical_null_count() as u64;
        let count = array.len() as u64 - missing;
        let mut stats = ColumnStatistics::counts_only(column, request.dtype, count, missing);

        match request.dtype {
            DataTypeTag::Numeric => {
                let summary = numeric_summary(&array)?;
                stats.mean_val = summary.mean;
                stats.std_val = summary.std;
                stats.min_val = summary.min;
                stats.max_val = summary.max;
                stats.lower_quartile = summary.lower_quartile;
                stats.median = summary.median;
                stats.upper_quartile = summary.upper_quartile;
            }
            dtype if dtype.is_discrete() => {
                let mut counter = FrequencyCounter::new();
                for_each_present(array.as_ref(), |value| {
                    counter.add(&value);
                    true
                })?;
                let distinct = counter.distinct();
                stats.distinct_count = Some(distinct);
                if distinct <= request.cardinality_threshold {
                    stats.top_values = Some(counter.top(request.top_k));
                }
            }
            _ => {}
        }

        Ok(stats)
    }

    fn missing_count(&self, dataset: &Dataset, column: &str) -> AnalyzerResult<u64> {
        Ok(self.column_array(dataset, column)?.logical_null_count() as u64)
    }
}
