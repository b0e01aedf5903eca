//! DataFusion SQL engine.
//!
//! Each dataset lives in its own single-partition `SessionContext` under the
//! table name `dataset`, which keeps scan order equal to file order. Queries
//! run on a current-thread runtime owned by the backend. Called from inside
//! another tokio runtime, they are driven from a scoped helper thread instead.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float64Type, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use datafusion::datasource::MemTable;
use datafusion::error::DataFusionError;
use datafusion::prelude::*;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, instrument};

use super::numeric::{interpolate, quantile_position};
use super::{
    Backend, DataSource, Dataset, EngineKind, InMemoryTable, LoadedTable, SourceFormat,
    SummaryRequest, IN_MEMORY_LOCATION, SCHEMA_INFERENCE_RECORDS,
};
use crate::analyzers::errors::{AnalyzerError, AnalyzerResult};
use crate::analyzers::types::{ColumnStatistics, DataTypeTag, ValueFrequency};
use crate::error::{DatasheetError, Result};
use crate::security::SqlSecurity;

const TABLE_NAME: &str = "dataset";

/// A session holding the registered `dataset` table.
#[derive(Clone)]
pub(crate) struct RegisteredTable {
    ctx: SessionContext,
}

impl fmt::Debug for RegisteredTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTable")
            .field("table", &TABLE_NAME)
            .finish_non_exhaustive()
    }
}

/// Backend executing SQL through DataFusion.
///
/// Safe to use from synchronous and asynchronous code alike; see
/// [`DataFusionBackend::new`].
#[derive(Debug, Clone)]
pub struct DataFusionBackend {
    runtime: Arc<QueryRuntime>,
}

/// The backend's own runtime.
///
/// Dropping a `Runtime` from async code panics, so there it is shut down in
/// the background instead.
#[derive(Debug)]
struct QueryRuntime(Option<Runtime>);

impl QueryRuntime {
    #[allow(clippy::expect_used)]
    fn get(&self) -> &Runtime {
        self.0.as_ref().expect("runtime is only taken on drop")
    }
}

impl Drop for QueryRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            }
        }
    }
}

impl DataFusionBackend {
    /// Creates the backend and its private current-thread runtime.
    ///
    /// Queries block the calling thread. Inside a tokio runtime they run on a
    /// scoped helper thread, so an async caller's worker thread stays blocked
    /// for the duration; prefer `spawn_blocking` there.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(QueryRuntime(Some(runtime))),
        })
    }

    /// Drives `future` to completion on the private runtime.
    ///
    /// `Runtime::block_on` panics on a thread that is already running async
    /// code, so in that case the future runs on a scoped thread and the
    /// caller's thread blocks until it finishes.
    fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send,
        F::Output: Send,
    {
        if Handle::try_current().is_err() {
            return self.runtime.get().block_on(future);
        }
        debug!("Inside a tokio runtime, querying from a helper thread");
        std::thread::scope(|scope| {
            scope
                .spawn(|| self.runtime.get().block_on(future))
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        })
    }

    fn session() -> SessionContext {
        SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1))
    }

    #[instrument(skip(self, ctx))]
    fn register_file(&self, ctx: &SessionContext, path: &Path) -> Result<()> {
        let format = SourceFormat::from_path(path)?;
        let location = path.display().to_string();
        if !path.is_file() {
            return Err(DatasheetError::data_source(&location, "file does not exist"));
        }
        let path_str = path.to_str().ok_or_else(|| {
            DatasheetError::unsupported_source(&location, "path is not valid UTF-8")
        })?;
        // Listing tables filter files by extension, so pass the file's own.
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let registered = self.block_on(async {
            match format {
                SourceFormat::Csv | SourceFormat::Tsv => {
                    let options = CsvReadOptions::new()
                        .has_header(true)
                        .delimiter(format.delimiter())
                        .file_extension(&extension)
                        .schema_infer_max_records(SCHEMA_INFERENCE_RECORDS);
                    ctx.register_csv(TABLE_NAME, path_str, options).await
                }
                SourceFormat::Parquet => {
                    let options = ParquetReadOptions {
                        file_extension: &extension,
                        ..Default::default()
                    };
                    ctx.register_parquet(TABLE_NAME, path_str, options).await
                }
                SourceFormat::Json => {
                    let options = NdJsonReadOptions {
                        file_extension: &extension,
                        schema_infer_max_records: SCHEMA_INFERENCE_RECORDS,
                        ..Default::default()
                    };
                    ctx.register_json(TABLE_NAME, path_str, options).await
                }
            }
        });

        registered.map_err(|e| {
            DatasheetError::data_source_with_source(&location, "failed to register file", Box::new(e))
        })
    }

    fn register_frame(&self, ctx: &SessionContext, frame: DataFrame) -> Result<()> {
        let declared: SchemaRef = frame.schema().inner().clone();
        let batches = self.block_on(frame.collect())?;
        let schema = batches
            .first()
            .map(RecordBatch::schema)
            .unwrap_or(declared);
        let table = MemTable::try_new(schema, vec![batches])?;
        ctx.register_table(TABLE_NAME, Arc::new(table))?;
        Ok(())
    }

    fn registered<'a>(&self, dataset: &'a Dataset) -> Result<&'a RegisteredTable> {
        match dataset.table() {
            LoadedTable::DataFusion(table) => Ok(table),
            LoadedTable::Arrow(_) => Err(dataset.wrong_engine(EngineKind::DataFusion)),
        }
    }

    fn query(&self, dataset: &Dataset, sql: &str) -> AnalyzerResult<Vec<RecordBatch>> {
        let table = self
            .registered(dataset)
            .map_err(|e| AnalyzerError::invalid_data(e.to_string()))?;
        debug!(sql = sql, "Executing query");
        let batches = self.block_on(async {
            let df = table.ctx.sql(sql).await?;
            df.collect().await
        })?;
        Ok(batches)
    }

    fn numeric_fields(
        &self,
        dataset: &Dataset,
        column: &str,
        stats: &mut ColumnStatistics,
    ) -> AnalyzerResult<()> {
        // NaN counts as present but, like an unparseable string, takes no
        // part in the moments or quartiles.
        let values = format!(
            "(SELECT v FROM (SELECT TRY_CAST({column} AS DOUBLE) AS v FROM {TABLE_NAME}) AS raw \
             WHERE v IS NOT NULL AND NOT isnan(v)) AS t"
        );
        let sql = format!(
            "SELECT AVG(v) AS mean_val, STDDEV_POP(v) AS std_val, MIN(v) AS min_val, \
             MAX(v) AS max_val, COUNT(v) AS numeric_count FROM {values}"
        );
        let batches = self.query(dataset, &sql)?;
        let numeric_count = extract_u64(&batches, 4, "numeric_count")?;
        if numeric_count == 0 {
            return Ok(());
        }

        stats.mean_val = extract_optional_f64(&batches, 0)?;
        stats.std_val = extract_optional_f64(&batches, 1)?;
        stats.min_val = extract_optional_f64(&batches, 2)?;
        stats.max_val = extract_optional_f64(&batches, 3)?;
        stats.lower_quartile = self.quantile(dataset, &values, numeric_count, 0.25)?;
        stats.median = self.quantile(dataset, &values, numeric_count, 0.5)?;
        stats.upper_quartile = self.quantile(dataset, &values, numeric_count, 0.75)?;
        Ok(())
    }

    /// Exact quantile with linear interpolation between the two closest ranks.
    fn quantile(
        &self,
        dataset: &Dataset,
        values: &str,
        n: u64,
        q: f64,
    ) -> AnalyzerResult<Option<f64>> {
        let Some((rank, fraction)) = quantile_position(n as usize, q) else {
            return Ok(None);
        };
        let sql = format!(
            "SELECT v FROM {values} ORDER BY v ASC LIMIT 2 OFFSET {rank}"
        );
        let mut neighbours = Vec::with_capacity(2);
        for batch in self.query(dataset, &sql)? {
            if let Some(array) = batch.column(0).as_primitive_opt::<Float64Type>() {
                neighbours.extend(array.iter().flatten());
            }
        }

        let Some(&lower) = neighbours.first() else {
            return Ok(None);
        };
        let upper = neighbours.get(1).copied().unwrap_or(lower);
        Ok(Some(interpolate(lower, upper, fraction)))
    }

    fn discrete_fields(
        &self,
        dataset: &Dataset,
        column: &str,
        request: &SummaryRequest,
        stats: &mut ColumnStatistics,
    ) -> AnalyzerResult<()> {
        let sql = format!(
            "SELECT COUNT(DISTINCT CAST({column} AS VARCHAR)) AS distinct_count FROM {TABLE_NAME}"
        );
        let distinct = extract_u64(&self.query(dataset, &sql)?, 0, "distinct_count")?;
        stats.distinct_count = Some(distinct);
        if distinct > request.cardinality_threshold {
            return Ok(());
        }

        let sql = format!(
            "SELECT value, COUNT(*) AS frequency, MIN(position) AS first_seen \
             FROM (SELECT CAST({column} AS VARCHAR) AS value, ROW_NUMBER() OVER () AS position FROM {TABLE_NAME}) AS t \
             WHERE value IS NOT NULL \
             GROUP BY value \
             ORDER BY frequency DESC, first_seen ASC \
             LIMIT {}",
            request.top_k
        );
        let batches = self.query(dataset, &sql)?;
        let mut top = Vec::new();
        for batch in &batches {
            let values = string_values(batch.column(0).as_ref())?;
            for (row, value) in values.into_iter().enumerate() {
                let frequency = extract_u64_at(batch, 1, row, "frequency")?;
                top.push(ValueFrequency::new(value, frequency));
            }
        }
        stats.top_values = Some(top);
        Ok(())
    }
}

/// Renders a string-like column as owned strings; nulls become empty strings.
fn string_values(column: &dyn Array) -> AnalyzerResult<Vec<String>> {
    let owned = |value: Option<&str>| value.unwrap_or_default().to_string();
    if let Some(arr) = column.as_string_opt::<i32>() {
        Ok(arr.iter().map(owned).collect())
    } else if let Some(arr) = column.as_string_opt::<i64>() {
        Ok(arr.iter().map(owned).collect())
    } else if let Some(arr) = column.as_string_view_opt() {
        Ok(arr.iter().map(owned).collect())
    } else {
        let formatter = ArrayFormatter::try_new(column, &FormatOptions::default())?;
        Ok((0..column.len())
            .map(|row| formatter.value(row).to_string())
            .collect())
    }
}

fn extract_u64_at(
    batch: &RecordBatch,
    col_idx: usize,
    row: usize,
    col_name: &str,
) -> AnalyzerResult<u64> {
    let column = batch.column(col_idx);
    if column.is_null(row) {
        return Err(AnalyzerError::invalid_data(format!(
            "Null value in {col_name} column"
        )));
    }

    if let Some(arr) = column.as_any().downcast_ref::<arrow::array::Int64Array>() {
        Ok(arr.value(row).max(0) as u64)
    } else if let Some(arr) = column.as_any().downcast_ref::<arrow::array::UInt64Array>() {
        Ok(arr.value(row))
    } else {
        Err(AnalyzerError::invalid_data(format!(
            "Expected integer for {col_name}, found {}",
            column.data_type()
        )))
    }
}

fn extract_u64(batches: &[RecordBatch], col_idx: usize, col_name: &str) -> AnalyzerResult<u64> {
    let batch = batches
        .iter()
        .find(|b| b.num_rows() > 0)
        .ok_or_else(|| AnalyzerError::invalid_data(format!("No rows returned for {col_name}")))?;
    extract_u64_at(batch, col_idx, 0, col_name)
}

fn extract_optional_f64(batches: &[RecordBatch], col_idx: usize) -> AnalyzerResult<Option<f64>> {
    let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
        return Ok(None);
    };
    let column = batch.column(col_idx);
    if column.is_null(0) {
        return Ok(None);
    }
    if column.data_type() == &DataType::Float64 {
        Ok(Some(column.as_primitive::<Float64Type>().value(0)))
    } else {
        let cast = arrow::compute::cast(column, &DataType::Float64)?;
        Ok(Some(cast.as_primitive::<Float64Type>().value(0)))
    }
}

impl Backend for DataFusionBackend {
    fn kind(&self) -> EngineKind {
        EngineKind::DataFusion
    }

    fn load(&self, source: DataSource) -> Result<Dataset> {
        let ctx = Self::session();
        let location = match source {
            DataSource::Path(path) => {
                self.register_file(&ctx, &path)?;
                path.display().to_string()
            }
            DataSource::Table(InMemoryTable::DataFusion(frame)) => {
                self.register_frame(&ctx, frame)?;
                IN_MEMORY_LOCATION.to_string()
            }
            DataSource::Table(other) => {
                return Err(DatasheetError::unsupported_source(
                    IN_MEMORY_LOCATION,
                    format!(
                        "in-memory table belongs to the {} engine, not datafusion",
                        other.engine()
                    ),
                ))
            }
        };

        let schema: SchemaRef = self.block_on(async {
            let df = ctx.table(TABLE_NAME).await?;
            Ok::<_, DataFusionError>(df.schema().inner().clone())
        })?;

        debug!(
            location = %location,
            columns = schema.fields().len(),
            "Loaded dataset with datafusion engine"
        );
        Ok(Dataset::new(
            location,
            schema,
            LoadedTable::DataFusion(RegisteredTable { ctx }),
        ))
    }

    fn row_count(&self, dataset: &Dataset) -> Result<u64> {
        let batches = self.query(dataset, &format!("SELECT COUNT(*) AS row_count FROM {TABLE_NAME}"))?;
        Ok(extract_u64(&batches, 0, "row_count")?)
    }

    fn sample_values(
        &self,
        dataset: &Dataset,
        column: &str,
        limit: usize,
    ) -> AnalyzerResult<Vec<String>> {
        self.storage_type(dataset, column)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let col = SqlSecurity::escape_identifier(column)?;
        let sql = format!(
            "SELECT CAST({col} AS VARCHAR) AS value FROM {TABLE_NAME} WHERE {col} IS NOT NULL LIMIT {limit}"
        );
        let mut samples = Vec::new();
        for batch in self.query(dataset, &sql)? {
            samples.extend(string_values(batch.column(0).as_ref())?);
        }
        Ok(samples)
    }

    #[instrument(skip(self, dataset, request), fields(dtype = %request.dtype))]
    fn summarize_column(
        &self,
        dataset: &Dataset,
        column: &str,
        request: &SummaryRequest,
    ) -> AnalyzerResult<ColumnStatistics> {
        self.storage_type(dataset, column)?;
        let col = SqlSecurity::escape_identifier(column)?;

        let sql = format!("SELECT COUNT(*) AS total_rows, COUNT({col}) AS present FROM {TABLE_NAME}");
        let batches = self.query(dataset, &sql)?;
        let total = extract_u64(&batches, 0, "total_rows")?;
        let count = extract_u64(&batches, 1, "present")?;
        let mut stats =
            ColumnStatistics::counts_only(column, request.dtype, count, total.saturating_sub(count));

        match request.dtype {
            DataTypeTag::Numeric => self.numeric_fields(dataset, &col, &mut stats)?,
            dtype if dtype.is_discrete() => self.discrete_fields(dataset, &col, request, &mut stats)?,
            _ => {}
        }

        Ok(stats)
    }

    fn missing_count(&self, dataset: &Dataset, column: &str) -> AnalyzerResult<u64> {
        self.storage_type(dataset, column)?;
        let col = SqlSecurity::escape_identifier(column)?;
        let sql = format!("SELECT COUNT(*) - COUNT({col}) AS missing FROM {TABLE_NAME}");
        extract_u64(&self.query(dataset, &sql)?, 0, "missing")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{people_batch, people_table, write_file};
    use tempfile::TempDir;

    fn load_people() -> (DataFusionBackend, Dataset) {
        let backend = DataFusionBackend::new().unwrap();
        let frame = SessionContext::new().read_batch(people_batch()).unwrap();
        let dataset = backend.load(DataSource::dataframe(frame)).unwrap();
        (backend, dataset)
    }

    #[test]
    fn test_in_memory_frame() {
        let (backend, dataset) = load_people();
        assert_eq!(dataset.engine(), EngineKind::DataFusion);
        assert_eq!(backend.columns(&dataset).unwrap(), vec!["age", "city"]);
        assert_eq!(backend.row_count(&dataset).unwrap(), 3);
    }

    #[test]
    fn test_numeric_summary() {
        let (backend, dataset) = load_people();
        let stats = backend
            .summarize_column(&dataset, "age", &SummaryRequest::new(DataTypeTag::Numeric))
            .unwrap();
        println!("age: {stats:#?}");
        assert_eq!(stats.count, 2);
        assert_eq!(stats.missing_count, 1);
        assert_eq!(stats.mean_val, Some(27.5));
        assert_eq!(stats.std_val, Some(2.5));
        assert_eq!(stats.min_val, Some(25.0));
        assert_eq!(stats.max_val, Some(30.0));
        assert_eq!(stats.median, Some(27.5));
        assert_eq!(stats.lower_quartile, Some(26.25));
    }

    #[tokio::test]
    async fn test_usable_from_async_code() {
        let (backend, dataset) = load_people();
        assert_eq!(backend.row_count(&dataset).unwrap(), 3);
        let stats = backend
            .summarize_column(&dataset, "age", &SummaryRequest::new(DataTypeTag::Numeric))
            .unwrap();
        assert_eq!(stats.mean_val, Some(27.5));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_usable_from_spawned_blocking_task() {
        let report = tokio::task::spawn_blocking(|| {
            let (backend, dataset) = load_people();
            backend.missing_count(&dataset, "age").unwrap()
        })
        .await
        .unwrap();
        assert_eq!(report, 1);
    }

    #[test]
    fn test_nan_is_left_out_of_moments() {
        let schema = Arc::new(arrow::datatypes::Schema::new(vec![
            arrow::datatypes::Field::new("v", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(arrow::array::Float64Array::from(vec![
                Some(1.0),
                Some(f64::NAN),
                Some(3.0),
                None,
            ]))],
        )
        .unwrap();
        let backend = DataFusionBackend::new().unwrap();
        let frame = SessionContext::new().read_batch(batch).unwrap();
        let dataset = backend.load(DataSource::dataframe(frame)).unwrap();

        let stats = backend
            .summarize_column(&dataset, "v", &SummaryRequest::new(DataTypeTag::Numeric))
            .unwrap();
        assert_eq!((stats.count, stats.missing_count), (3, 1));
        assert_eq!(stats.mean_val, Some(2.0));
        assert_eq!(stats.std_val, Some(1.0));
        assert_eq!(stats.max_val, Some(3.0));
        assert_eq!(stats.median, Some(2.0));
        assert_eq!(stats.upper_quartile, Some(2.5));
    }

    #[test]
    fn test_top_values_in_first_seen_order() {
        let (backend, dataset) = load_people();
        let stats = backend
            .summarize_column(&dataset, "city", &SummaryRequest::new(DataTypeTag::Categorical))
            .unwrap();
        assert_eq!(stats.distinct_count, Some(2));
        assert_eq!(
            stats.top_values.unwrap(),
            vec![ValueFrequency::new("A", 2), ValueFrequency::new("B", 1)]
        );
    }

    #[test]
    fn test_sample_values_and_missing() {
        let (backend, dataset) = load_people();
        assert_eq!(backend.sample_values(&dataset, "city", 2).unwrap(), vec!["A", "B"]);
        assert_eq!(backend.missing_count(&dataset, "age").unwrap(), 1);
        assert!(matches!(
            backend.missing_count(&dataset, "nope").unwrap_err(),
            AnalyzerError::ColumnNotFound(_)
        ));
    }

    #[test]
    fn test_quoted_column_names() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "quoted.csv",
            "First Name,Total-Count\nAda,1\nGrace,2\n",
        );
        let backend = DataFusionBackend::new().unwrap();
        let dataset = backend.load(DataSource::path(&path)).unwrap();
        let columns = backend.columns(&dataset).unwrap();
        assert_eq!(columns[0], "First Name");

        for column in &columns {
            let stats = backend
                .summarize_column(&dataset, column, &SummaryRequest::new(DataTypeTag::Text))
                .unwrap();
            assert_eq!(stats.count, 2);
        }
    }

    #[test]
    fn test_rejects_arrow_table() {
        let backend = DataFusionBackend::new().unwrap();
        let err = backend.load(DataSource::arrow(people_table())).unwrap_err();
        assert!(matches!(err, DatasheetError::UnsupportedSourceKind { .. }));
    }

    #[test]
    fn test_rejects_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "data.xlsx", "not a spreadsheet");
        let err = DataFusionBackend::new()
            .unwrap()
            .load(DataSource::path(&path))
            .unwrap_err();
        assert!(matches!(err, DatasheetError::UnsupportedSourceKind { .. }));
    }
}
