//! The Arrow and DataFusion engines must report the same statistics.

#![cfg(all(feature = "arrow-backend", feature = "datafusion-backend"))]

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::Float64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use datafusion::prelude::SessionContext;
use dfd_core::prelude::*;
use dfd_core::test_fixtures::{people_batch, write_file};
use parquet::arrow::ArrowWriter;
use tempfile::TempDir;

const MIXED_CSV: &str = "\
id,score,city,active,joined,label
1,3.5,Paris,true,2024-01-01,yes
2,,Lyon,false,2024-02-01,no
3,7.25,Paris,,2024-03-01,yes
4,1.0,,true,,n
5,2.5,Paris,false,2024-05-01,
";

fn analyse(kind: BackendKind, source: DataSource) -> AnalysisReport {
    let config = DatasheetConfig::default().with_backend(kind);
    analyse_source(&config, source).unwrap()
}

fn close(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => (a - b).abs() <= 1e-9 * a.abs().max(1.0),
        (None, None) => true,
        _ => false,
    }
}

fn assert_equivalent(arrow: &AnalysisReport, datafusion: &AnalysisReport) {
    assert_eq!(arrow.row_count, datafusion.row_count);
    assert_eq!(arrow.statistics.len(), datafusion.statistics.len());
    assert_eq!(arrow.warnings, datafusion.warnings);

    for (a, d) in arrow.statistics.iter().zip(&datafusion.statistics) {
        let column = &a.column_name;
        assert_eq!(a.column_name, d.column_name);
        assert_eq!(a.dtype, d.dtype, "dtype of {column}");
        assert_eq!(a.count, d.count, "count of {column}");
        assert_eq!(a.missing_count, d.missing_count, "missing_count of {column}");
        assert!(close(a.mean_val, d.mean_val), "mean of {column}: {a:?} vs {d:?}");
        assert!(close(a.std_val, d.std_val), "std of {column}");
        assert!(close(a.min_val, d.min_val), "min of {column}");
        assert!(close(a.max_val, d.max_val), "max of {column}");
        assert!(close(a.lower_quartile, d.lower_quartile), "25% of {column}");
        assert!(close(a.median, d.median), "median of {column}");
        assert!(close(a.upper_quartile, d.upper_quartile), "75% of {column}");
        assert_eq!(a.distinct_count, d.distinct_count, "distinct of {column}");
        assert_eq!(a.top_values, d.top_values, "top values of {column}");
    }
}

fn write_parquet(dir: &Path) -> std::path::PathBuf {
    let batch = people_batch();
    let path = dir.join("people.parquet");
    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path
}

#[test]
fn test_csv_statistics_match() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "mixed.csv", MIXED_CSV);

    let arrow = analyse(BackendKind::Arrow, DataSource::path(&path));
    let datafusion = analyse(BackendKind::DataFusion, DataSource::path(&path));
    println!("{}", arrow.to_json().unwrap());
    assert_equivalent(&arrow, &datafusion);

    let score = arrow.column("score").unwrap();
    assert_eq!(score.dtype, DataTypeTag::Numeric);
    assert_eq!((score.count, score.missing_count), (4, 1));
    assert_eq!(score.mean_val, Some(3.5625));

    let city = arrow.column("city").unwrap();
    assert_eq!(city.dtype, DataTypeTag::Categorical);
    let top = city.top_values.as_ref().unwrap();
    assert_eq!((top[0].value.as_str(), top[0].frequency), ("Paris", 3));

    assert_eq!(arrow.column("active").unwrap().dtype, DataTypeTag::Boolean);
    assert_eq!(arrow.column("joined").unwrap().dtype, DataTypeTag::Datetime);
    assert_eq!(arrow.column("label").unwrap().dtype, DataTypeTag::Boolean);
}

#[test]
fn test_tsv_and_json_match() {
    let dir = TempDir::new().unwrap();
    let tsv = write_file(dir.path(), "people.tsv", "age\tcity\n25\tA\n30\tB\n\tA\n");
    let json = write_file(
        dir.path(),
        "people.json",
        "{\"age\": 25, \"city\": \"A\"}\n{\"age\": 30, \"city\": \"B\"}\n{\"city\": \"A\"}\n",
    );

    for path in [tsv, json] {
        let arrow = analyse(BackendKind::Arrow, DataSource::path(&path));
        let datafusion = analyse(BackendKind::DataFusion, DataSource::path(&path));
        assert_equivalent(&arrow, &datafusion);
        assert_eq!(arrow.column("age").unwrap().mean_val, Some(27.5));
    }
}

#[test]
fn test_parquet_matches() {
    let dir = TempDir::new().unwrap();
    let path = write_parquet(dir.path());

    let arrow = analyse(BackendKind::Arrow, DataSource::path(&path));
    let datafusion = analyse(BackendKind::DataFusion, DataSource::path(&path));
    assert_equivalent(&arrow, &datafusion);
    assert_eq!(arrow.row_count, 3);
}

#[test]
fn test_in_memory_tables_match() {
    let arrow = analyse(
        BackendKind::Auto,
        DataSource::arrow(ArrowTable::from_batch(people_batch())),
    );
    let frame = SessionContext::new().read_batch(people_batch()).unwrap();
    let datafusion = analyse(BackendKind::Auto, DataSource::dataframe(frame));
    assert_equivalent(&arrow, &datafusion);
}

#[test]
fn test_nan_values_match() {
    let schema = Arc::new(Schema::new(vec![Field::new("reading", DataType::Float64, true)]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(vec![
            Some(1.0),
            Some(f64::NAN),
            Some(3.0),
            None,
        ]))],
    )
    .unwrap();

    let arrow = analyse(
        BackendKind::Arrow,
        DataSource::arrow(ArrowTable::from_batch(batch.clone())),
    );
    let frame = SessionContext::new().read_batch(batch).unwrap();
    let datafusion = analyse(BackendKind::DataFusion, DataSource::dataframe(frame));
    assert_equivalent(&arrow, &datafusion);

    let reading = datafusion.column("reading").unwrap();
    assert_eq!((reading.count, reading.missing_count), (3, 1));
    assert_eq!(reading.mean_val, Some(2.0));
    assert_eq!(reading.max_val, Some(3.0));
    assert_eq!(reading.median, Some(2.0));
}

#[test]
fn test_high_cardinality_matches() {
    let dir = TempDir::new().unwrap();
    let mut csv = String::from("name\n");
    for i in 0..40 {
        csv.push_str(&format!("user-{}\n", i % 25));
    }
    let path = write_file(dir.path(), "names.csv", &csv);

    let config = |kind| {
        DatasheetConfig::default()
            .with_backend(kind)
            .with_cardinality_threshold(10)
    };
    let arrow = analyse_source(&config(BackendKind::Arrow), DataSource::path(&path)).unwrap();
    let datafusion =
        analyse_source(&config(BackendKind::DataFusion), DataSource::path(&path)).unwrap();
    assert_equivalent(&arrow, &datafusion);

    let name = arrow.column("name").unwrap();
    assert_eq!(name.distinct_count, Some(25));
    assert!(name.top_values.is_none());
}
