//! Small in-memory tables shared by unit tests, integration tests and benches.
//!
//! Enabled for the crate's own tests and through the `test-utils` feature.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Float64Array, Int64Array, NullArray,
    StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::backends::ArrowTable;

/// Three people: `age` = [25, 30, missing], `city` = [A, B, A].
pub fn people_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("age", DataType::Int64, true),
        Field::new("city", DataType::Utf8, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![Some(25), Some(30), None])),
        Arc::new(StringArray::from(vec!["A", "B", "A"])),
    ];
    RecordBatch::try_new(schema, columns).expect("valid people batch")
}

/// [`people_batch`] as an Arrow table.
pub fn people_table() -> ArrowTable {
    ArrowTable::from_batch(people_batch())
}

/// Five rows covering every storage class the classifier distinguishes.
pub fn mixed_types_table() -> ArrowTable {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("amount_text", DataType::Utf8, true),
        Field::new("active", DataType::Boolean, true),
        Field::new("answer", DataType::Utf8, true),
        Field::new("joined", DataType::Date32, true),
        Field::new("joined_text", DataType::Utf8, true),
        Field::new("empty", DataType::Float64, true),
        Field::new("nothing", DataType::Null, true),
        Field::new("payload", DataType::Binary, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])),
        Arc::new(StringArray::from(vec!["1.5", "2", "3.25", "10", "4"])),
        Arc::new(BooleanArray::from(vec![
            Some(true),
            Some(false),
            None,
            Some(true),
            Some(true),
        ])),
        Arc::new(StringArray::from(vec![
            Some("yes"),
            Some("no"),
            Some("Y"),
            Some("n"),
            None,
        ])),
        Arc::new(Date32Array::from(vec![
            Some(19_737),
            Some(19_754),
            None,
            Some(19_800),
            Some(19_801),
        ])),
        Arc::new(StringArray::from(vec![
            "2024-01-15",
            "2024-02-01",
            "2024-03-10",
            "2024-03-18",
            "2024-04-02",
        ])),
        Arc::new(Float64Array::from(vec![None::<f64>; 5])),
        Arc::new(NullArray::new(5)),
        Arc::new(BinaryArray::from(vec![
            Some(b"\x00\x01".as_ref()),
            None,
            Some(b"\x02".as_ref()),
            Some(b"\x03".as_ref()),
            Some(b"\x04".as_ref()),
        ])),
    ];
    let batch = RecordBatch::try_new(schema, columns).expect("valid mixed types batch");
    ArrowTable::from_batch(batch)
}

/// Writes `contents` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture file");
    path
}
