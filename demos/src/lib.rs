//! Sample data shared by the demos

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use dash_core::BackendResult;
use std::sync::Arc;

/// Work type breakdown as a warehouse would return it, upper-case columns included
pub fn work_type_counts() -> Result<BackendResult, ArrowError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("WORK_TYPE", DataType::Utf8, false),
        Field::new("CNT", DataType::Int64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec!["Full-time", "Contract", "Part-time"])),
            Arc::new(Int64Array::from(vec![9804, 1943, 1210])),
        ],
    )?;
    Ok(BackendResult::new(schema, vec![batch]))
}
