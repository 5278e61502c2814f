use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use dash_core::{BackendResult, Result};
use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

/// Read a headered CSV file, inferring column types from its content
pub fn read_csv(path: impl AsRef<Path>) -> Result<BackendResult> {
    let mut file = File::open(path.as_ref())?;

    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(BackendResult::new(schema, batches))
}
