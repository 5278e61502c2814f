//! Normalized tabular query results

use crate::backend::BackendResult;
use crate::error::{DashError, Result};
use crate::types::ScalarValue;
use arrow::array::ArrayRef;
use arrow::compute::{concat, concat_batches};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Tabular result of one query execution.
///
/// Column names are lowercased when the table is built; column order and row
/// order are kept exactly as the store returned them. Clones share the
/// underlying column buffers.
#[derive(Debug, Clone)]
pub struct ResultTable {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
    num_rows: usize,
}

impl ResultTable {
    /// Build a table, lowercasing every column name
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = normalize_schema(&schema);

        let batches = batches
            .into_iter()
            .map(|batch| {
                if batch.num_columns() != schema.fields().len() {
                    return Err(DashError::Schema(format!(
                        "batch has {} columns, schema has {}",
                        batch.num_columns(),
                        schema.fields().len()
                    )));
                }
                Ok(RecordBatch::try_new(
                    schema.clone(),
                    batch.columns().to_vec(),
                )?)
            })
            .collect::<Result<Vec<_>>>()?;

        let num_rows = batches.iter().map(|b| b.num_rows()).sum();

        Ok(Self {
            schema,
            batches,
            num_rows,
        })
    }

    pub fn from_backend(result: BackendResult) -> Result<Self> {
        Self::try_new(result.schema, result.batches)
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    /// A table with zero rows. Consumers present this as "no data".
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Position of a column. The lookup name is lowercased first.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        let name = name.to_lowercase();
        self.schema
            .fields()
            .iter()
            .position(|f| *f.name() == name)
            .ok_or(DashError::ColumnNotFound(name))
    }

    /// Whole column as one contiguous array
    pub fn column(&self, name: &str) -> Result<ArrayRef> {
        let idx = self.column_index(name)?;
        let field = self.schema.field(idx);

        if self.batches.is_empty() {
            return Ok(arrow::array::new_empty_array(field.data_type()));
        }

        let parts: Vec<&dyn arrow::array::Array> = self
            .batches
            .iter()
            .map(|b| b.column(idx).as_ref())
            .collect();
        Ok(concat(&parts)?)
    }

    /// Value at `row` of column `name`
    pub fn value(&self, row: usize, name: &str) -> Result<ScalarValue> {
        let idx = self.column_index(name)?;
        let (batch, offset) = self.locate(row)?;
        ScalarValue::from_array(batch.column(idx).as_ref(), offset)
    }

    /// All values of one row, in column order
    pub fn row(&self, row: usize) -> Result<Vec<ScalarValue>> {
        let (batch, offset) = self.locate(row)?;
        batch
            .columns()
            .iter()
            .map(|col| ScalarValue::from_array(col.as_ref(), offset))
            .collect()
    }

    pub fn column_values(&self, name: &str) -> Result<Vec<ScalarValue>> {
        let column = self.column(name)?;
        (0..column.len())
            .map(|i| ScalarValue::from_array(column.as_ref(), i))
            .collect()
    }

    /// Column coerced to numbers; unparseable cells and nulls become `None`
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(self
            .column_values(name)?
            .iter()
            .map(ScalarValue::as_f64)
            .collect())
    }

    /// Approximate memory held by the column buffers
    pub fn size_bytes(&self) -> usize {
        self.batches
            .iter()
            .map(|batch| {
                batch
                    .columns()
                    .iter()
                    .map(|col| col.get_array_memory_size())
                    .sum::<usize>()
            })
            .sum()
    }

    fn locate(&self, row: usize) -> Result<(&RecordBatch, usize)> {
        let mut offset = row;
        for batch in &self.batches {
            if offset < batch.num_rows() {
                return Ok((batch, offset));
            }
            offset -= batch.num_rows();
        }
        Err(DashError::Schema(format!(
            "row {} out of bounds for table of {} rows",
            row, self.num_rows
        )))
    }
}

/// Tables are equal when they have the same columns and the same cell values
/// in the same order, regardless of how rows are split into batches.
impl PartialEq for ResultTable {
    fn eq(&self, other: &Self) -> bool {
        if self.schema != other.schema || self.num_rows != other.num_rows {
            return false;
        }
        if self.batches == other.batches {
            return true;
        }
        match (
            concat_batches(&self.schema, &self.batches),
            concat_batches(&other.schema, &other.batches),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

fn normalize_schema(schema: &Schema) -> SchemaRef {
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_name(f.name().to_lowercase()))
        .collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}
