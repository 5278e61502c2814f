//! Contract between the query cache and the analytical store it delegates to

use crate::error::Result;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::fmt::Debug;

/// Raw output of one query execution, before column normalization.
///
/// The schema travels separately from the batches so that a query returning
/// zero rows (and possibly zero batches) still reports its columns.
#[derive(Debug, Clone)]
pub struct BackendResult {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl BackendResult {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

/// A session able to execute SQL text against the backing store.
///
/// Implementations report rejected queries as [`crate::DashError::QueryExecution`]
/// and a missing or broken session as [`crate::DashError::Connection`]. They must not
/// retry or reconnect on their own account.
#[async_trait]
pub trait QueryBackend: Send + Sync + Debug {
    async fn execute(&self, sql: &str) -> Result<BackendResult>;

    /// Short label used in logs
    fn name(&self) -> &str {
        "backend"
    }
}
