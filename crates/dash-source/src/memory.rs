//! In-memory backend serving registered results by exact query text

use crate::csv::read_csv;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use dash_core::{BackendResult, DashError, QueryBackend, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
enum Scripted {
    Rows(BackendResult),
    Fail(String),
}

/// Backend answering from a fixed table of query text to result.
///
/// Queries are matched byte for byte. Unknown queries fail with
/// [`DashError::QueryExecution`]; an offline backend fails every query with
/// [`DashError::Connection`]. Every call to `execute` is counted.
#[derive(Debug)]
pub struct MemoryBackend {
    responses: RwLock<HashMap<String, Scripted>>,
    executions: RwLock<HashMap<String, u64>>,
    total: AtomicU64,
    online: AtomicBool,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            executions: RwLock::new(HashMap::new()),
            total: AtomicU64::new(0),
            online: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Delay every execution, simulating a warehouse round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Serve `batches` for `sql`, replacing any previous response
    pub fn register(&self, sql: impl Into<String>, schema: SchemaRef, batches: Vec<RecordBatch>) {
        self.register_result(sql, BackendResult::new(schema, batches));
    }

    pub fn register_result(&self, sql: impl Into<String>, result: BackendResult) {
        self.responses.write().insert(sql.into(), Scripted::Rows(result));
    }

    /// Serve a result with the given columns and no rows
    pub fn register_empty(&self, sql: impl Into<String>, schema: SchemaRef) {
        self.register(sql, schema, Vec::new());
    }

    /// Serve the contents of a CSV file for `sql`
    pub fn register_csv(&self, sql: impl Into<String>, path: impl AsRef<Path>) -> Result<()> {
        let result = read_csv(path)?;
        self.register_result(sql, result);
        Ok(())
    }

    /// Make `sql` fail with a query execution error carrying `message`
    pub fn fail_query(&self, sql: impl Into<String>, message: impl Into<String>) {
        self.responses
            .write()
            .insert(sql.into(), Scripted::Fail(message.into()));
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of times `sql` was executed
    pub fn executions(&self, sql: &str) -> u64 {
        self.executions.read().get(sql).copied().unwrap_or(0)
    }

    pub fn total_executions(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn registered_queries(&self) -> usize {
        self.responses.read().len()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryBackend for MemoryBackend {
    async fn execute(&self, sql: &str) -> Result<BackendResult> {
        if !self.is_online() {
            return Err(DashError::Connection("memory backend is offline".into()));
        }

        self.total.fetch_add(1, Ordering::SeqCst);
        *self.executions.write().entry(sql.to_string()).or_insert(0) += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.responses.read().get(sql).cloned();
        match scripted {
            Some(Scripted::Rows(result)) => {
                debug!(rows = result.num_rows(), "Serving registered result");
                Ok(result)
            }
            Some(Scripted::Fail(message)) => Err(DashError::QueryExecution(message)),
            None => Err(DashError::QueryExecution(format!(
                "no result registered for query: {}",
                sql
            ))),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn cnt_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("CNT", DataType::Int64, false)]))
    }

    #[tokio::test]
    async fn test_registered_query() {
        let backend = MemoryBackend::new();
        let batch =
            RecordBatch::try_new(cnt_schema(), vec![Arc::new(Int64Array::from(vec![5]))]).unwrap();
        backend.register("SELECT COUNT(*) AS cnt FROM raw.job_postings", cnt_schema(), vec![batch]);

        let result = backend
            .execute("SELECT COUNT(*) AS cnt FROM raw.job_postings")
            .await
            .unwrap();

        assert_eq!(result.num_rows(), 1);
        assert_eq!(backend.executions("SELECT COUNT(*) AS cnt FROM raw.job_postings"), 1);
        assert_eq!(backend.total_executions(), 1);
    }

    #[tokio::test]
    async fn test_unknown_query_is_execution_error() {
        let backend = MemoryBackend::new();
        let err = backend.execute("SELECT 1").await.unwrap_err();
        assert!(err.is_query_execution());
        assert_eq!(backend.executions("SELECT 1"), 1);
    }

    #[tokio::test]
    async fn test_scripted_failure_keeps_message() {
        let backend = MemoryBackend::new();
        backend.fail_query("SELECT bogus", "SQL compilation error: invalid identifier 'BOGUS'");

        let err = backend.execute("SELECT bogus").await.unwrap_err();
        assert!(err.to_string().contains("invalid identifier 'BOGUS'"));
    }

    #[tokio::test]
    async fn test_offline_backend() {
        let backend = MemoryBackend::new();
        backend.register_empty("SELECT 1", cnt_schema());
        backend.set_online(false);

        let err = backend.execute("SELECT 1").await.unwrap_err();
        assert!(err.is_connection());
        assert_eq!(backend.total_executions(), 0);

        backend.set_online(true);
        assert!(backend.execute("SELECT 1").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let backend = MemoryBackend::new().with_latency(Duration::from_millis(250));
        backend.register_empty("SELECT 1", cnt_schema());

        let start = tokio::time::Instant::now();
        backend.execute("SELECT 1").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
