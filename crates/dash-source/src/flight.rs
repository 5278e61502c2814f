//! Arrow Flight connector
//!
//! Sends each query as a Flight `Ticket` through `DoGet` and decodes the
//! returned stream into record batches.

use arrow_flight::decode::FlightRecordBatchStream;
use arrow_flight::error::FlightError;
use arrow_flight::flight_service_client::FlightServiceClient;
use arrow_flight::Ticket;
use async_trait::async_trait;
use dash_core::{BackendResult, DashError, QueryBackend, Result};
use futures::TryStreamExt;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::info;

/// Transport limits for a Flight session. Both are unset by default, leaving
/// query duration to the server's own policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlightOptions {
    /// Bound on establishing the connection
    pub connect_timeout: Option<Duration>,
    /// Bound on each `DoGet` request, including streaming the result
    pub request_timeout: Option<Duration>,
}

impl FlightOptions {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, endpoint: &str) -> Result<Endpoint> {
        let mut target = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| DashError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        if let Some(timeout) = self.connect_timeout {
            target = target.connect_timeout(timeout);
        }
        if let Some(timeout) = self.request_timeout {
            target = target.timeout(timeout);
        }
        Ok(target)
    }
}

/// Flight session to a remote analytical store
#[derive(Debug, Clone)]
pub struct FlightBackend {
    client: FlightServiceClient<Channel>,
    endpoint: String,
}

impl FlightBackend {
    /// Connect to a Flight server
    pub async fn connect(endpoint: &str) -> Result<Self> {
        Self::connect_with_options(endpoint, FlightOptions::default()).await
    }

    pub async fn connect_with_options(endpoint: &str, options: FlightOptions) -> Result<Self> {
        info!("Connecting to Flight server at {}", endpoint);

        let channel = options
            .endpoint(endpoint)?
            .connect()
            .await
            .map_err(|e| DashError::Connection(format!("{}: {}", endpoint, e)))?;

        Ok(Self {
            client: FlightServiceClient::new(channel),
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryBackend for FlightBackend {
    async fn execute(&self, sql: &str) -> Result<BackendResult> {
        let mut client = self.client.clone();

        let response = client
            .do_get(Ticket::new(sql.to_string()))
            .await
            .map_err(status_to_error)?;

        let flight_data = response.into_inner().map_err(FlightError::Tonic);
        let mut stream = FlightRecordBatchStream::new_from_flight_data(flight_data);

        let mut batches = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(flight_to_error)? {
            batches.push(batch);
        }

        let schema = match stream.schema() {
            Some(schema) => schema.clone(),
            None => batches.first().map(|b| b.schema()).ok_or_else(|| {
                DashError::QueryExecution("Flight server returned no schema".into())
            })?,
        };

        info!("Received {} batches from {}", batches.len(), self.endpoint);
        Ok(BackendResult::new(schema, batches))
    }

    fn name(&self) -> &str {
        "flight"
    }
}

/// A server that cannot be reached or refuses the session is a connection
/// problem; every other status means the query itself failed.
fn status_to_error(status: Status) -> DashError {
    match status.code() {
        Code::Unavailable | Code::Unauthenticated => {
            DashError::Connection(status.message().to_string())
        }
        code => DashError::QueryExecution(format!("{:?}: {}", code, status.message())),
    }
}

fn flight_to_error(err: FlightError) -> DashError {
    match err {
        FlightError::Tonic(status) => status_to_error(status),
        FlightError::Arrow(e) => DashError::Arrow(e),
        other => DashError::QueryExecution(other.to_string()),
    }
}
