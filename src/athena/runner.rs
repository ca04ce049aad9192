//! Submit-and-poll execution of Athena queries.
//!
//! Submission is fire-and-forget and returns an execution id; completion is
//! observed by polling the execution status at a fixed interval until a
//! terminal state or the local timeout. Remote job latencies are multiple
//! seconds, so constant-interval polling is sufficient — no backoff.

use std::time::{Duration, Instant};

use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum AthenaError {
    /// `StartQueryExecution` itself failed.
    #[error("failed to submit query: {source}")]
    Submit {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Submission succeeded but no execution id came back.
    #[error("query submission returned no execution id")]
    MissingExecutionId,

    /// `GetQueryExecution` failed while polling.
    #[error("failed to fetch status for execution {exec_id}: {source}")]
    Status {
        exec_id: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The remote execution reached FAILED or CANCELLED. Not retried.
    #[error("execution {exec_id} reached terminal state {state}{reason}")]
    ExecutionFailed {
        exec_id: String,
        state: String,
        reason: String,
    },

    /// The local wait ceiling elapsed. The remote execution is left
    /// running; no cancellation is issued.
    #[error("execution {exec_id} still running after {timeout_secs}s, giving up locally")]
    Timeout { exec_id: String, timeout_secs: u64 },

    /// The execution succeeded but declared no output location.
    #[error("execution {exec_id} succeeded but reported no output location")]
    MissingOutputLocation { exec_id: String },
}

/// Outcome of a successful query run.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub exec_id: String,
    /// `s3://...` location of the result object, ready to materialize.
    pub output_location: String,
}

/// Athena client bound to one database and one result output location.
pub struct AthenaRunner {
    client: aws_sdk_athena::Client,
    database: String,
    output_location: String,
}

impl AthenaRunner {
    pub fn new(client: aws_sdk_athena::Client, database: &str, output_location: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
            output_location: output_location.to_string(),
        }
    }

    /// Submit a query and return its execution id without waiting.
    pub async fn submit(&self, sql: &str) -> Result<String, AthenaError> {
        let response = self
            .client
            .start_query_execution()
            .query_string(sql)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(&self.database)
                    .build(),
            )
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(&self.output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| AthenaError::Submit {
                source: Box::new(e),
            })?;

        let exec_id = response
            .query_execution_id()
            .ok_or(AthenaError::MissingExecutionId)?
            .to_string();
        debug!(exec_id, "submitted query");
        Ok(exec_id)
    }

    /// Poll an execution until it succeeds, fails, or the local timeout
    /// elapses. On success, returns the result output location.
    pub async fn wait(
        &self,
        exec_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<String, AthenaError> {
        let started = Instant::now();

        loop {
            let response = self
                .client
                .get_query_execution()
                .query_execution_id(exec_id)
                .send()
                .await
                .map_err(|e| AthenaError::Status {
                    exec_id: exec_id.to_string(),
                    source: Box::new(e),
                })?;

            let execution = response.query_execution();
            let status = execution.and_then(|e| e.status());
            let state = status.and_then(|s| s.state());

            match state {
                Some(QueryExecutionState::Succeeded) => {
                    let location = execution
                        .and_then(|e| e.result_configuration())
                        .and_then(|c| c.output_location())
                        .map(str::to_string)
                        .ok_or_else(|| AthenaError::MissingOutputLocation {
                            exec_id: exec_id.to_string(),
                        })?;
                    info!(exec_id, elapsed = ?started.elapsed(), "query succeeded");
                    return Ok(location);
                }
                Some(QueryExecutionState::Failed) | Some(QueryExecutionState::Cancelled) => {
                    let reason = status
                        .and_then(|s| s.state_change_reason())
                        .map(|r| format!(": {r}"))
                        .unwrap_or_default();
                    return Err(AthenaError::ExecutionFailed {
                        exec_id: exec_id.to_string(),
                        state: state
                            .map(|s| s.as_str().to_string())
                            .unwrap_or_default(),
                        reason,
                    });
                }
                _ => {
                    debug!(exec_id, state = ?state, "query still running");
                }
            }

            if started.elapsed() >= timeout {
                return Err(AthenaError::Timeout {
                    exec_id: exec_id.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Submit a query and wait for its result location.
    pub async fn run(
        &self,
        sql: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<QueryOutput, AthenaError> {
        let exec_id = self.submit(sql).await?;
        let output_location = self.wait(&exec_id, poll_interval, timeout).await?;
        Ok(QueryOutput {
            exec_id,
            output_location,
        })
    }
}
