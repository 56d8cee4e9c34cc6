//! Cloud log stream sink: batched writes with sequence-token discipline,
//! auto-creating the stream on first write. The wire format for any
//! specific provider is out of scope; [`CloudStreamClient`] is the
//! generic seam a deployer plugs a provider SDK into.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::AuditSink;
use crate::error::AuditError;
use crate::types::AuditRecord;

/// Capability a cloud log-stream provider must offer: create a stream
/// lazily, and append records carrying the last-known sequence token,
/// receiving the next one back.
#[async_trait]
pub trait CloudStreamClient: Send + Sync {
    async fn ensure_stream(&self, stream_name: &str) -> Result<(), AuditError>;

    /// Append `payload` using `sequence_token` (`None` for the first
    /// write after stream creation). Returns the token to use next.
    async fn put(&self, stream_name: &str, payload: &str, sequence_token: Option<&str>) -> Result<String, AuditError>;
}

pub struct CloudSink<C: CloudStreamClient> {
    stream_name: String,
    client: C,
    created: Mutex<bool>,
    next_token: Mutex<Option<String>>,
}

impl<C: CloudStreamClient> CloudSink<C> {
    pub fn new(stream_name: impl Into<String>, client: C) -> Self {
        Self {
            stream_name: stream_name.into(),
            client,
            created: Mutex::new(false),
            next_token: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<C: CloudStreamClient> AuditSink for CloudSink<C> {
    async fn log(&self, record: &AuditRecord) -> Result<(), AuditError> {
        if !*self.created.lock() {
            self.client.ensure_stream(&self.stream_name).await?;
            *self.created.lock() = true;
        }

        let payload = serde_json::to_string(record)?;
        let token = self.next_token.lock().clone();
        let next = self.client.put(&self.stream_name, &payload, token.as_deref()).await?;
        *self.next_token.lock() = Some(next);
        Ok(())
    }

    fn name(&self) -> &str {
        "cloud"
    }
}

/// Reference [`CloudStreamClient`] used in tests and for local
/// development, holding appended records in memory.
#[derive(Default)]
pub struct InMemoryCloudStreamClient {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    created_streams: std::collections::HashSet<String>,
    records: Vec<(String, String)>,
    sequence: u64,
}

impl InMemoryCloudStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, String)> {
        self.state.lock().records.clone()
    }
}

#[async_trait]
impl CloudStreamClient for InMemoryCloudStreamClient {
    async fn ensure_stream(&self, stream_name: &str) -> Result<(), AuditError> {
        self.state.lock().created_streams.insert(stream_name.to_string());
        Ok(())
    }

    async fn put(&self, stream_name: &str, payload: &str, sequence_token: Option<&str>) -> Result<String, AuditError> {
        let mut state = self.state.lock();
        if !state.created_streams.contains(stream_name) {
            return Err(AuditError::Cloud(format!("stream '{stream_name}' does not exist")));
        }
        let expected = if state.sequence == 0 { None } else { Some(state.sequence.to_string()) };
        if sequence_token.map(str::to_string) != expected {
            return Err(AuditError::Cloud("stale sequence token".to_string()));
        }
        state.sequence += 1;
        let next = state.sequence.to_string();
        state.records.push((stream_name.to_string(), payload.to_string()));
        Ok(next)
    }
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    payload: &'a str,
    sequence_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    next_sequence_token: String,
}

#[derive(Debug, Deserialize)]
struct ConflictResponse {
    expected_sequence_token: Option<String>,
}

/// `CloudStreamClient` backed by a generic HTTP log-stream provider.
/// Stream creation is `POST {base_url}/streams`, treating a 409
/// (already exists) as success. A write is `PUT
/// {base_url}/streams/{name}/records`; a 409 response carries the
/// provider's expected sequence token, which this client retries
/// against exactly once before giving up.
pub struct HttpCloudStreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCloudStreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }

    async fn put_once(&self, stream_name: &str, payload: &str, sequence_token: Option<&str>) -> Result<String, PutOutcome> {
        let url = format!("{}/streams/{stream_name}/records", self.base_url);
        let response = self
            .client
            .put(&url)
            .json(&PutRequest { payload, sequence_token })
            .send()
            .await
            .map_err(|err| PutOutcome::Failed(AuditError::Cloud(err.to_string())))?;

        if response.status().is_success() {
            let body: PutResponse = response
                .json()
                .await
                .map_err(|err| PutOutcome::Failed(AuditError::Cloud(err.to_string())))?;
            return Ok(body.next_sequence_token);
        }

        if response.status() == reqwest::StatusCode::CONFLICT {
            let body: ConflictResponse = response
                .json()
                .await
                .map_err(|err| PutOutcome::Failed(AuditError::Cloud(err.to_string())))?;
            return Err(PutOutcome::StaleToken(body.expected_sequence_token));
        }

        Err(PutOutcome::Failed(AuditError::Cloud(format!("cloud sink returned status {}", response.status()))))
    }
}

enum PutOutcome {
    Failed(AuditError),
    StaleToken(Option<String>),
}

#[async_trait]
impl CloudStreamClient for HttpCloudStreamClient {
    async fn ensure_stream(&self, stream_name: &str) -> Result<(), AuditError> {
        let url = format!("{}/streams", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "name": stream_name }))
            .send()
            .await
            .map_err(|err| AuditError::Cloud(err.to_string()))?;

        if response.status().is_success() || response.status() == reqwest::StatusCode::CONFLICT {
            Ok(())
        } else {
            Err(AuditError::Cloud(format!("failed to create stream '{stream_name}': status {}", response.status())))
        }
    }

    async fn put(&self, stream_name: &str, payload: &str, sequence_token: Option<&str>) -> Result<String, AuditError> {
        match self.put_once(stream_name, payload, sequence_token).await {
            Ok(next) => Ok(next),
            Err(PutOutcome::Failed(err)) => Err(err),
            Err(PutOutcome::StaleToken(expected)) => {
                match self.put_once(stream_name, payload, expected.as_deref()).await {
                    Ok(next) => Ok(next),
                    Err(PutOutcome::Failed(err)) => Err(err),
                    Err(PutOutcome::StaleToken(_)) => Err(AuditError::Cloud("stale sequence token persisted after retry".to_string())),
                }
            }
        }
    }
}
