//! HTTP audit sink: POST the JSON audit record, configurable headers
//! and timeout. A non-2xx response is a sink failure.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::AuditSink;
use crate::error::AuditError;
use crate::types::AuditRecord;

pub struct HttpSink {
    url: String,
    headers: HashMap<String, String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>, timeout: Duration) -> Self {
        Self { url: url.into(), headers, timeout, client: reqwest::Client::new() }
    }
}

#[async_trait]
impl AuditSink for HttpSink {
    async fn log(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut builder = self.client.post(&self.url).timeout(self.timeout).json(record);
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|err| AuditError::HttpTransport(err.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuditError::HttpStatus(response.status().as_u16()))
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
