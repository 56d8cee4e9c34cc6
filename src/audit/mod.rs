//! Audit sinks and fan-out.
//!
//! Every decision the engine produces is submitted to every configured
//! sink exactly once. A sink's failure is logged out-of-band and never
//! prevents other sinks from receiving the record, and never affects
//! the decision already returned to the caller.

mod cloud;
mod file;
mod http;
mod syslog;

pub use cloud::{CloudSink, CloudStreamClient, HttpCloudStreamClient, InMemoryCloudStreamClient};
pub use file::FileSink;
pub use http::HttpSink;
pub use syslog::{SyslogFacility, SyslogSink, SyslogTransport};

use async_trait::async_trait;
use tracing::warn;

use crate::error::AuditError;
use crate::types::AuditRecord;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// A short tag used in failure log lines.
    fn name(&self) -> &str;
}

/// Holds the configured sinks in the order they were registered and
/// fans a record out to all of them sequentially.
#[derive(Default)]
pub struct AuditFanout {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl AuditFanout {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn AuditSink>) {
        self.sinks.push(sink);
    }

    /// Submit `record` to every sink, in configuration order. A
    /// failing sink is logged and does not stop the remaining sinks
    /// from being attempted.
    pub async fn log_all(&self, record: &AuditRecord) {
        for sink in &self.sinks {
            if let Err(err) = sink.log(record).await {
                warn!(sink = sink.name(), error = %err, "audit sink failed");
            }
        }
    }
}
