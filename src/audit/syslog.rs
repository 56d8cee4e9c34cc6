//! Syslog sink: RFC 5424 framing over UDP (datagram, default) or TCP
//! (octet-counted stream), configurable facility.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;

use super::AuditSink;
use crate::error::AuditError;
use crate::types::AuditRecord;

/// Syslog facility codes relevant to a governance middleware; see
/// RFC 5424 §6.2.1.
#[derive(Debug, Clone, Copy)]
pub enum SyslogFacility {
    User,
    Security,
    Local0,
    Local1,
}

impl SyslogFacility {
    fn code(self) -> u8 {
        match self {
            SyslogFacility::User => 1,
            SyslogFacility::Security => 4,
            SyslogFacility::Local0 => 16,
            SyslogFacility::Local1 => 17,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SyslogTransport {
    Udp,
    Tcp,
}

pub struct SyslogSink {
    remote: SocketAddr,
    facility: SyslogFacility,
    app_name: String,
    transport: SyslogTransport,
    udp: Mutex<Option<UdpSocket>>,
}

impl SyslogSink {
    pub fn new(remote: SocketAddr, facility: SyslogFacility, app_name: impl Into<String>, transport: SyslogTransport) -> Self {
        Self {
            remote,
            facility,
            app_name: app_name.into(),
            transport,
            udp: Mutex::new(None),
        }
    }

    fn severity_for(allow: bool) -> u8 {
        // informational for allows, notice for denies — RFC 5424 §6.2.1.
        if allow { 6 } else { 5 }
    }

    fn format_message(&self, record: &AuditRecord) -> String {
        let pri = self.facility.code() as u32 * 8 + Self::severity_for(record.allow) as u32;
        let timestamp = record.timestamp.to_rfc3339();
        let hostname = "-";
        let procid = std::process::id();
        let msgid = record.correlation_id.to_string();
        let msg = serde_json::to_string(record).unwrap_or_else(|_| record.reason.clone());
        format!(
            "<{pri}>1 {timestamp} {hostname} {app} {procid} {msgid} - {msg}",
            app = self.app_name,
        )
    }

    async fn send_udp(&self, message: &str) -> Result<(), AuditError> {
        let mut guard = self.udp.lock().await;
        if guard.is_none() {
            let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(|e| AuditError::Syslog(e.to_string()))?;
            *guard = Some(socket);
        }
        let socket = guard.as_ref().expect("bound above");
        socket
            .send_to(message.as_bytes(), self.remote)
            .await
            .map_err(|e| AuditError::Syslog(e.to_string()))?;
        Ok(())
    }

    async fn send_tcp(&self, message: &str) -> Result<(), AuditError> {
        let mut stream = TcpStream::connect(self.remote).await.map_err(|e| AuditError::Syslog(e.to_string()))?;
        let framed = format!("{} {}", message.len(), message);
        stream
            .write_all(framed.as_bytes())
            .await
            .map_err(|e| AuditError::Syslog(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for SyslogSink {
    async fn log(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let message = self.format_message(record);
        match self.transport {
            SyslogTransport::Udp => self.send_udp(&message).await,
            SyslogTransport::Tcp => self.send_tcp(&message).await,
        }
    }

    fn name(&self) -> &str {
        "syslog"
    }
}
