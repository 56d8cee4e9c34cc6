//! Policy that delegates evaluation to a remote decision service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{GovernanceDecision, GovernanceRequest};

use super::Policy;

/// POSTs `{"input": {...}}` to `endpoint + path` and expects either
/// `{"result": bool}` or `{"allow": bool, "reason": string}` back. On
/// any transport error or non-2xx response, falls back to
/// `default_allow` with reason `"decision service unavailable"`.
pub struct DelegatingPolicy {
    endpoint: String,
    path: String,
    headers: HashMap<String, String>,
    timeout: Duration,
    default_allow: bool,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct DelegateRequestBody<'a> {
    input: DelegateInput<'a>,
}

#[derive(Serialize)]
struct DelegateInput<'a> {
    agent_id: &'a str,
    tool_name: &'a str,
    function_name: &'a str,
    arguments: &'a crate::types::ValueMap,
    context: &'a crate::types::ValueMap,
    correlation_id: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DelegateResponse {
    ResultOnly { result: bool },
    AllowReason { allow: bool, reason: Option<String> },
}

impl DelegatingPolicy {
    pub fn new(
        endpoint: impl Into<String>,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        timeout: Duration,
        default_allow: bool,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            path: path.into(),
            headers,
            timeout,
            default_allow,
            client: reqwest::Client::new(),
        }
    }

    fn fail_closed(&self) -> GovernanceDecision {
        if self.default_allow {
            GovernanceDecision::allow("decision service unavailable")
        } else {
            GovernanceDecision::deny("decision service unavailable")
        }
    }

    async fn call(&self, request: &GovernanceRequest) -> Option<GovernanceDecision> {
        let url = format!("{}{}", self.endpoint, self.path);
        let body = DelegateRequestBody {
            input: DelegateInput {
                agent_id: &request.agent_id,
                tool_name: &request.tool_name,
                function_name: &request.function_name,
                arguments: &request.arguments,
                context: &request.context,
                correlation_id: request.correlation_id.to_string(),
                timestamp: request.timestamp.into(),
            },
        };

        let mut builder = self.client.post(&url).timeout(self.timeout).json(&body);
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "decision service request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "decision service returned non-2xx");
            return None;
        }

        match response.json::<DelegateResponse>().await {
            Ok(DelegateResponse::ResultOnly { result }) => Some(if result {
                GovernanceDecision::allow("decision service allowed")
            } else {
                GovernanceDecision::deny("decision service denied")
            }),
            Ok(DelegateResponse::AllowReason { allow, reason }) => {
                let reason = reason.unwrap_or_else(|| {
                    if allow { "decision service allowed".to_string() } else { "decision service denied".to_string() }
                });
                Some(if allow { GovernanceDecision::allow(reason) } else { GovernanceDecision::deny(reason) })
            }
            Err(err) => {
                warn!(error = %err, "decision service response did not match expected shape");
                None
            }
        }
    }
}

#[async_trait]
impl Policy for DelegatingPolicy {
    async fn evaluate(&self, request: &GovernanceRequest) -> GovernanceDecision {
        match self.call(request).await {
            Some(decision) => decision,
            None => self.fail_closed(),
        }
    }

    fn kind(&self) -> &'static str {
        "delegating"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
