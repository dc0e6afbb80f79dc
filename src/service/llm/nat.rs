//! NAT execution service provider
//!
//! The service runs the agent workflow for a single input string and reports
//! the process outcome. It has no system prompt slot, so both prompts are sent
//! as one input.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Completion, CompletionProvider, CompletionRequest, ProviderError, status_error};

/// Seconds the service allows for process startup on top of the agent timeout
const EXECUTION_OVERHEAD_SECS: u64 = 10;

#[derive(Debug)]
pub struct NatExecutionProvider {
    client: Client,
    base_url: String,
    workflow: String,
}

impl NatExecutionProvider {
    pub fn new(base_url: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            workflow: workflow.into(),
        }
    }

    fn execute_url(&self) -> String {
        format!("{}/", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ExecutionRequest {
    input: String,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
struct ExecutionResponse {
    success: bool,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    returncode: i32,
}

/// Interpret an execution service response body
pub fn parse_execution_envelope(body: &str) -> Result<String, ProviderError> {
    let envelope: ExecutionResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Malformed execution service response: {}", e))
    })?;

    if !envelope.success || envelope.returncode != 0 {
        let detail = if envelope.stderr.is_empty() {
            format!("agent exited with code {}", envelope.returncode)
        } else {
            format!("agent exited with code {}: {}", envelope.returncode, envelope.stderr)
        };
        return Err(ProviderError::ExecutionFailed(detail));
    }

    if envelope.stdout.trim().is_empty() {
        return Err(ProviderError::InvalidResponse(
            "Execution service returned empty output".to_string(),
        ));
    }

    Ok(envelope.stdout)
}

fn agent_input(request: &CompletionRequest) -> String {
    if request.system.is_empty() {
        request.prompt.clone()
    } else {
        format!("{}\n\n{}", request.system, request.prompt)
    }
}

#[async_trait]
impl CompletionProvider for NatExecutionProvider {
    fn provider_id(&self) -> &'static str {
        "nat"
    }

    fn model(&self) -> &str {
        &self.workflow
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let start = Instant::now();

        let body = ExecutionRequest {
            input: agent_input(request),
            timeout: request
                .timeout
                .as_secs()
                .saturating_sub(EXECUTION_OVERHEAD_SECS)
                .max(1),
        };

        let response = self
            .client
            .post(self.execute_url())
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, request.timeout))?;

        if response.status() == reqwest::StatusCode::GATEWAY_TIMEOUT {
            return Err(ProviderError::Timeout(request.timeout.as_secs()));
        }

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let raw = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, request.timeout))?;
        let text = parse_execution_envelope(&raw)?;

        Ok(Completion {
            text,
            provider: self.provider_id().to_string(),
            model_id: request.model.clone().unwrap_or_else(|| self.workflow.clone()),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// The service only accepts POST, so any HTTP answer short of a 5xx counts
    async fn check_reachable(&self, timeout: Duration) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.execute_url())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;
        if response.status().is_server_error() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_successful_execution() {
        let body = r#"{"success": true, "stdout": "Workflow Result:\n{\"a\": 1}", "stderr": "", "returncode": 0}"#;
        let text = parse_execution_envelope(body).unwrap();
        assert!(text.contains(r#"{"a": 1}"#));
    }

    #[test]
    fn test_parse_failed_execution_carries_stderr() {
        let body = r#"{"success": false, "stdout": "", "stderr": "config not found", "returncode": 2}"#;
        match parse_execution_envelope(body).unwrap_err() {
            ProviderError::ExecutionFailed(msg) => {
                assert!(msg.contains("config not found"));
                assert!(msg.contains('2'));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_output() {
        let body = r#"{"success": true, "stdout": "  ", "stderr": "", "returncode": 0}"#;
        assert!(matches!(
            parse_execution_envelope(body),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_agent_input_joins_prompts() {
        let request = CompletionRequest {
            system: "You are a SOC analyst.".to_string(),
            prompt: "Classify this alert.".to_string(),
            max_tokens: 100,
            temperature: 0.0,
            top_p: 1.0,
            model: None,
            timeout: Duration::from_secs(90),
        };
        assert_eq!(
            agent_input(&request),
            "You are a SOC analyst.\n\nClassify this alert."
        );
    }
}
