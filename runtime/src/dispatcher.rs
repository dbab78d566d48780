use std::sync::Arc;
use std::time::Duration;

use tollgate_core::{
    DeliveryPath, Envelope, ExecutionResult, FailureReason, HitlError, HitlResponse,
    InteractionOutcome,
};
use tracing::{debug, error, info, warn};

use crate::channel::DuplexChannel;
use crate::config::RuntimeConfig;
use crate::util::{client, endpoint_url, parse_response_body};

/// Delivers human decisions to the workflow engine.
///
/// Prefers the duplex channel; otherwise POSTs to
/// `/api/workflow/{session_id}/response` under a bounded timeout. Every
/// transport failure is folded into an [`InteractionOutcome`].
#[derive(Clone)]
pub struct ResponseDispatcher {
    http: reqwest::Client,
    api_url: String,
    timeout: Duration,
    channel: Option<Arc<dyn DuplexChannel>>,
}

impl ResponseDispatcher {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            http: client(),
            api_url: config.api_url.clone(),
            timeout: config.response_timeout,
            channel: None,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn DuplexChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub async fn send(&self, response: &HitlResponse) -> InteractionOutcome {
        let Some(session_id) = response.routable_session_id() else {
            warn!(
                event_type = %response.event_type,
                "refusing to dispatch response without a session id"
            );
            return InteractionOutcome::not_delivered(FailureReason::NoSessionContext, None);
        };

        if let (Some(channel), Some(workflow_id)) = (&self.channel, response.workflow_id.as_deref())
        {
            if channel.is_open(workflow_id) {
                let envelope = Envelope::hitl_response(response.clone());
                match channel.send(workflow_id, &envelope).await {
                    Ok(()) => {
                        info!(
                            session_id,
                            workflow_id,
                            event_type = %response.event_type,
                            "response sent over duplex channel"
                        );
                        return InteractionOutcome::Delivered {
                            via: DeliveryPath::Duplex,
                            execution_result: None,
                        };
                    }
                    Err(e) => {
                        warn!(
                            session_id,
                            workflow_id,
                            error = %e,
                            "duplex send failed, falling back to HTTP"
                        );
                    }
                }
            }
        }

        self.send_fallback(session_id, response).await
    }

    async fn send_fallback(&self, session_id: &str, response: &HitlResponse) -> InteractionOutcome {
        let url = match endpoint_url(&self.api_url, &["api", "workflow", session_id, "response"]) {
            Ok(url) => url,
            Err(e) => {
                error!(session_id, error = %e, "cannot build response URL");
                return InteractionOutcome::not_delivered(
                    FailureReason::NetworkError,
                    Some(e.to_string()),
                );
            }
        };

        debug!(session_id, %url, timeout_ms = self.timeout.as_millis() as u64, "posting response");
        // Dropping the future on timeout aborts the in-flight request.
        let call = async {
            let resp = self.http.post(url).json(response).send().await?;
            let status = resp.status().as_u16();
            let bytes = resp.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let (status, bytes) = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                let err = HitlError::Timeout(self.timeout);
                error!(session_id, error = %err, "response delivery timed out");
                return InteractionOutcome::not_delivered(
                    FailureReason::Timeout,
                    Some(err.to_string()),
                );
            }
            Ok(Err(e)) => {
                let err = HitlError::Network(e.to_string());
                error!(session_id, error = %err, "response delivery failed");
                return InteractionOutcome::not_delivered(
                    FailureReason::NetworkError,
                    Some(err.to_string()),
                );
            }
            Ok(Ok(parts)) => parts,
        };

        if !(200..=299).contains(&status) {
            let err = HitlError::Server {
                status,
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            };
            error!(session_id, status, error = %err, "workflow engine rejected response");
            return InteractionOutcome::not_delivered(
                FailureReason::ServerError,
                Some(err.to_string()),
            );
        }

        let body = parse_response_body(&bytes);
        let execution_result = ExecutionResult::from_body(&body);
        info!(
            session_id,
            status,
            has_result = execution_result.is_some(),
            "response delivered over HTTP"
        );
        InteractionOutcome::Delivered {
            via: DeliveryPath::Fallback,
            execution_result,
        }
    }
}
