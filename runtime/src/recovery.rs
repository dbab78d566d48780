use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tollgate_core::{HitlError, PendingInteraction, RecoverRequest, RecoverResponse, RecoveryReason};
use tracing::{debug, error, info};

use crate::collaborators::{Collaborators, RecoveryChoice, Severity};
use crate::config::RuntimeConfig;
use crate::session::SessionTracker;
use crate::util::{client, endpoint_url};

/// Server-side reconciliation call.
#[async_trait]
pub trait RecoveryEndpoint: Send + Sync {
    async fn recover(
        &self,
        session_id: &str,
        reason: RecoveryReason,
    ) -> Result<RecoverResponse, HitlError>;
}

/// `POST /api/workflow/{session_id}/recover` with `{ "reason": ... }`.
pub struct HttpRecoveryEndpoint {
    http: reqwest::Client,
    api_url: String,
}

impl HttpRecoveryEndpoint {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            http: client(),
            api_url: config.api_url.clone(),
        }
    }
}

#[async_trait]
impl RecoveryEndpoint for HttpRecoveryEndpoint {
    async fn recover(
        &self,
        session_id: &str,
        reason: RecoveryReason,
    ) -> Result<RecoverResponse, HitlError> {
        let url = endpoint_url(&self.api_url, &["api", "workflow", session_id, "recover"])?;
        let resp = self
            .http
            .post(url)
            .json(&RecoverRequest { reason })
            .send()
            .await
            .map_err(|e| HitlError::Network(e.to_string()))?;
        let status = resp.status().as_u16();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| HitlError::Network(format!("Failed to read recovery response: {e}")))?;
        if !(200..=299).contains(&status) {
            return Err(HitlError::Server {
                status,
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| HitlError::RecoveryFailure(format!("Unreadable recovery response: {e}")))
    }
}

/// Identities captured from the interaction that just closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: Option<String>,
    pub workflow_id: Option<String>,
}

impl SessionIdentity {
    pub fn of(interaction: &PendingInteraction) -> Self {
        Self {
            session_id: Some(interaction.session_id.clone()),
            workflow_id: interaction.workflow_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryReport {
    /// Nothing to reconcile.
    Skipped,
    Recovered {
        session_id: String,
        /// Whether the client's active-session pointer moved.
        active_changed: bool,
    },
    Failed {
        choice: RecoveryChoice,
    },
}

/// Reconciles the client's active-session pointer with the server after a
/// state-changing interaction. One attempt only; failures go to the human.
#[derive(Clone)]
pub struct SessionRecovery {
    endpoint: Arc<dyn RecoveryEndpoint>,
    tracker: SessionTracker,
    collaborators: Collaborators,
    dialog_delay: Duration,
}

impl SessionRecovery {
    pub fn new(
        endpoint: Arc<dyn RecoveryEndpoint>,
        tracker: SessionTracker,
        collaborators: Collaborators,
        dialog_delay: Duration,
    ) -> Self {
        Self {
            endpoint,
            tracker,
            collaborators,
            dialog_delay,
        }
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    /// Captured identity first; otherwise a still-pending interaction of the
    /// same workflow (or the oldest pending one when the workflow is unknown).
    pub fn resolve_session(
        closed: &SessionIdentity,
        pending: &[PendingInteraction],
    ) -> Option<String> {
        if let Some(session_id) = closed.session_id.as_deref().filter(|s| !s.trim().is_empty()) {
            return Some(session_id.to_string());
        }
        let candidate = match closed.workflow_id.as_deref() {
            Some(workflow_id) => pending
                .iter()
                .find(|p| p.workflow_id.as_deref() == Some(workflow_id)),
            None => pending.iter().min_by_key(|p| p.presented_at),
        };
        candidate.map(|p| p.session_id.clone())
    }

    pub async fn run(
        &self,
        closed: &SessionIdentity,
        pending: &[PendingInteraction],
        reason: RecoveryReason,
    ) -> RecoveryReport {
        let Some(session_id) = Self::resolve_session(closed, pending) else {
            debug!(reason = reason.as_str(), "no session to reconcile, skipping recovery");
            return RecoveryReport::Skipped;
        };

        let client_active = self.tracker.active();
        if client_active.as_deref() != Some(session_id.as_str()) {
            debug!(
                session_id = %session_id,
                client_active = ?client_active,
                "client active session differs from interaction session"
            );
        }

        match self.endpoint.recover(&session_id, reason).await {
            Ok(resp) if resp.success => {
                let confirmed = resp.session_id.unwrap_or_else(|| session_id.clone());
                let active_changed = self.tracker.set_active(confirmed.clone());
                info!(
                    session_id = %confirmed,
                    reason = reason.as_str(),
                    active_changed,
                    "session recovered"
                );
                self.collaborators
                    .status
                    .report("Session state synchronized", Severity::Success);
                RecoveryReport::Recovered {
                    session_id: confirmed,
                    active_changed,
                }
            }
            Ok(resp) => {
                let detail = resp
                    .message
                    .unwrap_or_else(|| "server reported failure".to_string());
                self.escalate(&session_id, HitlError::RecoveryFailure(detail))
                    .await
            }
            Err(e) => self.escalate(&session_id, e).await,
        }
    }

    async fn escalate(&self, session_id: &str, err: HitlError) -> RecoveryReport {
        error!(session_id, error = %err, "session recovery failed");
        self.collaborators
            .status
            .report(&format!("Session recovery failed: {err}"), Severity::Error);
        tokio::time::sleep(self.dialog_delay).await;

        let choice = self
            .collaborators
            .presenter
            .prompt_recovery(
                "The conversation may be out of sync with the server. \
                 Reload to resynchronize, or continue with the current state.",
            )
            .await;
        match choice {
            RecoveryChoice::Reload => {
                info!(session_id, "user chose reload after failed recovery");
                self.collaborators.reload.reload();
            }
            RecoveryChoice::Continue => {
                info!(session_id, "user chose to continue with possibly stale state");
                self.collaborators.status.report(
                    "Continuing without resynchronizing; reload if the conversation looks wrong",
                    Severity::Warning,
                );
            }
        }
        RecoveryReport::Failed { choice }
    }
}
