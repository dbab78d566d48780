use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Value, json};
use tokio::sync::oneshot;
use tollgate_core::{
    ExecutionResult, FailureReason, HitlError, HitlResponse, InteractionDraft, InteractionId,
    InteractionKind, InteractionOutcome, InteractionPayload, InteractionStage, PendingInteraction,
    RecoveryReason, ResponseFields,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::channel::DuplexChannel;
use crate::collaborators::{Collaborators, Severity, TranscriptEntry, TranscriptRole};
use crate::config::RuntimeConfig;
use crate::dispatcher::ResponseDispatcher;
use crate::recovery::{
    HttpRecoveryEndpoint, RecoveryEndpoint, RecoveryReport, SessionIdentity, SessionRecovery,
};
use crate::registry::InteractionRegistry;
use crate::session::SessionTracker;

pub struct HitlControllerBuilder {
    config: RuntimeConfig,
    collaborators: Collaborators,
    channel: Option<Arc<dyn DuplexChannel>>,
    recovery_endpoint: Option<Arc<dyn RecoveryEndpoint>>,
    tracker: Option<SessionTracker>,
}

impl HitlControllerBuilder {
    pub fn channel(mut self, channel: Arc<dyn DuplexChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn recovery_endpoint(mut self, endpoint: Arc<dyn RecoveryEndpoint>) -> Self {
        self.recovery_endpoint = Some(endpoint);
        self
    }

    pub fn session_tracker(mut self, tracker: SessionTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn build(self) -> HitlController {
        let mut dispatcher = ResponseDispatcher::new(&self.config);
        if let Some(channel) = self.channel {
            dispatcher = dispatcher.with_channel(channel);
        }
        let endpoint = self
            .recovery_endpoint
            .unwrap_or_else(|| Arc::new(HttpRecoveryEndpoint::new(&self.config)));
        let recovery = SessionRecovery::new(
            endpoint,
            self.tracker.unwrap_or_default(),
            self.collaborators.clone(),
            self.config.recovery_dialog_delay,
        );
        HitlController {
            inner: Arc::new(Inner {
                config: self.config,
                registry: Mutex::new(InteractionRegistry::new()),
                waiters: Mutex::new(HashMap::new()),
                dispatcher,
                recovery,
                collaborators: self.collaborators,
            }),
        }
    }
}

struct Inner {
    config: RuntimeConfig,
    registry: Mutex<InteractionRegistry>,
    /// Approvals waiting for an execution result delivered out of band.
    waiters: Mutex<HashMap<InteractionId, oneshot::Sender<ExecutionResult>>>,
    dispatcher: ResponseDispatcher,
    recovery: SessionRecovery,
    collaborators: Collaborators,
}

/// Drives every pending interaction from presentation to retirement.
///
/// Cloning is cheap; each user action may run as its own task. Registry
/// locks are never held across an `.await`.
#[derive(Clone)]
pub struct HitlController {
    inner: Arc<Inner>,
}

impl HitlController {
    pub fn builder(config: RuntimeConfig, collaborators: Collaborators) -> HitlControllerBuilder {
        HitlControllerBuilder {
            config,
            collaborators,
            channel: None,
            recovery_endpoint: None,
            tracker: None,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn session_tracker(&self) -> &SessionTracker {
        self.inner.recovery.tracker()
    }

    fn registry(&self) -> MutexGuard<'_, InteractionRegistry> {
        self.inner.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<InteractionId, oneshot::Sender<ExecutionResult>>> {
        self.inner.waiters.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `draft` and show it.
    pub fn present(&self, draft: InteractionDraft) -> Result<InteractionId, HitlError> {
        let interaction = {
            let mut registry = self.registry();
            let id = registry.register(draft)?;
            registry
                .get(&id)
                .cloned()
                .ok_or(HitlError::UnknownInteraction(id))?
        };
        info!(
            interaction_id = %interaction.id,
            kind = interaction.kind().as_str(),
            session_id = %interaction.session_id,
            workflow_id = ?interaction.workflow_id,
            "interaction presented"
        );
        self.inner.collaborators.presenter.present(&interaction);
        Ok(interaction.id)
    }

    pub fn get(&self, id: &InteractionId) -> Option<PendingInteraction> {
        self.registry().get(id).cloned()
    }

    /// Live interactions, oldest first.
    pub fn pending(&self) -> Vec<PendingInteraction> {
        self.registry().snapshot()
    }

    pub fn count(&self) -> usize {
        self.registry().count()
    }

    pub fn has_active(&self) -> bool {
        self.registry().has_active()
    }

    /// Enter the edit sub-flow. Returns the editable copy of the command.
    pub fn begin_modify(&self, id: &InteractionId) -> Result<String, HitlError> {
        let interaction = self.transition(
            id,
            "modify",
            InteractionKind::CommandApproval,
            InteractionStage::Presented,
            |entry| {
                entry.draft_command = entry.command().map(str::to_string);
                entry.stage = InteractionStage::ModificationEditing;
            },
        )?;
        let draft = interaction.draft_command.unwrap_or_default();
        debug!(interaction_id = %id, "command modification started");
        self.inner.collaborators.presenter.show_editor(id, &draft);
        Ok(draft)
    }

    /// Leave the edit sub-flow without submitting; the original command is shown again.
    pub fn cancel_modify(&self, id: &InteractionId) -> Result<(), HitlError> {
        let interaction = self.transition(
            id,
            "cancel modification of",
            InteractionKind::CommandApproval,
            InteractionStage::ModificationEditing,
            |entry| {
                entry.draft_command = None;
                entry.stage = InteractionStage::Presented;
            },
        )?;
        debug!(interaction_id = %id, "command modification cancelled");
        self.inner.collaborators.presenter.present(&interaction);
        Ok(())
    }

    pub async fn approve(&self, id: &InteractionId) -> Result<InteractionStage, HitlError> {
        let interaction = self.transition(
            id,
            "approve",
            InteractionKind::CommandApproval,
            InteractionStage::Presented,
            |entry| entry.stage = InteractionStage::Submitting,
        )?;
        info!(interaction_id = %id, session_id = %interaction.session_id, "command approved");
        Ok(self.execute_command(interaction).await)
    }

    /// Submit the edited command. Always executes.
    pub async fn submit_modified(
        &self,
        id: &InteractionId,
        command: impl Into<String>,
    ) -> Result<InteractionStage, HitlError> {
        let command = command.into();
        if command.trim().is_empty() {
            return Err(HitlError::InvalidInteraction(
                "edited command must not be empty".to_string(),
            ));
        }
        let interaction = self.transition(
            id,
            "submit modified command for",
            InteractionKind::CommandApproval,
            InteractionStage::ModificationEditing,
            |entry| {
                entry.supersede_command(command);
                entry.stage = InteractionStage::Submitting;
            },
        )?;
        info!(
            interaction_id = %id,
            session_id = %interaction.session_id,
            "modified command submitted"
        );
        Ok(self.execute_command(interaction).await)
    }

    pub async fn reject(&self, id: &InteractionId) -> Result<InteractionStage, HitlError> {
        let interaction = self.transition(
            id,
            "reject",
            InteractionKind::CommandApproval,
            InteractionStage::Presented,
            |entry| entry.stage = InteractionStage::Submitting,
        )?;
        let command = interaction.command().unwrap_or_default().to_string();
        self.inner
            .collaborators
            .presenter
            .update_progress(id, "Sending rejection...");

        let response = HitlResponse::for_interaction(
            &interaction,
            ResponseFields::Command {
                execute: false,
                command: command.clone(),
            },
        );
        // A rejection never waits for or renders an execution result.
        match self.inner.dispatcher.send(&response).await {
            InteractionOutcome::Delivered { .. } => {
                info!(interaction_id = %id, "command rejected");
                let entry = transcript_entry(
                    &interaction,
                    TranscriptRole::User,
                    format!("Rejected command: `{command}`"),
                    json!({ "decision": "rejected" }),
                );
                Ok(self.resolve(&interaction, entry).await)
            }
            InteractionOutcome::NotDelivered { reason, detail } => {
                Ok(self.fail(&interaction, reason, detail).await)
            }
        }
    }

    /// Answer a text prompt. A blank answer falls back to the prompt's default value.
    pub async fn submit_text(
        &self,
        id: &InteractionId,
        input: impl Into<String>,
    ) -> Result<InteractionStage, HitlError> {
        let input = input.into();
        self.submit_single(id, InteractionKind::TextInput, "answer", move |interaction| {
            let input = match &interaction.payload {
                InteractionPayload::TextInput {
                    default_value: Some(default),
                    ..
                } if input.trim().is_empty() => default.clone(),
                _ => input,
            };
            (ResponseFields::Input { input: input.clone() }, input)
        })
        .await
    }

    pub async fn confirm(
        &self,
        id: &InteractionId,
        confirmed: bool,
    ) -> Result<InteractionStage, HitlError> {
        self.submit_single(id, InteractionKind::Confirmation, "confirm", move |_| {
            let summary = if confirmed { "Confirmed" } else { "Declined" };
            (ResponseFields::Confirmation { confirmed }, summary.to_string())
        })
        .await
    }

    pub async fn submit_feedback(
        &self,
        id: &InteractionId,
        feedback: impl Into<String>,
    ) -> Result<InteractionStage, HitlError> {
        let feedback = feedback.into();
        self.submit_single(id, InteractionKind::Feedback, "give feedback on", move |_| {
            (
                ResponseFields::Feedback {
                    feedback: feedback.clone(),
                },
                feedback,
            )
        })
        .await
    }

    /// The UI surface was closed without an answer. Always retires the entry.
    pub fn dismiss(&self, id: &InteractionId) -> bool {
        let removed = self.registry().remove(id).is_some();
        self.waiters().remove(id);
        if removed {
            debug!(interaction_id = %id, "interaction dismissed");
            self.inner.collaborators.presenter.close(id);
        }
        removed
    }

    /// Hand an out-of-band execution result to the oldest approval of
    /// `session_id` still waiting for one.
    pub fn deliver_execution_result(
        &self,
        session_id: &str,
        result: ExecutionResult,
    ) -> Option<InteractionId> {
        let id = {
            let registry = self.registry();
            let waiters = self.waiters();
            registry
                .snapshot()
                .into_iter()
                .find(|entry| {
                    entry.kind() == InteractionKind::CommandApproval
                        && entry.stage == InteractionStage::Submitting
                        && entry.session_id == session_id
                        && waiters.contains_key(&entry.id)
                })
                .map(|entry| entry.id)?
        };
        let sender = self.waiters().remove(&id)?;
        sender.send(result).ok()?;
        debug!(interaction_id = %id, session_id, "execution result matched");
        Some(id)
    }

    /// Reconcile after the engine reports that a workflow finished.
    pub async fn recover_after_workflow(
        &self,
        session_id: Option<String>,
        workflow_id: Option<String>,
    ) -> RecoveryReport {
        self.recover(
            SessionIdentity {
                session_id,
                workflow_id,
            },
            RecoveryReason::PostWorkflowCompletion,
        )
        .await
    }

    fn transition(
        &self,
        id: &InteractionId,
        action: &'static str,
        kind: InteractionKind,
        from: InteractionStage,
        apply: impl FnOnce(&mut PendingInteraction),
    ) -> Result<PendingInteraction, HitlError> {
        let mut registry = self.registry();
        let entry = registry
            .get_mut(id)
            .ok_or_else(|| HitlError::UnknownInteraction(id.clone()))?;
        if entry.kind() != kind || entry.stage != from {
            return Err(HitlError::InvalidTransition {
                id: id.clone(),
                from: entry.stage,
                action,
            });
        }
        apply(entry);
        Ok(entry.clone())
    }

    /// No-op when the entry was already retired (e.g. dismissed mid-flight).
    fn set_stage(&self, id: &InteractionId, stage: InteractionStage) {
        if let Some(entry) = self.registry().get_mut(id) {
            entry.stage = stage;
        }
    }

    fn retire(&self, id: &InteractionId) {
        self.registry().remove(id);
        self.waiters().remove(id);
        self.inner.collaborators.presenter.close(id);
    }

    async fn submit_single(
        &self,
        id: &InteractionId,
        kind: InteractionKind,
        action: &'static str,
        build: impl FnOnce(&PendingInteraction) -> (ResponseFields, String),
    ) -> Result<InteractionStage, HitlError> {
        let interaction = self.transition(id, action, kind, InteractionStage::Presented, |entry| {
            entry.stage = InteractionStage::Submitting
        })?;
        let (fields, summary) = build(&interaction);
        self.inner
            .collaborators
            .presenter
            .update_progress(id, "Submitting...");

        let response = HitlResponse::for_interaction(&interaction, fields);
        match self.inner.dispatcher.send(&response).await {
            InteractionOutcome::Delivered { .. } => {
                info!(interaction_id = %id, kind = kind.as_str(), "response delivered");
                let entry =
                    transcript_entry(&interaction, TranscriptRole::User, summary, json!({}));
                Ok(self.resolve(&interaction, entry).await)
            }
            InteractionOutcome::NotDelivered { reason, detail } => {
                Ok(self.fail(&interaction, reason, detail).await)
            }
        }
    }

    async fn execute_command(&self, interaction: PendingInteraction) -> InteractionStage {
        let id = interaction.id.clone();
        let command = interaction.command().unwrap_or_default().to_string();
        // Working indication only; nothing has run yet.
        self.inner
            .collaborators
            .presenter
            .update_progress(&id, &format!("Sending `{command}` for execution..."));

        let (tx, rx) = oneshot::channel();
        self.waiters().insert(id.clone(), tx);

        let response = HitlResponse::for_interaction(
            &interaction,
            ResponseFields::Command {
                execute: true,
                command: command.clone(),
            },
        );
        match self.inner.dispatcher.send(&response).await {
            InteractionOutcome::NotDelivered { reason, detail } => {
                self.waiters().remove(&id);
                self.fail(&interaction, reason, detail).await
            }
            InteractionOutcome::Delivered {
                execution_result: Some(result),
                ..
            } => {
                self.waiters().remove(&id);
                self.finish_with_result(&interaction, result).await
            }
            InteractionOutcome::Delivered {
                execution_result: None,
                via,
            } => {
                debug!(interaction_id = %id, via = via.as_str(), "awaiting execution result");
                self.inner
                    .collaborators
                    .presenter
                    .update_progress(&id, "Waiting for command output...");
                match tokio::time::timeout(self.inner.config.approval_result_grace, rx).await {
                    Ok(Ok(result)) => self.finish_with_result(&interaction, result).await,
                    // Sender dropped: the user dismissed the surface while waiting.
                    Ok(Err(_)) => self.finish_dismissed(&interaction).await,
                    Err(_) => {
                        self.waiters().remove(&id);
                        self.finish_without_result(&interaction, &command).await
                    }
                }
            }
        }
    }

    async fn finish_with_result(
        &self,
        interaction: &PendingInteraction,
        result: ExecutionResult,
    ) -> InteractionStage {
        let id = &interaction.id;
        self.set_stage(id, InteractionStage::Resolved);
        info!(
            interaction_id = %id,
            exit_code = ?result.exit_code,
            success = result.success,
            "command executed"
        );
        self.inner.collaborators.presenter.show_result(id, &result);
        let command = if result.command.is_empty() {
            interaction.command().unwrap_or_default()
        } else {
            result.command.as_str()
        };
        self.inner.collaborators.transcript.append(transcript_entry(
            interaction,
            TranscriptRole::System,
            describe_result(command, &result),
            json!({ "execution_result": result }),
        ));

        tokio::time::sleep(self.inner.config.result_display).await;
        self.retire(id);
        self.recover(SessionIdentity::of(interaction), RecoveryReason::HieCompletion)
            .await;
        InteractionStage::Resolved
    }

    /// Availability over confirmation: the command was delivered but no result
    /// arrived within the grace period, so the interaction closes as sent.
    async fn finish_without_result(
        &self,
        interaction: &PendingInteraction,
        command: &str,
    ) -> InteractionStage {
        let id = &interaction.id;
        warn!(
            interaction_id = %id,
            grace_ms = self.inner.config.approval_result_grace.as_millis() as u64,
            "no execution result received, closing as submitted"
        );
        self.set_stage(id, InteractionStage::Resolved);
        self.inner.collaborators.status.report(
            "Command sent; no output was reported back",
            Severity::Info,
        );
        self.inner.collaborators.transcript.append(transcript_entry(
            interaction,
            TranscriptRole::System,
            format!("Command `{command}` was sent for execution. No result was reported."),
            json!({ "execution_result": Value::Null }),
        ));
        self.retire(id);
        self.recover(SessionIdentity::of(interaction), RecoveryReason::HieCompletion)
            .await;
        InteractionStage::Resolved
    }

    /// The command was delivered, so the session is still reconciled; the
    /// surface is already closed and gets no transcript entry.
    async fn finish_dismissed(&self, interaction: &PendingInteraction) -> InteractionStage {
        debug!(interaction_id = %interaction.id, "approval dismissed while awaiting its result");
        self.recover(SessionIdentity::of(interaction), RecoveryReason::HieCompletion)
            .await;
        InteractionStage::Resolved
    }

    async fn resolve(
        &self,
        interaction: &PendingInteraction,
        entry: TranscriptEntry,
    ) -> InteractionStage {
        self.set_stage(&interaction.id, InteractionStage::Resolved);
        self.inner.collaborators.transcript.append(entry);
        self.retire(&interaction.id);
        self.recover(SessionIdentity::of(interaction), RecoveryReason::HieCompletion)
            .await;
        InteractionStage::Resolved
    }

    /// Failed interactions are retired, never retried.
    async fn fail(
        &self,
        interaction: &PendingInteraction,
        reason: FailureReason,
        detail: Option<String>,
    ) -> InteractionStage {
        let id = &interaction.id;
        self.set_stage(id, InteractionStage::Failed);
        error!(
            interaction_id = %id,
            reason = reason.as_str(),
            detail = detail.as_deref().unwrap_or(""),
            "interaction failed"
        );
        let message = format!("Could not deliver your response: {}", reason.describe());
        self.inner
            .collaborators
            .status
            .report(&message, Severity::Error);
        if interaction.kind() == InteractionKind::CommandApproval {
            let inline = match &detail {
                Some(detail) => format!("{message} ({detail})"),
                None => message,
            };
            self.inner.collaborators.presenter.show_failure(id, &inline);
            tokio::time::sleep(self.inner.config.failure_close_delay).await;
        }
        self.retire(id);
        InteractionStage::Failed
    }

    async fn recover(&self, closed: SessionIdentity, reason: RecoveryReason) -> RecoveryReport {
        let pending = self.pending();
        self.inner.recovery.run(&closed, &pending, reason).await
    }
}

fn transcript_entry(
    interaction: &PendingInteraction,
    role: TranscriptRole,
    content: String,
    extra: Value,
) -> TranscriptEntry {
    let mut metadata = json!({
        "interaction_id": interaction.id,
        "kind": interaction.kind().as_str(),
        "session_id": interaction.session_id,
        "workflow_id": interaction.workflow_id,
    });
    if let (Some(target), Value::Object(extra)) = (metadata.as_object_mut(), extra) {
        target.extend(extra);
    }
    TranscriptEntry {
        role,
        content,
        message_id: format!("hitl-{}", Uuid::now_v7()),
        metadata,
    }
}

fn describe_result(command: &str, result: &ExecutionResult) -> String {
    let status = match result.exit_code {
        Some(code) => format!("exited with code {code}"),
        None if result.success => "completed".to_string(),
        None => "failed".to_string(),
    };
    let mut content = format!("Command `{command}` {status}.");
    for (label, stream) in [("stdout", &result.stdout), ("stderr", &result.stderr)] {
        if let Some(text) = stream.as_deref().map(str::trim_end).filter(|t| !t.is_empty()) {
            content.push_str(&format!("\n\n{label}:\n{text}"));
        }
    }
    content
}
