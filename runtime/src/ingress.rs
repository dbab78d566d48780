use serde_json::Value;
use tokio::runtime::Handle;
use tollgate_core::events::names;
use tollgate_core::{
    ExecutionResult, HitlError, IngressMessage, InteractionDraft, InteractionId, InteractionKind,
    InteractionPayload,
};
use tracing::{debug, warn};

use crate::controller::HitlController;
use crate::util::read_json_string;

/// What the adapter did with one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressAction {
    Presented(InteractionId),
    /// Known event that needs no UI action.
    Acknowledged,
    ResultMatched(InteractionId),
    RecoveryScheduled,
    /// Known request event whose payload could not be registered.
    Invalid(String),
    Dropped,
}

/// Maps named inbound events onto controller calls. Never fails.
///
/// Background work (post-completion recovery) runs on the runtime current at
/// construction, so events may be fed from threads outside that runtime.
#[derive(Clone)]
pub struct EventIngress {
    controller: HitlController,
    runtime: Option<Handle>,
}

impl EventIngress {
    pub fn new(controller: HitlController) -> Self {
        Self {
            controller,
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn on_message(&self, message: &IngressMessage) -> IngressAction {
        self.on_event(
            &message.event_type,
            &message.data,
            message.workflow_id.as_deref(),
        )
    }

    pub fn on_event(
        &self,
        event_type: &str,
        data: &Value,
        workflow_id: Option<&str>,
    ) -> IngressAction {
        let workflow_id = workflow_id
            .map(str::to_string)
            .filter(|w| !w.trim().is_empty())
            .or_else(|| read_json_string(data, &["workflow_id"]));

        if let Some(kind) = InteractionKind::from_request_event(event_type) {
            return self.open(kind, data, workflow_id);
        }
        match event_type {
            names::SESSION_PROTECTION => {
                debug!(workflow_id = ?workflow_id, "session protection acknowledged");
                IngressAction::Acknowledged
            }
            names::CLI_EXECUTION_RESULT => self.execution_result(data),
            names::WORKFLOW_COMPLETED => self.workflow_completed(data, workflow_id),
            other => {
                warn!(event_type = other, "dropping unknown event");
                IngressAction::Dropped
            }
        }
    }

    fn open(
        &self,
        kind: InteractionKind,
        data: &Value,
        workflow_id: Option<String>,
    ) -> IngressAction {
        let registered = payload_from(kind, data).and_then(|payload| {
            self.controller.present(InteractionDraft::new(
                read_json_string(data, &["session_id"]),
                workflow_id,
                payload,
            ))
        });
        match registered {
            Ok(id) => IngressAction::Presented(id),
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "ignoring malformed interaction request");
                IngressAction::Invalid(e.to_string())
            }
        }
    }

    fn execution_result(&self, data: &Value) -> IngressAction {
        let (Some(session_id), Some(result)) = (
            read_json_string(data, &["session_id"]),
            ExecutionResult::from_body(data),
        ) else {
            warn!("execution result event without session id or result, dropping");
            return IngressAction::Dropped;
        };
        match self.controller.deliver_execution_result(&session_id, result) {
            Some(id) => IngressAction::ResultMatched(id),
            None => {
                warn!(session_id = %session_id, "no approval waiting for this execution result");
                IngressAction::Dropped
            }
        }
    }

    fn workflow_completed(&self, data: &Value, workflow_id: Option<String>) -> IngressAction {
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(
                workflow_id = ?workflow_id,
                "no async runtime for post-completion recovery, dropping"
            );
            return IngressAction::Dropped;
        };
        let session_id = read_json_string(data, &["session_id"]);
        let controller = self.controller.clone();
        runtime.spawn(async move {
            controller.recover_after_workflow(session_id, workflow_id).await;
        });
        IngressAction::RecoveryScheduled
    }
}

fn payload_from(kind: InteractionKind, data: &Value) -> Result<InteractionPayload, HitlError> {
    let text = |keys: &[&str], fallback: &str| {
        read_json_string(data, keys).unwrap_or_else(|| fallback.to_string())
    };
    Ok(match kind {
        InteractionKind::CommandApproval => InteractionPayload::CommandApproval {
            command: read_json_string(data, &["command"]).ok_or_else(|| {
                HitlError::InvalidInteraction("command approval without a command".to_string())
            })?,
            description: read_json_string(data, &["description", "reason"]),
        },
        InteractionKind::TextInput => InteractionPayload::TextInput {
            prompt: text(&["prompt", "message"], "Input required"),
            default_value: read_json_string(data, &["default_value"]),
        },
        InteractionKind::Confirmation => InteractionPayload::Confirmation {
            message: text(&["message", "prompt"], "Please confirm"),
        },
        InteractionKind::Feedback => InteractionPayload::Feedback {
            prompt: text(&["prompt", "message"], "Feedback requested"),
        },
    })
}
