use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::interaction::PendingInteraction;

/// Event type names exchanged with the workflow engine.
pub mod names {
    pub const CLI_HUMAN_INPUT_REQUIRED: &str = "CLIHumanInputRequiredEvent";
    pub const HUMAN_INPUT_REQUIRED: &str = "HumanInputRequiredEvent";
    pub const HUMAN_CONFIRMATION_REQUIRED: &str = "HumanConfirmationRequiredEvent";
    pub const HUMAN_FEEDBACK_REQUIRED: &str = "HumanFeedbackRequiredEvent";
    pub const SESSION_PROTECTION: &str = "SessionProtectionEvent";
    pub const CLI_EXECUTION_RESULT: &str = "CLIExecutionResultEvent";
    pub const WORKFLOW_COMPLETED: &str = "WorkflowCompletedEvent";

    pub const CLI_HUMAN_RESPONSE: &str = "CLIHumanResponseEvent";
    pub const HUMAN_RESPONSE: &str = "HumanResponseEvent";
    pub const HUMAN_CONFIRMATION_RESPONSE: &str = "HumanConfirmationResponseEvent";
    pub const HUMAN_FEEDBACK_RESPONSE: &str = "HumanFeedbackResponseEvent";
}

/// Envelope `type` used for responses sent over the duplex channel.
pub const HITL_RESPONSE_ENVELOPE: &str = "hitl_response";

/// Kind-specific fields of a response body. Flattened into [`HitlResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseFields {
    Command { execute: bool, command: String },
    Input { input: String },
    Confirmation { confirmed: bool },
    Feedback { feedback: String },
}

/// Body delivered to the engine, over either transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlResponse {
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(flatten)]
    pub fields: ResponseFields,
}

impl HitlResponse {
    /// Build the response for `interaction`, addressed by its captured identities.
    pub fn for_interaction(interaction: &PendingInteraction, fields: ResponseFields) -> Self {
        Self {
            event_type: interaction.kind().response_event_type().to_string(),
            session_id: Some(interaction.session_id.clone()),
            workflow_id: interaction.workflow_id.clone(),
            fields,
        }
    }

    /// Session id if present and non-blank.
    pub fn routable_session_id(&self) -> Option<&str> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Duplex channel frame: `{ "type": "hitl_response", "data": <response> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: HitlResponse,
}

impl Envelope {
    pub fn hitl_response(data: HitlResponse) -> Self {
        Self {
            kind: HITL_RESPONSE_ENVELOPE.to_string(),
            data,
        }
    }
}

/// Outcome of a command the engine ran on the human's behalf.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub success: bool,
}

impl ExecutionResult {
    /// Extract a result from a response body. Accepts `{ "execution_result": {...} }`
    /// or a bare result object; anything else carries no result.
    pub fn from_body(body: &Value) -> Option<Self> {
        let candidate = match body.get("execution_result") {
            Some(inner) if inner.is_object() => inner,
            _ if body.get("exit_code").is_some() => body,
            _ => return None,
        };
        serde_json::from_value(candidate.clone()).ok()
    }
}

/// Why a session recovery call is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryReason {
    /// A human-in-the-loop interaction just completed.
    HieCompletion,
    PostWorkflowCompletion,
}

impl RecoveryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryReason::HieCompletion => "hie_completion",
            RecoveryReason::PostWorkflowCompletion => "post_workflow_completion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverRequest {
    pub reason: RecoveryReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A named event pushed by the engine. `event_type` is a free-form string,
/// NOT an enum: unknown names must pass through so they can be dropped gracefully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn command_response_serializes_flat() {
        let response = HitlResponse {
            event_type: names::CLI_HUMAN_RESPONSE.to_string(),
            session_id: Some("s1".to_string()),
            workflow_id: Some("w1".to_string()),
            fields: ResponseFields::Command {
                execute: true,
                command: "ls -la".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "event_type": "CLIHumanResponseEvent",
                "session_id": "s1",
                "workflow_id": "w1",
                "execute": true,
                "command": "ls -la"
            })
        );
    }

    #[test]
    fn envelope_wraps_response_under_data() {
        let envelope = Envelope::hitl_response(HitlResponse {
            event_type: names::HUMAN_CONFIRMATION_RESPONSE.to_string(),
            session_id: Some("s1".to_string()),
            workflow_id: None,
            fields: ResponseFields::Confirmation { confirmed: false },
        });
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "hitl_response");
        assert_eq!(value["data"]["confirmed"], json!(false));
        assert!(value["data"].get("workflow_id").is_none());
    }

    #[test]
    fn response_fields_are_recovered_from_flat_json() {
        let parsed: HitlResponse = serde_json::from_value(json!({
            "event_type": "HumanFeedbackResponseEvent",
            "session_id": "s9",
            "feedback": "looks good"
        }))
        .unwrap();
        assert_eq!(
            parsed.fields,
            ResponseFields::Feedback {
                feedback: "looks good".to_string()
            }
        );
        assert_eq!(parsed.workflow_id, None);
    }

    #[test]
    fn blank_session_is_not_routable() {
        let response = HitlResponse {
            event_type: names::HUMAN_RESPONSE.to_string(),
            session_id: Some("  ".to_string()),
            workflow_id: None,
            fields: ResponseFields::Input {
                input: "x".to_string(),
            },
        };
        assert_eq!(response.routable_session_id(), None);
    }

    #[test]
    fn execution_result_from_wrapped_or_bare_body() {
        let wrapped = json!({
            "execution_result": {
                "command": "ls -la",
                "exit_code": 0,
                "stdout": "total 0",
                "success": true
            }
        });
        let result = ExecutionResult::from_body(&wrapped).unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert!(result.success);
        assert_eq!(result.stderr, None);

        let bare = json!({"command": "false", "exit_code": 1, "stderr": null, "success": false});
        let result = ExecutionResult::from_body(&bare).unwrap();
        assert_eq!(result.exit_code, Some(1));
        assert!(!result.success);

        assert_eq!(ExecutionResult::from_body(&json!({"status": "ok"})), None);
        assert_eq!(ExecutionResult::from_body(&serde_json::Value::Null), None);
    }

    #[test]
    fn recovery_reason_wire_names() {
        let body = serde_json::to_value(RecoverRequest {
            reason: RecoveryReason::PostWorkflowCompletion,
        })
        .unwrap();
        assert_eq!(body, json!({"reason": "post_workflow_completion"}));
        assert_eq!(RecoveryReason::HieCompletion.as_str(), "hie_completion");
    }

    #[test]
    fn ingress_message_tolerates_missing_data() {
        let message: IngressMessage =
            serde_json::from_str(r#"{"type":"SessionProtectionEvent"}"#).unwrap();
        assert_eq!(message.event_type, names::SESSION_PROTECTION);
        assert!(message.data.is_null());
    }
}
