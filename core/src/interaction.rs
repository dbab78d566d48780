use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::names;
use crate::ids::InteractionId;

/// The four ways a paused workflow can ask a human for a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    CommandApproval,
    TextInput,
    Confirmation,
    Feedback,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::CommandApproval => "command_approval",
            InteractionKind::TextInput => "text_input",
            InteractionKind::Confirmation => "confirmation",
            InteractionKind::Feedback => "feedback",
        }
    }

    pub fn id_prefix(self) -> &'static str {
        match self {
            InteractionKind::CommandApproval => "cmd",
            InteractionKind::TextInput => "input",
            InteractionKind::Confirmation => "confirm",
            InteractionKind::Feedback => "feedback",
        }
    }

    /// Kind opened by an inbound request event, `None` for any other event.
    pub fn from_request_event(event_type: &str) -> Option<Self> {
        match event_type {
            names::CLI_HUMAN_INPUT_REQUIRED => Some(InteractionKind::CommandApproval),
            names::HUMAN_INPUT_REQUIRED => Some(InteractionKind::TextInput),
            names::HUMAN_CONFIRMATION_REQUIRED => Some(InteractionKind::Confirmation),
            names::HUMAN_FEEDBACK_REQUIRED => Some(InteractionKind::Feedback),
            _ => None,
        }
    }

    /// `event_type` carried by the response body sent back to the engine.
    pub fn response_event_type(self) -> &'static str {
        match self {
            InteractionKind::CommandApproval => names::CLI_HUMAN_RESPONSE,
            InteractionKind::TextInput => names::HUMAN_RESPONSE,
            InteractionKind::Confirmation => names::HUMAN_CONFIRMATION_RESPONSE,
            InteractionKind::Feedback => names::HUMAN_FEEDBACK_RESPONSE,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle stage of a pending interaction.
///
/// Transitions only move forward, except `Presented -> ModificationEditing -> Presented`
/// while a command is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStage {
    Presented,
    ModificationEditing,
    Submitting,
    Resolved,
    Failed,
}

impl InteractionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionStage::Presented => "presented",
            InteractionStage::ModificationEditing => "modification_editing",
            InteractionStage::Submitting => "submitting",
            InteractionStage::Resolved => "resolved",
            InteractionStage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InteractionStage::Resolved | InteractionStage::Failed)
    }
}

impl fmt::Display for InteractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific data captured when the interaction is presented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionPayload {
    CommandApproval {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    TextInput {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
    Confirmation {
        message: String,
    },
    Feedback {
        prompt: String,
    },
}

impl InteractionPayload {
    pub fn kind(&self) -> InteractionKind {
        match self {
            InteractionPayload::CommandApproval { .. } => InteractionKind::CommandApproval,
            InteractionPayload::TextInput { .. } => InteractionKind::TextInput,
            InteractionPayload::Confirmation { .. } => InteractionKind::Confirmation,
            InteractionPayload::Feedback { .. } => InteractionKind::Feedback,
        }
    }

    /// Headline text shown to the human.
    pub fn headline(&self) -> &str {
        match self {
            InteractionPayload::CommandApproval { command, .. } => command,
            InteractionPayload::TextInput { prompt, .. } => prompt,
            InteractionPayload::Confirmation { message } => message,
            InteractionPayload::Feedback { prompt } => prompt,
        }
    }
}

/// Unvalidated input to the registry. The kind is carried by the payload variant,
/// so only the session identity can be missing.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionDraft {
    pub session_id: Option<String>,
    pub workflow_id: Option<String>,
    pub payload: InteractionPayload,
}

impl InteractionDraft {
    pub fn new(
        session_id: Option<String>,
        workflow_id: Option<String>,
        payload: InteractionPayload,
    ) -> Self {
        Self {
            session_id,
            workflow_id,
            payload,
        }
    }
}

/// A human decision the client is currently holding open.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingInteraction {
    pub id: InteractionId,
    /// Server-recognized conversation identity; responses are routed by this.
    pub session_id: String,
    /// Workflow definition identity; addresses the duplex channel.
    pub workflow_id: Option<String>,
    pub payload: InteractionPayload,
    pub stage: InteractionStage,
    /// Editable copy of the command while in `ModificationEditing`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_command: Option<String>,
    pub presented_at: DateTime<Utc>,
}

impl PendingInteraction {
    pub fn kind(&self) -> InteractionKind {
        self.payload.kind()
    }

    pub fn command(&self) -> Option<&str> {
        match &self.payload {
            InteractionPayload::CommandApproval { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Replace the candidate command with a user-edited one. This is the only
    /// sanctioned mutation of a presented payload.
    pub fn supersede_command(&mut self, edited: String) {
        if let InteractionPayload::CommandApproval { command, .. } = &mut self.payload {
            *command = edited;
        }
        self.draft_command = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approval(command: &str) -> PendingInteraction {
        PendingInteraction {
            id: InteractionId::from("cmd-1"),
            session_id: "s1".to_string(),
            workflow_id: Some("w1".to_string()),
            payload: InteractionPayload::CommandApproval {
                command: command.to_string(),
                description: None,
            },
            stage: InteractionStage::ModificationEditing,
            draft_command: Some(command.to_string()),
            presented_at: Utc::now(),
        }
    }

    #[test]
    fn supersede_command_replaces_payload_and_clears_draft() {
        let mut interaction = approval("ls -la");
        interaction.supersede_command("ls -l /tmp".to_string());
        assert_eq!(interaction.command(), Some("ls -l /tmp"));
        assert!(interaction.draft_command.is_none());
    }

    #[test]
    fn supersede_command_ignores_non_command_payloads() {
        let mut interaction = approval("ls");
        interaction.payload = InteractionPayload::Feedback {
            prompt: "How did it go?".to_string(),
        };
        interaction.supersede_command("rm -rf /".to_string());
        assert_eq!(interaction.payload.headline(), "How did it go?");
        assert_eq!(interaction.command(), None);
    }

    #[test]
    fn only_resolved_and_failed_are_terminal() {
        assert!(InteractionStage::Resolved.is_terminal());
        assert!(InteractionStage::Failed.is_terminal());
        assert!(!InteractionStage::Presented.is_terminal());
        assert!(!InteractionStage::ModificationEditing.is_terminal());
        assert!(!InteractionStage::Submitting.is_terminal());
    }

    #[test]
    fn payload_variant_determines_kind_and_event_names() {
        let payload = InteractionPayload::Confirmation {
            message: "Deploy?".to_string(),
        };
        assert_eq!(payload.kind(), InteractionKind::Confirmation);
        assert_eq!(
            payload.kind().response_event_type(),
            "HumanConfirmationResponseEvent"
        );
        assert_eq!(
            InteractionKind::from_request_event("CLIHumanInputRequiredEvent"),
            Some(InteractionKind::CommandApproval)
        );
        assert_eq!(InteractionKind::from_request_event("CLIHumanResponseEvent"), None);
    }
}
