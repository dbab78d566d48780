use serde_json::{Value, json};

use crate::error::FailureReason;
use crate::events::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    Duplex,
    Fallback,
}

impl DeliveryPath {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryPath::Duplex => "duplex",
            DeliveryPath::Fallback => "fallback",
        }
    }
}

/// Normalized result of delivering a human decision. Produced only by the
/// dispatcher; callers never see raw transport shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    Delivered {
        via: DeliveryPath,
        execution_result: Option<ExecutionResult>,
    },
    NotDelivered {
        reason: FailureReason,
        /// Diagnostic text, e.g. the body of a non-2xx response.
        detail: Option<String>,
    },
}

impl InteractionOutcome {
    pub fn not_delivered(reason: FailureReason, detail: Option<String>) -> Self {
        InteractionOutcome::NotDelivered { reason, detail }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, InteractionOutcome::Delivered { .. })
    }

    pub fn execution_result(&self) -> Option<&ExecutionResult> {
        match self {
            InteractionOutcome::Delivered {
                execution_result, ..
            } => execution_result.as_ref(),
            InteractionOutcome::NotDelivered { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            InteractionOutcome::NotDelivered { reason, .. } => Some(*reason),
            InteractionOutcome::Delivered { .. } => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            InteractionOutcome::Delivered {
                via,
                execution_result,
            } => {
                let mut payload = json!({
                    "delivered": true,
                    "via": via.as_str(),
                });
                if let Some(result) = execution_result {
                    payload["execution_result"] = json!(result);
                }
                payload
            }
            InteractionOutcome::NotDelivered { reason, detail } => {
                let mut payload = json!({
                    "delivered": false,
                    "reason": reason.as_str(),
                });
                if let Some(detail) = detail {
                    payload["detail"] = Value::String(detail.clone());
                }
                payload
            }
        }
    }
}
