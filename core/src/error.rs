use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ids::InteractionId;
use crate::interaction::InteractionStage;

/// Why a response was not delivered. Carried by
/// [`InteractionOutcome::NotDelivered`](crate::outcome::InteractionOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    NetworkError,
    ServerError,
    NoSessionContext,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::NetworkError => "network_error",
            FailureReason::ServerError => "server_error",
            FailureReason::NoSessionContext => "no_session_context",
        }
    }

    /// Short human-facing description used in status messages.
    pub fn describe(self) -> &'static str {
        match self {
            FailureReason::Timeout => "the workflow engine did not answer in time",
            FailureReason::NetworkError => "the workflow engine could not be reached",
            FailureReason::ServerError => "the workflow engine rejected the response",
            FailureReason::NoSessionContext => "no session is associated with this request",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HitlError {
    /// Missing identity at registration. Programmer error; nothing is registered.
    #[error("invalid interaction: {0}")]
    InvalidInteraction(String),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("session recovery failed: {0}")]
    RecoveryFailure(String),
    #[error("duplex channel error: {0}")]
    Channel(String),
    #[error("unknown interaction: {0}")]
    UnknownInteraction(InteractionId),
    #[error("cannot {action} interaction {id} while {from}")]
    InvalidTransition {
        id: InteractionId,
        from: InteractionStage,
        action: &'static str,
    },
}

impl HitlError {
    /// Delivery failure class for transport errors; `None` for programmer errors.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            HitlError::Timeout(_) => Some(FailureReason::Timeout),
            HitlError::Network(_) | HitlError::Channel(_) => Some(FailureReason::NetworkError),
            HitlError::Server { .. } => Some(FailureReason::ServerError),
            _ => None,
        }
    }

    /// Machine-readable code for structured CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            HitlError::InvalidInteraction(_) => "invalid_interaction",
            HitlError::Timeout(_) => "timeout",
            HitlError::Network(_) => "network_error",
            HitlError::Server { .. } => "server_error",
            HitlError::RecoveryFailure(_) => "recovery_failure",
            HitlError::Channel(_) => "channel_error",
            HitlError::UnknownInteraction(_) => "unknown_interaction",
            HitlError::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_failure_reasons() {
        assert_eq!(
            HitlError::Timeout(Duration::from_secs(10)).failure_reason(),
            Some(FailureReason::Timeout)
        );
        assert_eq!(
            HitlError::Server {
                status: 502,
                body: "bad gateway".to_string()
            }
            .failure_reason(),
            Some(FailureReason::ServerError)
        );
        assert_eq!(
            HitlError::Channel("closed".to_string()).failure_reason(),
            Some(FailureReason::NetworkError)
        );
        assert_eq!(
            HitlError::InvalidInteraction("session_id is required".to_string()).failure_reason(),
            None
        );
    }

    #[test]
    fn invalid_transition_message_names_stage_and_action() {
        let err = HitlError::InvalidTransition {
            id: InteractionId::from("input-1"),
            from: InteractionStage::Submitting,
            action: "modify",
        };
        assert_eq!(
            err.to_string(),
            "cannot modify interaction input-1 while submitting"
        );
        assert_eq!(err.code(), "invalid_transition");
    }
}
