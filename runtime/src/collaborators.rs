//! Capabilities the runtime calls but does not implement.
//!
//! A front end (terminal, web view, test harness) supplies these; the state
//! machine and recovery protocol depend only on the traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tollgate_core::{ExecutionResult, InteractionId, PendingInteraction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// The human's answer to the blocking recovery dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    /// Hard refresh: drop all client state and start over.
    Reload,
    /// Keep going with possibly stale state; the user accepts the risk.
    Continue,
}

/// Modal surface for interactions.
#[async_trait]
pub trait Presenter: Send + Sync {
    fn present(&self, interaction: &PendingInteraction);
    fn update_progress(&self, id: &InteractionId, text: &str);
    /// Swap the displayed command for an editable copy.
    fn show_editor(&self, id: &InteractionId, command: &str);
    fn show_result(&self, id: &InteractionId, result: &ExecutionResult);
    fn show_failure(&self, id: &InteractionId, message: &str);
    /// Must tolerate ids that were already closed.
    fn close(&self, id: &InteractionId);
    /// Blocking reload-or-continue dialog shown when session recovery fails.
    async fn prompt_recovery(&self, message: &str) -> RecoveryChoice;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptRole {
    User,
    System,
}

impl TranscriptRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TranscriptRole::User => "user",
            TranscriptRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub content: String,
    pub message_id: String,
    pub metadata: Value,
}

/// Chat transcript the conversation is rendered into.
pub trait Transcript: Send + Sync {
    fn append(&self, entry: TranscriptEntry);
}

/// Toast-style status line.
pub trait StatusReporter: Send + Sync {
    fn report(&self, message: &str, severity: Severity);
}

/// Escape hatch that discards client state and rebuilds it from the server.
pub trait ReloadHandle: Send + Sync {
    fn reload(&self);
}

#[derive(Clone)]
pub struct Collaborators {
    pub presenter: Arc<dyn Presenter>,
    pub transcript: Arc<dyn Transcript>,
    pub status: Arc<dyn StatusReporter>,
    pub reload: Arc<dyn ReloadHandle>,
}
