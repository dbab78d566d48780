use std::collections::HashMap;

use chrono::Utc;
use tollgate_core::{
    HitlError, InteractionDraft, InteractionId, InteractionKind, InteractionPayload,
    InteractionStage, PendingInteraction,
};

/// In-memory map of interactions the client is holding open.
///
/// Owned by one controller; never a process-wide singleton, so independent
/// instances do not observe each other.
#[derive(Debug, Default)]
pub struct InteractionRegistry {
    entries: HashMap<InteractionId, PendingInteraction>,
}

impl InteractionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `draft` and store it in `Presented` stage.
    pub fn register(&mut self, draft: InteractionDraft) -> Result<InteractionId, HitlError> {
        let session_id = draft
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| HitlError::InvalidInteraction("session_id is required".to_string()))?
            .to_string();
        if let InteractionPayload::CommandApproval { command, .. } = &draft.payload {
            if command.trim().is_empty() {
                return Err(HitlError::InvalidInteraction(
                    "command approval requires a command".to_string(),
                ));
            }
        }

        let id = self.fresh_id(draft.payload.kind());
        let workflow_id = draft.workflow_id.filter(|w| !w.trim().is_empty());
        self.entries.insert(
            id.clone(),
            PendingInteraction {
                id: id.clone(),
                session_id,
                workflow_id,
                payload: draft.payload,
                stage: InteractionStage::Presented,
                draft_command: None,
                presented_at: Utc::now(),
            },
        );
        Ok(id)
    }

    pub fn get(&self, id: &InteractionId) -> Option<&PendingInteraction> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &InteractionId) -> Option<&mut PendingInteraction> {
        self.entries.get_mut(id)
    }

    /// Idempotent: removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &InteractionId) -> Option<PendingInteraction> {
        self.entries.remove(id)
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether any entry is still awaiting a terminal stage.
    pub fn has_active(&self) -> bool {
        self.entries.values().any(|entry| !entry.stage.is_terminal())
    }

    /// Entries ordered oldest first.
    pub fn snapshot(&self) -> Vec<PendingInteraction> {
        let mut entries: Vec<PendingInteraction> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.presented_at
                .cmp(&b.presented_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        entries
    }

    fn fresh_id(&self, kind: InteractionKind) -> InteractionId {
        loop {
            let id = InteractionId::generate(kind);
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }
}
