use std::sync::Arc;

use tokio::sync::watch;

/// The client's pointer to "the active session".
///
/// Changes are pushed to subscribers; nothing polls.
#[derive(Clone, Debug)]
pub struct SessionTracker {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl SessionTracker {
    pub fn new(initial: Option<String>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn active(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Returns true when the active session actually changed.
    pub fn set_active(&self, session_id: impl Into<String>) -> bool {
        let session_id = session_id.into();
        self.tx.send_if_modified(|current| {
            if current.as_deref() == Some(session_id.as_str()) {
                false
            } else {
                *current = Some(session_id);
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_changes_but_not_repeats() {
        let tracker = SessionTracker::new(Some("s1".to_string()));
        let mut rx = tracker.subscribe();

        assert!(!tracker.set_active("s1"));
        assert!(!rx.has_changed().unwrap());

        assert!(tracker.set_active("s2"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_deref(), Some("s2"));
        assert_eq!(tracker.active().as_deref(), Some("s2"));
    }

    #[test]
    fn set_active_works_without_subscribers() {
        let tracker = SessionTracker::default();
        assert!(tracker.set_active("s1"));
        assert_eq!(tracker.active().as_deref(), Some("s1"));
    }
}
