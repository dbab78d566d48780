use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::interaction::InteractionKind;

/// Client-side handle for one presented interaction.
///
/// Format: `{kind-prefix}-{unix-millis}-{8 random bytes hex-encoded}`.
/// Only used to address UI state; the server never sees it as an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionId(String);

impl InteractionId {
    pub fn generate(kind: InteractionKind) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("{}-{millis}-{}", kind.id_prefix(), random_hex(8)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InteractionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for InteractionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn random_hex(n: usize) -> String {
    let bytes: Vec<u8> = (0..n).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    hex::encode(&bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_ids_carry_kind_prefix() {
        let id = InteractionId::generate(InteractionKind::CommandApproval);
        assert!(id.as_str().starts_with("cmd-"));
        let id = InteractionId::generate(InteractionKind::Confirmation);
        assert!(id.as_str().starts_with("confirm-"));
    }

    #[test]
    fn random_suffix_is_sixteen_hex_chars() {
        let id = InteractionId::generate(InteractionKind::Feedback);
        let suffix = id.as_str().rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 16);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_generated_in_the_same_millisecond_do_not_collide() {
        let ids: HashSet<InteractionId> = (0..1000)
            .map(|_| InteractionId::generate(InteractionKind::TextInput))
            .collect();
        assert_eq!(ids.len(), 1000);
    }
}
