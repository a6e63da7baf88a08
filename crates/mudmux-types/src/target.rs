//! Client addressing for client-bound lines.

use crate::ClientId;
use serde::{Deserialize, Serialize};

/// Which downstream clients a client-bound line is addressed to.
///
/// The send stage evaluates this against each connected client before
/// applying the per-recipient filter rules (view-only, login state).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClientTarget {
    /// Every connected client (subject to filtering).
    #[default]
    All,
    /// A single client, e.g. the originator of a command.
    Only(ClientId),
    /// Everyone except the listed clients.
    Exclude(Vec<ClientId>),
}

impl ClientTarget {
    /// Returns `true` when the target addresses the given client,
    /// before filter rules are applied.
    #[must_use]
    pub fn includes(&self, id: ClientId) -> bool {
        match self {
            Self::All => true,
            Self::Only(only) => *only == id,
            Self::Exclude(excluded) => !excluded.contains(&id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_only() {
        let a = ClientId::new();
        let b = ClientId::new();
        let target = ClientTarget::Only(a);
        assert!(target.includes(a));
        assert!(!target.includes(b));
    }

    #[test]
    fn target_exclude() {
        let a = ClientId::new();
        let b = ClientId::new();
        let target = ClientTarget::Exclude(vec![a]);
        assert!(!target.includes(a));
        assert!(target.includes(b));
    }

    #[test]
    fn target_all() {
        assert!(ClientTarget::All.includes(ClientId::new()));
    }
}
