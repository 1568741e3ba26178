//! Common types for the peernet environment abstraction.

use serde::{Deserialize, Serialize};

/// Identifier of an actor in the network, in `[0, N)`.
///
/// Ids double as row/column indices into the channel topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub usize);

impl ActorId {
    /// Returns the id as a topology index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Iterates over all ids of an `n`-actor network.
    pub fn all(n: usize) -> impl Iterator<Item = ActorId> {
        (0..n).map(ActorId)
    }
}

impl From<usize> for ActorId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
