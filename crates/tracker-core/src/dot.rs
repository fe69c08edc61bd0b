//! Dots: unique identifiers for causal events.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Replica identifier (one per tracker node).
pub type ReplicaId = String;

/// Per-replica logical clock.
pub type Clock = u64;

/// A `(replica, clock)` pair identifying one add or remove event.
///
/// Dots order lexicographically by replica then clock, which is the order
/// compaction walks the cloud in.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dot {
    pub replica: ReplicaId,
    pub clock: Clock,
}

impl Dot {
    pub fn new(replica: impl Into<ReplicaId>, clock: Clock) -> Self {
        Self {
            replica: replica.into(),
            clock,
        }
    }

    /// Whether this dot was minted by `replica`.
    pub fn is_from(&self, replica: &str) -> bool {
        self.replica == replica
    }
}

impl fmt::Display for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.replica, self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_ordering_is_replica_then_clock() {
        let mut dots = vec![
            Dot::new("b", 1),
            Dot::new("a", 10),
            Dot::new("a", 2),
        ];
        dots.sort();
        assert_eq!(
            dots,
            vec![Dot::new("a", 2), Dot::new("a", 10), Dot::new("b", 1)]
        );
    }

    #[test]
    fn test_dot_display() {
        assert_eq!(Dot::new("node1", 7).to_string(), "(node1, 7)");
    }
}
