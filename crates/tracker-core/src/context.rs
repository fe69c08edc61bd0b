//! Causal context: a version vector of contiguously observed clocks.
//!
//! `context[r] = n` means every event `(r, 1..=n)` has been observed. Events
//! seen out of order are kept in the [`DotCloud`](crate::DotCloud) until the
//! gap before them closes.

use crate::dot::{Clock, Dot, ReplicaId};
use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalContext {
    entries: BTreeMap<ReplicaId, Clock>,
}

impl CausalContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Create a context from `(replica, clock)` pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (ReplicaId, Clock)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Contiguous clock for a replica, 0 when nothing was observed.
    pub fn get(&self, replica: &str) -> Clock {
        self.entries.get(replica).copied().unwrap_or(0)
    }

    /// Whether the replica has an entry at all.
    pub fn has_replica(&self, replica: &str) -> bool {
        self.entries.contains_key(replica)
    }

    /// Set the clock for a replica.
    pub fn set(&mut self, replica: impl Into<ReplicaId>, clock: Clock) {
        self.entries.insert(replica.into(), clock);
    }

    /// Increment the clock for a replica, returning the new value.
    pub fn increment(&mut self, replica: impl Into<ReplicaId>) -> Clock {
        let entry = self.entries.entry(replica.into()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Whether `dot` lies inside the contiguous prefix.
    pub fn contains(&self, dot: &Dot) -> bool {
        self.get(&dot.replica) >= dot.clock
    }

    /// Component-wise max with another context.
    pub fn merge(&mut self, other: &CausalContext) {
        for (replica, &clock) in &other.entries {
            if clock == 0 {
                continue;
            }
            let current = self.entries.entry(replica.clone()).or_insert(0);
            *current = (*current).max(clock);
        }
    }

    /// Forget a replica entirely.
    pub fn remove(&mut self, replica: &str) -> Option<Clock> {
        self.entries.remove(replica)
    }

    /// True if for all replicas, self[r] >= other[r].
    pub fn dominates(&self, other: &CausalContext) -> bool {
        other
            .entries
            .iter()
            .all(|(replica, &clock)| self.get(replica) >= clock)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, &Clock)> {
        self.entries.iter()
    }

    pub fn replicas(&self) -> impl Iterator<Item = &ReplicaId> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Lattice for CausalContext {
    fn bottom() -> Self {
        Self::new()
    }

    fn join(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(entries: &[(&str, Clock)]) -> CausalContext {
        CausalContext::from_entries(entries.iter().map(|(r, c)| (r.to_string(), *c)))
    }

    #[test]
    fn test_context_basic() {
        let mut context = CausalContext::new();
        assert_eq!(context.get("r1"), 0);
        assert!(!context.has_replica("r1"));

        context.set("r1", 5);
        assert_eq!(context.get("r1"), 5);

        assert_eq!(context.increment("r1"), 6);
        assert_eq!(context.increment("r2"), 1);
    }

    #[test]
    fn test_context_contains() {
        let context = ctx(&[("r1", 5)]);

        assert!(context.contains(&Dot::new("r1", 1)));
        assert!(context.contains(&Dot::new("r1", 5)));
        assert!(!context.contains(&Dot::new("r1", 6)));
        assert!(!context.contains(&Dot::new("r2", 1)));
    }

    #[test]
    fn test_context_merge_takes_max() {
        let mut a = ctx(&[("r1", 5), ("r2", 3)]);
        let b = ctx(&[("r1", 3), ("r2", 7), ("r3", 1)]);

        a.merge(&b);
        assert_eq!(a.get("r1"), 5);
        assert_eq!(a.get("r2"), 7);
        assert_eq!(a.get("r3"), 1);
        assert!(a.dominates(&b));
    }

    #[test]
    fn test_context_remove_forgets_replica() {
        let mut context = ctx(&[("r1", 5), ("r2", 2)]);
        assert_eq!(context.remove("r1"), Some(5));
        assert!(!context.has_replica("r1"));
        assert!(!context.contains(&Dot::new("r1", 1)));
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_context_serialization() {
        let context = ctx(&[("r1", 5), ("r2", 10)]);
        let json = serde_json::to_string(&context).unwrap();
        let back: CausalContext = serde_json::from_str(&json).unwrap();
        assert_eq!(context, back);
    }
}
