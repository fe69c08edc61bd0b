//! Causal history: causal context plus dot cloud.

use crate::cloud::DotCloud;
use crate::context::CausalContext;
use crate::dot::{Clock, Dot, ReplicaId};
use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};

/// Everything a replica knows about which events happened.
///
/// A dot is *observed* when it is covered by the context or present in the
/// cloud. After [`compact`](CausalHistory::compact) the representation is
/// canonical: the context holds every contiguous prefix and the cloud holds
/// only dots past a gap.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalHistory {
    context: CausalContext,
    cloud: DotCloud,
}

impl CausalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(context: CausalContext, cloud: DotCloud) -> Self {
        Self { context, cloud }
    }

    pub fn context(&self) -> &CausalContext {
        &self.context
    }

    pub fn cloud(&self) -> &DotCloud {
        &self.cloud
    }

    pub fn context_mut(&mut self) -> &mut CausalContext {
        &mut self.context
    }

    pub fn cloud_mut(&mut self) -> &mut DotCloud {
        &mut self.cloud
    }

    pub fn into_parts(self) -> (CausalContext, DotCloud) {
        (self.context, self.cloud)
    }

    /// Contiguous clock of `replica`.
    pub fn clock(&self, replica: &str) -> Clock {
        self.context.get(replica)
    }

    /// Has this add or remove already been accounted for?
    pub fn observed(&self, dot: &Dot) -> bool {
        self.context.contains(dot) || self.cloud.contains(dot)
    }

    /// Advance `replica`'s clock and record the fresh dot in the cloud.
    ///
    /// The dot is covered by the context as well until the next
    /// compaction drops the redundant cloud copy.
    pub fn bump(&mut self, replica: &str) -> Dot {
        let clock = self.context.increment(replica);
        let dot = Dot::new(replica, clock);
        self.cloud.insert(dot.clone());
        dot
    }

    /// Fold contiguous cloud dots into the context.
    ///
    /// Dots are visited in ascending `(replica, clock)` order. A dot right
    /// after the context's clock extends it; a dot at or below the clock is
    /// redundant; anything else is a gap exception and stays in the cloud.
    pub fn compact(&mut self) {
        let dots = std::mem::take(&mut self.cloud);
        for dot in dots {
            let current = self.context.get(&dot.replica);
            if dot.clock == current + 1 {
                self.context.set(dot.replica, dot.clock);
            } else if dot.clock > current {
                self.cloud.insert(dot);
            }
        }
    }

    /// Drop every trace of `replica` (context entry and cloud dots).
    pub fn forget(&mut self, replica: &str) {
        self.context.remove(replica);
        self.cloud.remove_replica(replica);
    }

    /// Replicas this history knows anything about.
    pub fn replicas(&self) -> Vec<ReplicaId> {
        let mut replicas: Vec<ReplicaId> = self
            .context
            .replicas()
            .cloned()
            .chain(self.cloud.iter().map(|dot| dot.replica.clone()))
            .collect();
        replicas.sort();
        replicas.dedup();
        replicas
    }
}

impl Lattice for CausalHistory {
    fn bottom() -> Self {
        Self::new()
    }

    fn join(&self, other: &Self) -> Self {
        let mut result = Self {
            context: self.context.join(&other.context),
            cloud: self.cloud.union(&other.cloud),
        };
        result.compact();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(dots: &[(&str, Clock)]) -> DotCloud {
        dots.iter().map(|(r, c)| Dot::new(*r, *c)).collect()
    }

    #[test]
    fn test_observed_uses_context_and_cloud() {
        let history = CausalHistory::from_parts(
            CausalContext::from_entries([("a".to_string(), 2)]),
            cloud(&[("a", 5)]),
        );

        assert!(history.observed(&Dot::new("a", 1)));
        assert!(history.observed(&Dot::new("a", 2)));
        assert!(!history.observed(&Dot::new("a", 3)));
        assert!(history.observed(&Dot::new("a", 5)));
        assert!(!history.observed(&Dot::new("b", 1)));
    }

    #[test]
    fn test_bump_advances_context_and_cloud() {
        let mut history = CausalHistory::new();
        let dot = history.bump("a");

        assert_eq!(dot, Dot::new("a", 1));
        assert_eq!(history.clock("a"), 1);
        assert!(history.cloud().contains(&dot));

        history.compact();
        assert!(history.cloud().is_empty());
        assert!(history.observed(&dot));
    }

    #[test]
    fn test_compact_folds_contiguous_dots() {
        let mut history = CausalHistory::from_parts(
            CausalContext::new(),
            cloud(&[("a", 1), ("a", 2), ("a", 3), ("b", 1)]),
        );
        history.compact();

        assert_eq!(history.clock("a"), 3);
        assert_eq!(history.clock("b"), 1);
        assert!(history.cloud().is_empty());
    }

    #[test]
    fn test_compact_keeps_gap_exceptions() {
        let mut history = CausalHistory::from_parts(
            CausalContext::from_entries([("a".to_string(), 1)]),
            cloud(&[("a", 3), ("a", 4), ("b", 2)]),
        );
        history.compact();

        assert_eq!(history.clock("a"), 1);
        assert!(!history.context().has_replica("b"));
        assert_eq!(history.cloud(), &cloud(&[("a", 3), ("a", 4), ("b", 2)]));

        // closing the gap folds everything behind it
        history.cloud_mut().insert(Dot::new("a", 2));
        history.compact();
        assert_eq!(history.clock("a"), 4);
        assert_eq!(history.cloud(), &cloud(&[("b", 2)]));
    }

    #[test]
    fn test_compact_drops_subsumed_dots() {
        let mut history = CausalHistory::from_parts(
            CausalContext::from_entries([("a".to_string(), 5)]),
            cloud(&[("a", 2), ("a", 5)]),
        );
        history.compact();

        assert_eq!(history.clock("a"), 5);
        assert!(history.cloud().is_empty());
    }

    #[test]
    fn test_forget_replica() {
        let mut history = CausalHistory::from_parts(
            CausalContext::from_entries([("a".to_string(), 3), ("b".to_string(), 1)]),
            cloud(&[("a", 7), ("b", 4)]),
        );
        history.forget("a");

        assert!(!history.context().has_replica("a"));
        assert!(!history.observed(&Dot::new("a", 1)));
        assert!(!history.observed(&Dot::new("a", 7)));
        assert!(history.observed(&Dot::new("b", 4)));
        assert_eq!(history.replicas(), vec!["b".to_string()]);
    }

    #[test]
    fn test_join_closes_gaps_across_replicas() {
        let left = CausalHistory::from_parts(
            CausalContext::from_entries([("a".to_string(), 1)]),
            cloud(&[("a", 3)]),
        );
        let right = CausalHistory::from_parts(
            CausalContext::from_entries([("a".to_string(), 2)]),
            DotCloud::new(),
        );

        let joined = left.join(&right);
        assert_eq!(joined.clock("a"), 3);
        assert!(joined.cloud().is_empty());
    }
}
