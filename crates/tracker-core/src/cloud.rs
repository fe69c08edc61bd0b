//! Dot cloud: dots observed outside the contiguous prefix of the context.

use crate::dot::Dot;
use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Ordered set of dots.
///
/// Ordering matters: compaction relies on walking each replica's dots in
/// ascending clock order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DotCloud {
    dots: BTreeSet<Dot>,
}

impl DotCloud {
    pub fn new() -> Self {
        Self {
            dots: BTreeSet::new(),
        }
    }

    /// Insert a dot, returning true if it was not present.
    pub fn insert(&mut self, dot: Dot) -> bool {
        self.dots.insert(dot)
    }

    pub fn remove(&mut self, dot: &Dot) -> bool {
        self.dots.remove(dot)
    }

    pub fn contains(&self, dot: &Dot) -> bool {
        self.dots.contains(dot)
    }

    /// Set union with another cloud.
    pub fn union(&self, other: &DotCloud) -> DotCloud {
        DotCloud {
            dots: self.dots.union(&other.dots).cloned().collect(),
        }
    }

    pub fn retain(&mut self, f: impl FnMut(&Dot) -> bool) {
        self.dots.retain(f);
    }

    /// Drop every dot minted by `replica`.
    pub fn remove_replica(&mut self, replica: &str) {
        self.dots.retain(|dot| dot.replica != replica);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dot> {
        self.dots.iter()
    }

    pub fn clear(&mut self) {
        self.dots.clear();
    }

    pub fn len(&self) -> usize {
        self.dots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dots.is_empty()
    }
}

impl FromIterator<Dot> for DotCloud {
    fn from_iter<I: IntoIterator<Item = Dot>>(iter: I) -> Self {
        Self {
            dots: iter.into_iter().collect(),
        }
    }
}

impl Extend<Dot> for DotCloud {
    fn extend<I: IntoIterator<Item = Dot>>(&mut self, iter: I) {
        self.dots.extend(iter);
    }
}

impl IntoIterator for DotCloud {
    type Item = Dot;
    type IntoIter = std::collections::btree_set::IntoIter<Dot>;

    fn into_iter(self) -> Self::IntoIter {
        self.dots.into_iter()
    }
}

impl Lattice for DotCloud {
    fn bottom() -> Self {
        Self::new()
    }

    fn join(&self, other: &Self) -> Self {
        self.union(other)
    }
}
