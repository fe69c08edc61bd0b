//! Delta buffer: changes accumulated since the last synchronization.
//!
//! The buffer mirrors the replica's own bookkeeping for one window:
//! every dot minted or observed-as-removed goes to its cloud, every local
//! add to its element map. Shipping `cloud + elements` to a peer is enough
//! for the peer to replay both the adds and the removes of the window.

use crate::element::{ElementData, ElementMap};
use serde::{Deserialize, Serialize};
use tracker_core::{Clock, Dot, DotCloud};

/// Own-clock interval `(start, end]` covered by a delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockRange {
    pub start: Clock,
    pub end: Clock,
}

impl ClockRange {
    pub fn at(clock: Clock) -> Self {
        Self {
            start: clock,
            end: clock,
        }
    }

    /// Whether `clock` falls inside `(start, end]`.
    pub fn covers(&self, clock: Clock) -> bool {
        clock > self.start && clock <= self.end
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeltaBuffer {
    range: ClockRange,
    cloud: DotCloud,
    elements: ElementMap,
}

impl DeltaBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty window starting at `clock`.
    pub fn starting_at(clock: Clock) -> Self {
        Self {
            range: ClockRange::at(clock),
            ..Self::default()
        }
    }

    /// Record a freshly minted own dot.
    pub(crate) fn record_event(&mut self, dot: Dot) {
        self.range.end = self.range.end.max(dot.clock);
        self.cloud.insert(dot);
    }

    pub(crate) fn record_join(&mut self, dot: Dot, data: ElementData) {
        self.elements.insert(dot, data);
    }

    /// Record that the element behind `dot` is gone.
    pub(crate) fn record_removal(&mut self, dot: Dot) {
        self.elements.remove(&dot);
        self.cloud.insert(dot);
    }

    /// Drop everything referring to `replica`.
    pub(crate) fn forget(&mut self, replica: &str) {
        self.cloud.remove_replica(replica);
        self.elements.retain(|dot, _| !dot.is_from(replica));
    }

    /// Start a fresh window at `clock`.
    pub fn reset(&mut self, clock: Clock) {
        self.range = ClockRange::at(clock);
        self.cloud.clear();
        self.elements.clear();
    }

    /// Something joined or left since the last reset.
    pub fn has_pending(&self) -> bool {
        !self.cloud.is_empty()
    }

    pub fn range(&self) -> ClockRange {
        self.range
    }

    pub fn cloud(&self) -> &DotCloud {
        &self.cloud
    }

    pub fn elements(&self) -> &ElementMap {
        &self.elements
    }
}
