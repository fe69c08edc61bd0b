//! Node liveness and permanent removal.
//!
//! Liveness is a soft, local-only visibility filter: a down replica's
//! entries stay in the table but drop out of presence queries.
//! [`ReplicaState::remove_down_nodes`] is the hard counterpart that forgets a
//! replica's history for good.

use crate::element::Element;
use crate::merge::Diff;
use crate::state::ReplicaState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use tracker_core::ReplicaId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Liveness {
    #[default]
    Up,
    Down,
}

/// Replica → liveness. Replicas never marked count as up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeLiveness {
    nodes: BTreeMap<ReplicaId, Liveness>,
}

impl NodeLiveness {
    pub fn with_up(replica: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(replica.to_string(), Liveness::Up);
        Self { nodes }
    }

    pub fn get(&self, replica: &str) -> Liveness {
        self.nodes.get(replica).copied().unwrap_or_default()
    }

    pub fn is_up(&self, replica: &str) -> bool {
        self.get(replica) == Liveness::Up
    }

    /// Set liveness, returning the previous value.
    pub fn set(&mut self, replica: &str, liveness: Liveness) -> Liveness {
        self.nodes
            .insert(replica.to_string(), liveness)
            .unwrap_or_default()
    }

    pub fn remove(&mut self, replica: &str) {
        self.nodes.remove(replica);
    }
}

impl ReplicaState {
    pub fn liveness(&self, replica: &str) -> Liveness {
        self.liveness.get(replica)
    }

    pub fn is_up(&self, replica: &str) -> bool {
        self.liveness.is_up(replica)
    }

    /// Mark `replica` up; its stored entries become visible again.
    pub fn node_up(&mut self, replica: &str) -> Diff {
        let previous = self.liveness.set(replica, Liveness::Up);
        if previous == Liveness::Up {
            return Diff::default();
        }
        let joined = self.entries_of(replica);
        debug!(replica = %self.replica, node = %replica, rejoined = joined.len(), "node up");
        Diff {
            joined,
            left: Vec::new(),
        }
    }

    /// Mark `replica` down; its entries are hidden but kept.
    pub fn node_down(&mut self, replica: &str) -> Diff {
        let previous = self.liveness.set(replica, Liveness::Down);
        if previous == Liveness::Down {
            return Diff::default();
        }
        let left = self.entries_of(replica);
        debug!(replica = %self.replica, node = %replica, hidden = left.len(), "node down");
        Diff {
            joined: Vec::new(),
            left,
        }
    }

    /// Forget `replica` for good: its context entry, cloud dots, delta
    /// records and table entries. Returns the purged elements.
    ///
    /// Anything later received about the replica's old dots is treated as
    /// new information.
    pub fn remove_down_nodes(&mut self, replica: &str) -> Vec<Element> {
        if replica == self.replica {
            warn!(replica = %self.replica, "refusing to remove own replica");
            return Vec::new();
        }

        self.history.forget(replica);
        self.delta.forget(replica);
        self.liveness.remove(replica);
        let purged = self.table.remove_where(|element| element.replica() == replica);
        debug!(replica = %self.replica, node = %replica, purged = purged.len(), "removed down node");
        purged
    }

    fn entries_of(&self, replica: &str) -> Vec<Element> {
        self.table
            .iter()
            .filter(|element| element.replica() == replica)
            .collect()
    }
}
