//! A cluster of presence replicas gossiping over a [`NetworkSimulator`].

use crate::network::{Envelope, NetworkConfig, NetworkSimulator, NetworkStats, SyncMessage};
use std::collections::BTreeSet;
use tracing::{debug, warn};
use tracker_state::{Diff, Dot, Element, Meta, OwnerId, ReplicaState};

/// A diff recorded at one replica, with what caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEvent {
    pub cause: DiffCause,
    pub diff: Diff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffCause {
    Merge { from: usize },
    NodeUp(String),
    NodeDown(String),
}

#[derive(Debug)]
pub struct SyncCluster {
    replicas: Vec<ReplicaState>,
    network: NetworkSimulator,
    diff_log: Vec<Vec<DiffEvent>>,
    rejected: usize,
}

impl SyncCluster {
    /// Create a cluster of `n` replicas named `replica_0..n`.
    pub fn new(n: usize, config: NetworkConfig) -> Self {
        Self::with_network(n, NetworkSimulator::new(config))
    }

    pub fn with_network(n: usize, network: NetworkSimulator) -> Self {
        Self {
            replicas: (0..n).map(|i| ReplicaState::new(format!("replica_{}", i))).collect(),
            network,
            diff_log: vec![Vec::new(); n],
            rejected: 0,
        }
    }

    pub fn replica(&self, idx: usize) -> &ReplicaState {
        &self.replicas[idx]
    }

    pub fn replica_id(&self, idx: usize) -> &str {
        self.replicas[idx].replica()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn join(
        &mut self,
        idx: usize,
        owner: impl Into<OwnerId>,
        topic: impl Into<String>,
        key: impl Into<String>,
        meta: Option<Meta>,
    ) -> Dot {
        self.replicas[idx].join(owner, topic, key, meta)
    }

    pub fn leave(&mut self, idx: usize, owner: &OwnerId, topic: &str, key: &str) -> Vec<Element> {
        self.replicas[idx].leave(owner, topic, key)
    }

    pub fn leave_owner(&mut self, idx: usize, owner: &OwnerId) -> Vec<Element> {
        self.replicas[idx].leave_owner(owner)
    }

    /// Send the pending delta of `from` to every peer, then reset it.
    ///
    /// Once reset, a lost delta is only recovered by full-state sync.
    pub fn broadcast_delta(&mut self, from: usize) {
        if !self.replicas[from].has_pending_delta() {
            return;
        }
        let payload = self.replicas[from].extract_delta();
        for to in 0..self.replicas.len() {
            if to != from {
                self.network.send(Envelope {
                    from,
                    to,
                    message: SyncMessage::Delta(payload.clone()),
                });
            }
        }
        self.replicas[from].reset_delta();
    }

    /// Send `from`'s full state to `to`.
    pub fn send_full(&mut self, from: usize, to: usize) {
        let payload = self.replicas[from].extract_full();
        self.network.send(Envelope {
            from,
            to,
            message: SyncMessage::Full(payload),
        });
    }

    /// `requester` asks `peer` for its full state.
    pub fn request_full(&mut self, requester: usize, peer: usize) {
        self.network.send(Envelope {
            from: requester,
            to: peer,
            message: SyncMessage::FullRequest,
        });
    }

    /// Every replica sends its full state to every other, then deliver.
    pub fn full_sync_round(&mut self) {
        let n = self.replicas.len();
        for from in 0..n {
            for to in 0..n {
                if from != to {
                    self.send_full(from, to);
                }
            }
        }
        self.drain_network();
    }

    /// Every replica broadcasts its delta, then deliver.
    pub fn delta_sync_round(&mut self) {
        for from in 0..self.replicas.len() {
            self.broadcast_delta(from);
        }
        self.drain_network();
    }

    /// Deliver one message. Returns false when nothing is in flight.
    pub fn process_one(&mut self) -> bool {
        let Some(envelope) = self.network.receive() else {
            return false;
        };
        match envelope.message {
            SyncMessage::Delta(payload) | SyncMessage::Full(payload) => {
                self.deliver(envelope.from, envelope.to, &payload);
            }
            SyncMessage::FullRequest => self.send_full(envelope.to, envelope.from),
        }
        true
    }

    fn deliver(&mut self, from: usize, to: usize, payload: &tracker_state::Payload) {
        match self.replicas[to].try_merge(payload) {
            Ok(diff) => {
                if !diff.is_empty() {
                    debug!(
                        from = %payload.sender(),
                        to = %self.replicas[to].replica(),
                        joined = diff.joined.len(),
                        left = diff.left.len(),
                        "delivered"
                    );
                    self.diff_log[to].push(DiffEvent {
                        cause: DiffCause::Merge { from },
                        diff,
                    });
                }
            }
            Err(err) => {
                self.rejected += 1;
                warn!(to = %self.replicas[to].replica(), error = %err, "rejected payload");
            }
        }
    }

    pub fn drain_network(&mut self) {
        while self.process_one() {}
    }

    pub fn retransmit_and_process(&mut self) {
        self.network.retransmit_lost();
        self.drain_network();
    }

    /// `observer` marks `target` down.
    pub fn node_down(&mut self, observer: usize, target: usize) -> Diff {
        let target_id = self.replicas[target].replica().clone();
        let diff = self.replicas[observer].node_down(&target_id);
        self.log_liveness(observer, DiffCause::NodeDown(target_id), &diff);
        diff
    }

    /// `observer` marks `target` up again.
    pub fn node_up(&mut self, observer: usize, target: usize) -> Diff {
        let target_id = self.replicas[target].replica().clone();
        let diff = self.replicas[observer].node_up(&target_id);
        self.log_liveness(observer, DiffCause::NodeUp(target_id), &diff);
        diff
    }

    /// `observer` permanently forgets `target`.
    pub fn remove_down_nodes(&mut self, observer: usize, target: usize) -> Vec<Element> {
        let target_id = self.replicas[target].replica().clone();
        self.replicas[observer].remove_down_nodes(&target_id)
    }

    fn log_liveness(&mut self, observer: usize, cause: DiffCause, diff: &Diff) {
        if !diff.is_empty() {
            self.diff_log[observer].push(DiffEvent {
                cause,
                diff: diff.clone(),
            });
        }
    }

    /// Visible presence of one replica, independent of dot bookkeeping order.
    pub fn visible(&self, idx: usize) -> BTreeSet<(Dot, String, String, String, String)> {
        self.replicas[idx]
            .all_live()
            .into_iter()
            .map(|e| (e.dot, e.owner.0, e.topic, e.key, e.meta.to_string()))
            .collect()
    }

    /// Do all replicas show the same presence?
    pub fn is_converged(&self) -> bool {
        if self.replicas.len() < 2 {
            return true;
        }
        let first = self.visible(0);
        (1..self.replicas.len()).all(|idx| self.visible(idx) == first)
    }

    pub fn diff_log(&self, idx: usize) -> &[DiffEvent] {
        &self.diff_log[idx]
    }

    pub fn network_stats(&self) -> NetworkStats {
        self.network.stats()
    }

    /// Payloads that failed validation on delivery.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}
