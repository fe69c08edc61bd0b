//! Replica state: the per-node presence set.
//!
//! `ReplicaState` owns the causal history, the element table, the node
//! liveness map and the delta buffer. Local mutations (join/leave) update all
//! four together; merges are in [`crate::merge`], liveness and GC in
//! [`crate::liveness`].
//!
//! ```rust
//! use tracker_state::{OwnerId, ReplicaState};
//!
//! let mut s1 = ReplicaState::new("a");
//! let pid = OwnerId::new("pid1");
//! s1.join(pid.clone(), "room:1", "user1", None);
//! assert_eq!(s1.by_topic("room:1").len(), 1);
//!
//! let mut s2 = ReplicaState::new("b");
//! let diff = s2.merge(&s1.extract_full());
//! assert_eq!(diff.joined.len(), 1);
//! ```

use crate::delta::DeltaBuffer;
use crate::element::{empty_meta, Element, ElementData, Meta, OwnerId};
use crate::liveness::NodeLiveness;
use crate::payload::{Header, HeaderKind, Payload};
use crate::table::{ElementTable, Match};
use tracing::trace;
use tracker_core::{CausalContext, CausalHistory, Clock, Dot, DotCloud, ReplicaId};

#[derive(Clone, Debug)]
pub struct ReplicaState {
    pub(crate) replica: ReplicaId,
    pub(crate) history: CausalHistory,
    pub(crate) table: ElementTable,
    pub(crate) liveness: NodeLiveness,
    pub(crate) delta: DeltaBuffer,
}

impl ReplicaState {
    /// Empty state for `replica`, which starts out up.
    pub fn new(replica: impl Into<ReplicaId>) -> Self {
        let replica = replica.into();
        Self {
            liveness: NodeLiveness::with_up(&replica),
            replica,
            history: CausalHistory::new(),
            table: ElementTable::new(),
            delta: DeltaBuffer::new(),
        }
    }

    pub fn replica(&self) -> &ReplicaId {
        &self.replica
    }

    /// Own replica id plus causal context, for handshakes and debugging.
    pub fn clocks(&self) -> (&ReplicaId, &CausalContext) {
        (&self.replica, self.history.context())
    }

    /// Own contiguous clock.
    pub fn current_clock(&self) -> Clock {
        self.history.clock(&self.replica)
    }

    pub fn context(&self) -> &CausalContext {
        self.history.context()
    }

    pub fn cloud(&self) -> &DotCloud {
        self.history.cloud()
    }

    pub fn history(&self) -> &CausalHistory {
        &self.history
    }

    pub fn delta(&self) -> &DeltaBuffer {
        &self.delta
    }

    /// Has this add or remove already been accounted for?
    pub fn observed(&self, dot: &Dot) -> bool {
        self.history.observed(dot)
    }

    /// Mint a fresh own dot in both the live history and the delta.
    fn bump_clock(&mut self) -> Dot {
        let dot = self.history.bump(&self.replica);
        self.delta.record_event(dot.clone());
        dot
    }

    /// Fold contiguous cloud dots into the context.
    pub fn compact(&mut self) {
        self.history.compact();
    }

    /// Track `owner` under `topic`/`key`. Returns the dot of the add.
    pub fn join(
        &mut self,
        owner: impl Into<OwnerId>,
        topic: impl Into<String>,
        key: impl Into<String>,
        meta: Option<Meta>,
    ) -> Dot {
        let owner = owner.into();
        let topic = topic.into();
        let key = key.into();
        let meta = meta.unwrap_or_else(empty_meta);

        let dot = self.bump_clock();
        trace!(replica = %self.replica, %owner, %topic, %key, %dot, "join");

        self.table.insert(
            owner.clone(),
            topic.clone(),
            key.clone(),
            meta.clone(),
            dot.clone(),
        );
        self.delta.record_join(
            dot.clone(),
            ElementData {
                owner,
                topic,
                key,
                meta,
            },
        );
        dot
    }

    /// Untrack one `(owner, topic, key)`. Returns the removed elements.
    pub fn leave(&mut self, owner: &OwnerId, topic: &str, key: &str) -> Vec<Element> {
        self.remove(&Match::Exact { owner, topic, key })
    }

    /// Untrack `owner` from every topic. Returns the removed elements.
    pub fn leave_owner(&mut self, owner: &OwnerId) -> Vec<Element> {
        self.remove(&Match::Owner(owner))
    }

    /// Remove the matching entries this replica added.
    ///
    /// Entries minted elsewhere are left alone: they go away when their
    /// origin removes them, or through GC.
    fn remove(&mut self, pattern: &Match<'_>) -> Vec<Element> {
        let replica = self.replica.clone();
        let removed = self
            .table
            .remove_matching(pattern, |dot| dot.is_from(&replica));
        if removed.is_empty() {
            return removed;
        }

        for element in &removed {
            self.history.cloud_mut().insert(element.dot.clone());
            self.delta.record_removal(element.dot.clone());
        }
        let dot = self.bump_clock();
        trace!(replica = %self.replica, removed = removed.len(), %dot, "leave");
        removed
    }

    /// Every element whose replica is up.
    pub fn all_live(&self) -> Vec<Element> {
        self.table
            .iter()
            .filter(|element| self.liveness.is_up(element.replica()))
            .collect()
    }

    /// Visible elements under `topic`.
    pub fn by_topic(&self, topic: &str) -> Vec<Element> {
        self.table
            .topic(topic)
            .filter(|element| self.liveness.is_up(element.replica()))
            .collect()
    }

    /// Visible elements for one `(owner, topic, key)`.
    pub fn by_owner_topic_key(&self, owner: &OwnerId, topic: &str, key: &str) -> Vec<Element> {
        self.table
            .select(&Match::Exact { owner, topic, key })
            .into_iter()
            .filter(|element| self.liveness.is_up(element.replica()))
            .collect()
    }

    /// Every element of `owner`, visible or not.
    pub fn by_owner(&self, owner: &OwnerId) -> Vec<Element> {
        self.table.select(&Match::Owner(owner))
    }

    /// Stored entries, including those of down replicas.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn has_pending_delta(&self) -> bool {
        self.delta.has_pending()
    }

    /// Start a new delta window at the current clock.
    pub fn reset_delta(&mut self) {
        self.delta.reset(self.current_clock());
    }

    /// Whole history and table, for full-state sync.
    pub fn extract_full(&self) -> Payload {
        Payload::new(
            Header {
                replica: self.replica.clone(),
                kind: HeaderKind::Full,
                history: self.history.clone(),
            },
            self.table.to_element_map(),
        )
    }

    /// Changes since the last reset, for incremental sync.
    pub fn extract_delta(&self) -> Payload {
        Payload::new(
            Header {
                replica: self.replica.clone(),
                kind: HeaderKind::Delta(self.delta.range()),
                history: CausalHistory::from_parts(
                    CausalContext::new(),
                    self.delta.cloud().clone(),
                ),
            },
            self.delta.elements().clone(),
        )
    }
}
