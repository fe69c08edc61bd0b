//! Merging a remote payload into local state.
//!
//! Elements are matched by dot only:
//!
//! ```text
//! joins   = { d ∈ remote.elements | ¬ observed(local, d) }
//! leaves  = { d ∈ local.table     | observed(remote, d) ∧ d ∉ remote.elements }
//! context = local.context ⊔ remote.context
//! cloud   = compact(local.cloud ∪ remote.cloud)
//! ```
//!
//! The two sets are disjoint: a join is unknown locally, a leave is in the
//! local table. The union of the clouds depends on neither and may be
//! computed elsewhere (see [`crate::shared::SharedState::merge`]).

use crate::element::Element;
use crate::error::{Result, StateError};
use crate::payload::Payload;
use crate::state::ReplicaState;
use crate::table::ElementTable;
use tracing::debug;
use tracker_core::{CausalHistory, DotCloud};

/// Elements that appeared and disappeared as the result of an operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Diff {
    pub joined: Vec<Element>,
    pub left: Vec<Element>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Step 1 of a merge: union of the local and remote clouds.
pub fn union_clouds(local: &DotCloud, remote: &DotCloud) -> DotCloud {
    local.union(remote)
}

impl ReplicaState {
    /// Merge `payload`, panicking if the sender broke the payload contract.
    ///
    /// Convergence only holds for well-formed payloads, so a malformed one
    /// is treated as a bug in the caller rather than an error to recover
    /// from. Use [`try_merge`](Self::try_merge) to inspect the violation.
    pub fn merge(&mut self, payload: &Payload) -> Diff {
        match self.try_merge(payload) {
            Ok(diff) => diff,
            Err(err) => panic!("merge contract violated: {err}"),
        }
    }

    /// Merge `payload`, leaving state untouched if it is malformed.
    pub fn try_merge(&mut self, payload: &Payload) -> Result<Diff> {
        self.check_payload(payload)?;
        let unioned = union_clouds(self.history.cloud(), payload.header.history.cloud());
        Ok(self.apply_merge(payload, unioned))
    }

    pub(crate) fn check_payload(&self, payload: &Payload) -> Result<()> {
        payload
            .validate(&self.replica, self.current_clock())
            .map_err(|source| StateError::MalformedPayload {
                from: payload.header.replica.clone(),
                source,
            })
    }

    /// Steps 2-6 of a merge, given the already unioned cloud.
    ///
    /// Nothing in `self` changes until the final swap of table and history.
    pub(crate) fn apply_merge(&mut self, payload: &Payload, unioned: DotCloud) -> Diff {
        let remote = &payload.header;

        let joined: Vec<Element> = payload
            .elements
            .iter()
            .filter(|(dot, _)| !self.history.observed(dot))
            .map(|(dot, data)| Element::from_data(dot.clone(), data.clone()))
            .collect();

        let mut retained = Vec::with_capacity(self.table.len());
        let mut left = Vec::new();
        for element in self.table.iter() {
            if remote.observed(&element.dot) && !payload.elements.contains_key(&element.dot) {
                // the dot stays observed through the unioned cloud, so a
                // stale copy elsewhere cannot bring the element back
                left.push(element);
            } else {
                retained.push(element);
            }
        }

        let mut context = self.history.context().clone();
        context.merge(remote.history.context());
        let mut history = CausalHistory::from_parts(context, unioned);
        history.compact();

        let table = ElementTable::from_elements(retained.into_iter().chain(joined.iter().cloned()));

        for element in &left {
            self.delta.record_removal(element.dot.clone());
        }
        self.table = table;
        self.history = history;

        debug!(
            replica = %self.replica,
            from = %remote.replica,
            delta = remote.is_delta(),
            joined = joined.len(),
            left = left.len(),
            "merged payload"
        );
        Diff { joined, left }
    }
}
