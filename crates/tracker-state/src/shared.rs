//! Concurrent access to one replica.
//!
//! [`ReplicaState`] is a plain value with a single logical writer.
//! `SharedState` makes that concrete for async callers: mutations queue on a
//! writer gate and work on a private copy, and the result is published by
//! swapping an `Arc`. Readers take a snapshot and never see a table
//! mid-swap.

use crate::config::StateConfig;
use crate::element::{Element, Meta, OwnerId};
use crate::error::{Result, StateError};
use crate::merge::{union_clouds, Diff};
use crate::payload::Payload;
use crate::state::ReplicaState;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use tracker_core::{Dot, ReplicaId};

pub struct SharedState {
    config: StateConfig,
    current: RwLock<Arc<ReplicaState>>,
    writer: Mutex<()>,
}

impl SharedState {
    pub fn new(replica: impl Into<ReplicaId>, config: StateConfig) -> Self {
        Self::from_state(ReplicaState::new(replica), config)
    }

    pub fn from_state(state: ReplicaState, config: StateConfig) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// The latest published state.
    pub fn snapshot(&self) -> Arc<ReplicaState> {
        self.current.read().clone()
    }

    fn publish(&self, state: ReplicaState) {
        *self.current.write() = Arc::new(state);
    }

    /// Run `f` on a copy of the state under the writer gate, then publish.
    async fn edit<R>(&self, f: impl FnOnce(&mut ReplicaState) -> R) -> R {
        let _gate = self.writer.lock().await;
        let mut next = ReplicaState::clone(&self.snapshot());
        let out = f(&mut next);
        self.publish(next);
        out
    }

    pub async fn join(
        &self,
        owner: impl Into<OwnerId>,
        topic: impl Into<String>,
        key: impl Into<String>,
        meta: Option<Meta>,
    ) -> Dot {
        let (owner, topic, key) = (owner.into(), topic.into(), key.into());
        self.edit(move |state| state.join(owner, topic, key, meta))
            .await
    }

    pub async fn leave(&self, owner: &OwnerId, topic: &str, key: &str) -> Vec<Element> {
        self.edit(|state| state.leave(owner, topic, key)).await
    }

    pub async fn leave_owner(&self, owner: &OwnerId) -> Vec<Element> {
        self.edit(|state| state.leave_owner(owner)).await
    }

    /// Merge a remote payload.
    ///
    /// Large cloud unions run on a blocking worker; the merge waits for it
    /// without a timeout. Nothing is published if validation or the worker
    /// fails.
    pub async fn merge(&self, payload: &Payload) -> Result<Diff> {
        let _gate = self.writer.lock().await;
        let mut next = ReplicaState::clone(&self.snapshot());
        next.check_payload(payload)?;

        let local = next.cloud();
        let remote = payload.header.history.cloud();
        let unioned = if local.len() + remote.len() >= self.config.parallel_union_threshold {
            let (local, remote) = (local.clone(), remote.clone());
            tokio::task::spawn_blocking(move || union_clouds(&local, &remote))
                .await
                .map_err(|err| StateError::UnionTask(err.to_string()))?
        } else {
            union_clouds(local, remote)
        };

        let diff = next.apply_merge(payload, unioned);
        self.publish(next);
        self.log_diff("merge", &diff);
        Ok(diff)
    }

    pub async fn node_up(&self, replica: &str) -> Diff {
        let diff = self.edit(|state| state.node_up(replica)).await;
        self.log_diff("node_up", &diff);
        diff
    }

    pub async fn node_down(&self, replica: &str) -> Diff {
        let diff = self.edit(|state| state.node_down(replica)).await;
        self.log_diff("node_down", &diff);
        diff
    }

    pub async fn remove_down_nodes(&self, replica: &str) -> Vec<Element> {
        self.edit(|state| state.remove_down_nodes(replica)).await
    }

    pub async fn reset_delta(&self) {
        self.edit(|state| state.reset_delta()).await
    }

    /// Extract the pending delta and start a new window, in one step.
    pub async fn take_delta(&self) -> Option<Payload> {
        self.edit(|state| {
            if !state.has_pending_delta() {
                return None;
            }
            let payload = state.extract_delta();
            state.reset_delta();
            Some(payload)
        })
        .await
    }

    fn log_diff(&self, op: &str, diff: &Diff) {
        if !self.config.trace_diffs {
            return;
        }
        let snapshot = self.snapshot();
        let replica = snapshot.replica();
        for element in &diff.joined {
            debug!(%replica, op, owner = %element.owner, topic = %element.topic, key = %element.key, dot = %element.dot, "joined");
        }
        for element in &diff.left {
            debug!(%replica, op, owner = %element.owner, topic = %element.topic, key = %element.key, dot = %element.dot, "left");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(replica: &str) -> SharedState {
        SharedState::new(replica, StateConfig::default())
    }

    #[tokio::test]
    async fn test_snapshot_is_stable_across_writes() {
        let state = shared("a");
        let before = state.snapshot();
        state.join("pid1", "room:1", "user1", None).await;

        assert!(before.is_empty());
        assert_eq!(state.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_joins_are_serialized() {
        let state = Arc::new(shared("a"));
        let mut handles = Vec::new();
        for i in 0..32 {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move {
                state.join(format!("pid{i}"), "room:1", "user", None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = state.snapshot();
        assert_eq!(snapshot.len(), 32);
        assert_eq!(snapshot.current_clock(), 32);
    }

    #[tokio::test]
    async fn test_merge_on_blocking_worker() {
        let config = StateConfig::builder().parallel_union_threshold(0).build();
        let a = SharedState::new("a", config);
        let b = shared("b");
        b.join("pid1", "room:1", "user1", None).await;

        let diff = a.merge(&b.snapshot().extract_full()).await.unwrap();
        assert_eq!(diff.joined.len(), 1);
        assert_eq!(a.snapshot().by_topic("room:1").len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_merge_publishes_nothing() {
        let a = shared("a");
        let b = shared("b");
        b.join("pid1", "room:1", "user1", None).await;

        let mut forged = b.snapshot().extract_full();
        forged.header.history.context_mut().set("a", 3);
        let before = a.snapshot();

        assert!(matches!(
            a.merge(&forged).await,
            Err(StateError::MalformedPayload { .. })
        ));
        assert!(Arc::ptr_eq(&before, &a.snapshot()));
    }

    #[tokio::test]
    async fn test_take_delta_resets_window() {
        let state = shared("a");
        assert!(state.take_delta().await.is_none());

        state.join("pid1", "room:1", "user1", None).await;
        let delta = state.take_delta().await.unwrap();
        assert_eq!(delta.elements.len(), 1);
        assert!(!state.snapshot().has_pending_delta());
        assert!(state.take_delta().await.is_none());
    }

    #[tokio::test]
    async fn test_liveness_through_shared_state() {
        let a = shared("a");
        let b = shared("b");
        b.join("pid1", "room:1", "user1", None).await;
        a.merge(&b.snapshot().extract_full()).await.unwrap();

        assert_eq!(a.node_down("b").await.left.len(), 1);
        assert!(a.snapshot().all_live().is_empty());
        assert_eq!(a.node_up("b").await.joined.len(), 1);

        a.node_down("b").await;
        assert_eq!(a.remove_down_nodes("b").await.len(), 1);
        assert!(a.snapshot().is_empty());
    }
}
