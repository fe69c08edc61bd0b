//! # tracker-sync
//!
//! In-memory anti-entropy for presence replicas.
//!
//! [`SyncCluster`] owns a set of [`tracker_state::ReplicaState`]s and moves
//! delta and full payloads between them over a [`NetworkSimulator`] that can
//! drop, duplicate and reorder messages. It is a test harness for
//! convergence, not a transport.
//!
//! ```rust
//! use tracker_sync::{NetworkConfig, SyncCluster};
//!
//! let mut cluster = SyncCluster::new(3, NetworkConfig::lossy(0.3));
//! cluster.join(0, "pid1", "room:1", "user1", None);
//! cluster.join(2, "pid2", "room:1", "user2", None);
//!
//! while !cluster.is_converged() {
//!     cluster.full_sync_round();
//!     cluster.retransmit_and_process();
//! }
//! assert_eq!(cluster.replica(1).by_topic("room:1").len(), 2);
//! ```

pub mod cluster;
pub mod network;

pub use cluster::{DiffCause, DiffEvent, SyncCluster};
pub use network::{Envelope, NetworkConfig, NetworkSimulator, NetworkStats, SyncMessage};
