//! # tracker-state
//!
//! Replicated presence state for the tracker.
//!
//! Each node owns one [`ReplicaState`]: an add-wins set of presence entries
//! (`owner`, `topic`, `key`, metadata), each tagged with the [`Dot`] of the
//! add that created it. Replicas exchange full or delta [`Payload`]s and
//! merge them by dot, so all replicas that saw the same operations hold the
//! same entries regardless of delivery order or duplication.
//!
//! This crate provides:
//! - Local join/leave with delta accumulation
//! - Full and delta extraction, validated merge with joined/left diffs
//! - Soft liveness filtering and permanent removal of dead replicas
//! - [`SharedState`], a snapshot-on-write wrapper for async callers
//!
//! ## Example
//!
//! ```rust
//! use tracker_state::{OwnerId, ReplicaState};
//!
//! let mut a = ReplicaState::new("a");
//! let mut b = ReplicaState::new("b");
//!
//! a.join(OwnerId::new("pid1"), "room:1", "user1", None);
//! b.merge(&a.extract_delta());
//! a.reset_delta();
//!
//! a.leave(&OwnerId::new("pid1"), "room:1", "user1");
//! let diff = b.merge(&a.extract_delta());
//! assert_eq!(diff.left.len(), 1);
//! assert!(b.is_empty());
//! ```

pub mod config;
pub mod delta;
pub mod element;
pub mod error;
pub mod liveness;
pub mod merge;
pub mod payload;
pub mod shared;
pub mod state;
pub mod table;

pub use config::{StateConfig, StateConfigBuilder};
pub use delta::{ClockRange, DeltaBuffer};
pub use element::{empty_meta, Element, ElementData, ElementMap, Meta, OwnerId};
pub use error::{PayloadError, Result, StateError};
pub use liveness::{Liveness, NodeLiveness};
pub use merge::Diff;
pub use payload::{Header, HeaderKind, Payload};
pub use shared::SharedState;
pub use state::ReplicaState;
pub use table::{ElementTable, Match, TableEntry};

pub use tracker_core::{CausalContext, CausalHistory, Clock, Dot, DotCloud, ReplicaId};
