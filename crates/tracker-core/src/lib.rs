//! Causal bookkeeping for the presence tracker.
//!
//! Every add or remove performed by a replica is identified by a [`Dot`],
//! a `(replica, clock)` pair. A replica's knowledge of history is split in
//! two parts:
//!
//! - a [`CausalContext`] (version vector) holding, per replica, the highest
//!   clock observed *contiguously* from 1;
//! - a [`DotCloud`] holding the dots observed out of order, i.e. the
//!   exceptions to contiguity.
//!
//! [`CausalHistory`] pairs the two, answers "has this dot been observed?"
//! and folds contiguous cloud dots back into the context (compaction).
//!
//! ```rust
//! use tracker_core::{CausalHistory, Dot};
//!
//! let mut history = CausalHistory::new();
//! history.cloud_mut().insert(Dot::new("a", 2));
//! assert!(!history.observed(&Dot::new("a", 1)));
//!
//! history.cloud_mut().insert(Dot::new("a", 1));
//! history.compact();
//! assert_eq!(history.context().get("a"), 2);
//! assert!(history.cloud().is_empty());
//! ```

pub mod cloud;
pub mod context;
pub mod dot;
pub mod history;
pub mod lattice;

pub use cloud::DotCloud;
pub use context::CausalContext;
pub use dot::{Clock, Dot, ReplicaId};
pub use history::CausalHistory;
pub use lattice::Lattice;
