//! Cache coordination for offline-first catalog access.
//!
//! This module owns the snapshot lifecycle:
//!
//! - `CacheCoordinator`: decides snapshot-vs-fetch, coalesces concurrent
//!   first reads, and is the only component that touches the local store
//! - `MutationService`: serialized create/update/delete against the snapshot
//!
//! All reads after the first load are answered from the snapshot with no
//! network access.

pub mod coordinator;
pub mod mutations;

pub use coordinator::{CacheCoordinator, CacheState, LoadError};
pub use mutations::{MutationService, MutationError};
