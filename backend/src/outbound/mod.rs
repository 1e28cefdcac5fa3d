//! Outbound adapters implementing domain ports.
//!
//! - **memory_store**: mutex-guarded in-process [`CommitStore`] with atomic
//!   batches and version preconditions.
//!
//! Adapters translate between domain types and storage representations and
//! contain no business rules.
//!
//! [`CommitStore`]: crate::domain::ports::CommitStore

pub mod memory_store;

pub use memory_store::InMemoryCommitStore;
