//! Restore engine: nearest-wins graph walking per target framework and RID,
//! framework compatibility, runtime graph expansion, and lock file assembly.

pub mod assemble;
pub mod cache;
pub mod compat;
pub mod conflict;
pub mod content;
pub mod failure;
pub mod graph;
pub mod provider;
pub mod restore;
pub mod runtime;
pub mod walker;

pub use provider::{DependencyProvider, FeedProvider, InMemoryPackage, InMemoryProvider, ProviderError};
pub use restore::{restore, RestoreOptions, RestoreResult};
