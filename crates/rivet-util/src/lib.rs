//! Shared utilities for Rivet.
//!
//! Cross-cutting concerns used by all other Rivet crates: the unified error
//! type, filesystem helpers, hashing for restore fingerprints, and terminal
//! status output.

pub mod errors;
pub mod fs;
pub mod hash;
pub mod progress;
