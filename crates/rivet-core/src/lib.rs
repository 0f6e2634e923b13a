//! Core data types for Rivet.
//!
//! This crate defines the plain data a restore works on: package versions and
//! ranges, target frameworks, package identities, dependencies and asset
//! flags, the runtime identifier graph, the `rivet.toml` manifest, the restore
//! request, the lock file model, and global configuration.
//!
//! This crate is intentionally free of async code and network I/O.

pub mod config;
pub mod dependency;
pub mod framework;
pub mod lockfile;
pub mod manifest;
pub mod package;
pub mod request;
pub mod runtime_graph;
pub mod version;
