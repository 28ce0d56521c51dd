//! Integration test suite for toolgraph
//!
//! These tests drive the public API end to end: manifests are parsed from JSON,
//! built into a graph, checked for conflicts, resolved under a policy and ordered
//! for installation.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=toolgraph=debug cargo test --test integration -- --nocapture
//! ```
//!
//! # Test Organization
//!
//! - **catalog_flow**: catalog parsing, graph building and installation ordering
//! - **conflict_resolution**: detection followed by policy-driven resolution
//! - **config**: TOML configuration wiring the components together
//! - **properties**: property tests for ordering invariants on random graphs

mod catalog_flow;
mod config;
mod conflict_resolution;
mod properties;
