//! toolgraph - dependency graph, conflict analysis and installation ordering for
//! developer tool catalogs.
//!
//! A catalog of tool manifests (runtimes, package managers, databases, editors,
//! ...) is loaded into a [`DependencyGraph`](graph::DependencyGraph). From there:
//!
//! - the [`ConflictDetector`](conflict::ConflictDetector) reports version clashes,
//!   dependency cycles, missing platform support and antagonistic tool pairs for a
//!   set of requested tools;
//! - the [`ConflictResolver`](resolution::ConflictResolver) applies fixes to a copy
//!   of the graph under a [`ResolutionPolicy`](resolution::ResolutionPolicy),
//!   asking the caller for confirmation through async callbacks;
//! - the [`DependencyResolver`](resolver::DependencyResolver) computes the
//!   installation order, batched for parallel installation, and can fall back to
//!   conflict resolution when the order cannot be computed.
//!
//! # Modules
//!
//! - [`core`] - error taxonomy and platform types
//! - [`manifest`] - tool manifests parsed from JSON or TOML
//! - [`version`] - loose version parsing and version ranges
//! - [`graph`] - the dependency graph and its builder
//! - [`conflict`] - conflict detection
//! - [`resolution`] - policy-driven conflict resolution
//! - [`resolver`] - installation ordering
//! - [`config`] - TOML configuration merged over defaults
//!
//! The library never prints and never installs a `tracing` subscriber; installers,
//! CLIs and visualizers are separate collaborators.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolgraph::config::ToolgraphConfig;
//! use toolgraph::graph::GraphBuilder;
//! use toolgraph::manifest::ToolManifest;
//!
//! let config = ToolgraphConfig::from_toml_str(include_str!("toolgraph.toml"))?;
//! let manifests = ToolManifest::catalog_from_json_str(include_str!("catalog.json"))?;
//! let graph = Arc::new(GraphBuilder::new(config.target).build(manifests).graph);
//!
//! let report = config.detector(Arc::clone(&graph)).detect_conflicts(&["react"], &config.detection);
//! let order = config.resolver(graph).resolve(&["react"], &config.resolve);
//! for batch in &order.batches {
//!     println!("{batch:?}");
//! }
//! ```

pub mod config;
pub mod conflict;
pub mod core;
pub mod graph;
pub mod manifest;
pub mod resolution;
pub mod resolver;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
