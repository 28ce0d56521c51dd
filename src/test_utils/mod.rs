//! Test utilities for toolgraph
//!
//! This module provides helpers shared by unit and integration tests:
//! - one-time tracing initialization
//! - a fluent [`ToolBuilder`] for manifests
//! - ready-made catalogs in [`CatalogFixture`]
//!
//! # Example
//!
//! ```rust,ignore
//! use toolgraph::test_utils::{ToolBuilder, graph_of};
//!
//! let graph = graph_of(vec![
//!     ToolBuilder::runtime("node").build(),
//!     ToolBuilder::framework("react").requires("node").build(),
//! ]);
//! assert!(graph.has_path("react", "node"));
//! ```

pub mod builder;
pub mod fixtures;

pub use builder::{ToolBuilder, graph_of};
pub use fixtures::CatalogFixture;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, logging stays off.
///
/// ```bash
/// RUST_LOG=toolgraph=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
