//! Core types shared by every toolgraph component.
//!
//! - [`ToolgraphError`] and [`ErrorContext`] for input and programmer errors
//! - [`Platform`], [`Architecture`] and [`TargetPlatform`] describing where tools run
//!
//! Domain outcomes (missing tools, unbreakable cycles, unsatisfiable ranges) are not
//! errors in this crate; they are returned as data by the resolver components.

pub mod error;
pub mod platform;

pub use error::{ErrorContext, ToolgraphError, user_friendly_error};
pub use platform::{Architecture, Platform, TargetPlatform};
