//! Version handling for tool manifests.
//!
//! - [`comparison`] normalizes hand-written version strings into semver versions
//! - [`range`] models constraints as intervals and intersects them
//!
//! Dependency bounds in manifests (`minVersion`, `maxVersion`) become
//! [`VersionRange`]s; the conflict detector intersects all ranges that apply to a
//! tool and reports an empty intersection as a version conflict.

pub mod comparison;
pub mod range;

pub use comparison::{ParsedVersion, VersionComparator};
pub use range::{Bound, VersionRange};
