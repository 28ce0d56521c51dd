//! Version normalization and comparison utilities.
//!
//! Tool manifests are written by hand and rarely use strict semantic versions:
//! `v18`, `3.12`, `release-2.0.1` and `1.5.0-beta.1` all show up in practice. This
//! module normalizes such strings into [`semver::Version`] values so the rest of the
//! crate can compare them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use toolgraph::version::comparison::VersionComparator;
//! use semver::Version;
//!
//! assert_eq!(VersionComparator::parse_version("v18")?, Version::new(18, 0, 0));
//! assert_eq!(VersionComparator::parse_version("3.12")?, Version::new(3, 12, 0));
//!
//! let versions = vec!["1.0.0".to_string(), "v2.1".to_string(), "garbage".to_string()];
//! assert_eq!(VersionComparator::get_latest(&versions), Some(&"v2.1".to_string()));
//! # Ok::<(), toolgraph::core::ToolgraphError>(())
//! ```

use regex::Regex;
use semver::{Prerelease, Version};
use std::sync::LazyLock;

use crate::core::ToolgraphError;

static LOOSE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z.-]+))?(?:\+[0-9A-Za-z.-]+)?$")
        .expect("static version pattern is valid")
});

/// A parsed version together with how many numeric components were written.
///
/// The component count matters for caret and tilde ranges: `~1` and `~1.2` cover
/// different intervals even though both normalize to a `1.x.0` version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    /// The normalized version
    pub version: Version,
    /// Number of numeric components present in the input (1 to 3)
    pub components: usize,
}

/// Static helpers for comparing and normalizing tool versions.
pub struct VersionComparator;

impl VersionComparator {
    /// Parse a loosely-formatted version string into a semantic version.
    ///
    /// Accepts the prefixes `v`, `V`, `version-` and `release-`, and fills missing
    /// minor/patch components with zero.
    ///
    /// # Errors
    ///
    /// Returns [`ToolgraphError::InvalidVersion`] if the string is not a version.
    pub fn parse_version(version_str: &str) -> Result<Version, ToolgraphError> {
        Self::parse_detailed(version_str).map(|parsed| parsed.version)
    }

    /// Like [`parse_version`](Self::parse_version) but also reports how many numeric
    /// components were present.
    ///
    /// # Errors
    ///
    /// Returns [`ToolgraphError::InvalidVersion`] if the string is not a version.
    pub fn parse_detailed(version_str: &str) -> Result<ParsedVersion, ToolgraphError> {
        let trimmed = version_str.trim();
        let clean = if let Some(stripped) = trimmed.strip_prefix("version-") {
            stripped
        } else if let Some(stripped) = trimmed.strip_prefix("release-") {
            stripped
        } else {
            trimmed.trim_start_matches(['v', 'V'])
        };

        let invalid = || ToolgraphError::InvalidVersion {
            version: version_str.to_string(),
        };

        let captures = LOOSE_VERSION.captures(clean).ok_or_else(invalid)?;
        let component = |index: usize| -> Result<Option<u64>, ToolgraphError> {
            captures
                .get(index)
                .map(|m| m.as_str().parse::<u64>().map_err(|_| invalid()))
                .transpose()
        };

        let major = component(1)?.unwrap_or(0);
        let minor = component(2)?;
        let patch = component(3)?;
        let components = 1 + usize::from(minor.is_some()) + usize::from(patch.is_some());

        let mut version = Version::new(major, minor.unwrap_or(0), patch.unwrap_or(0));
        if let Some(pre) = captures.get(4) {
            version.pre = Prerelease::new(pre.as_str()).map_err(|_| invalid())?;
        }

        Ok(ParsedVersion {
            version,
            components,
        })
    }

    /// Return the highest parseable version string from a list.
    ///
    /// Unparseable entries are ignored.
    #[must_use]
    pub fn get_latest(versions: &[String]) -> Option<&String> {
        versions
            .iter()
            .filter_map(|raw| Self::parse_version(raw).ok().map(|parsed| (parsed, raw)))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, raw)| raw)
    }

    /// Whether moving from `from` to `to` crosses a major version boundary upwards.
    #[must_use]
    pub fn is_major_upgrade(from: &Version, to: &Version) -> bool {
        to.major > from.major
    }

    /// Whether moving from `from` to `to` lowers the version.
    #[must_use]
    pub fn is_downgrade(from: &Version, to: &Version) -> bool {
        to < from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_prefixes() {
        assert_eq!(VersionComparator::parse_version("1.0.0").unwrap(), Version::new(1, 0, 0));
        assert_eq!(VersionComparator::parse_version("v1.0.0").unwrap(), Version::new(1, 0, 0));
        assert_eq!(
            VersionComparator::parse_version("version-1.0.0").unwrap(),
            Version::new(1, 0, 0)
        );
        assert_eq!(
            VersionComparator::parse_version("release-2.0.1").unwrap(),
            Version::new(2, 0, 1)
        );
    }

    #[test]
    fn test_parse_partial_versions() {
        let parsed = VersionComparator::parse_detailed("v18").unwrap();
        assert_eq!(parsed.version, Version::new(18, 0, 0));
        assert_eq!(parsed.components, 1);

        let parsed = VersionComparator::parse_detailed("3.12").unwrap();
        assert_eq!(parsed.version, Version::new(3, 12, 0));
        assert_eq!(parsed.components, 2);
    }

    #[test]
    fn test_parse_prerelease_and_build() {
        let version = VersionComparator::parse_version("1.5.0-beta.1+build.7").unwrap();
        assert_eq!(version.pre.as_str(), "beta.1");
        assert_eq!((version.major, version.minor, version.patch), (1, 5, 0));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            VersionComparator::parse_version("latest"),
            Err(ToolgraphError::InvalidVersion { .. })
        ));
        assert!(VersionComparator::parse_version("").is_err());
        assert!(VersionComparator::parse_version("1.2.3.4").is_err());
    }

    #[test]
    fn test_get_latest() {
        let versions = vec![
            "v1.0.0".to_string(),
            "v1.1.0".to_string(),
            "2.0".to_string(),
            "not-a-version".to_string(),
        ];
        assert_eq!(VersionComparator::get_latest(&versions), Some(&"2.0".to_string()));

        let empty: Vec<String> = vec![];
        assert_eq!(VersionComparator::get_latest(&empty), None);
    }

    #[test]
    fn test_upgrade_downgrade_helpers() {
        let one = Version::new(1, 4, 0);
        let two = Version::new(2, 0, 0);
        assert!(VersionComparator::is_major_upgrade(&one, &two));
        assert!(!VersionComparator::is_major_upgrade(&two, &one));
        assert!(VersionComparator::is_downgrade(&two, &one));
    }
}
