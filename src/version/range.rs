//! Version ranges as intervals over semantic versions.
//!
//! A [`VersionRange`] is an interval with an optional lower and an optional upper
//! [`Bound`]. Every constraint operator maps onto such an interval, which makes the
//! intersection of any number of constraints a constant-time operation:
//!
//! | Constraint | Interval |
//! |------------|----------|
//! | `*` | unbounded |
//! | `>=1.2.0` / `>1.2.0` | `[1.2.0, ∞)` / `(1.2.0, ∞)` |
//! | `<=1.5.0` / `<1.5.0` | `(-∞, 1.5.0]` / `(-∞, 1.5.0)` |
//! | `=1.2.3` or `1.2.3` | `[1.2.3, 1.2.3]` |
//! | `^1.2.3` | `[1.2.3, 2.0.0)` (`^0.2.3` → `[0.2.3, 0.3.0)`) |
//! | `~1.2.3` | `[1.2.3, 1.3.0)` (`~1` → `[1.0.0, 2.0.0)`) |
//! | `>=1.0, <2.0` | conjunction of the terms |
//!
//! Prerelease versions are ordered by semver precedence and receive no special
//! treatment when testing membership.

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::comparison::VersionComparator;
use crate::core::ToolgraphError;

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// The boundary version
    pub version: Version,
    /// Whether the boundary version itself is part of the range
    pub inclusive: bool,
}

impl Bound {
    /// An inclusive bound.
    #[must_use]
    pub const fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    /// An exclusive bound.
    #[must_use]
    pub const fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A contiguous interval of versions; possibly empty after intersection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionRange {
    /// Lower end, `None` for unbounded
    pub lower: Option<Bound>,
    /// Upper end, `None` for unbounded
    pub upper: Option<Bound>,
}

impl VersionRange {
    /// The unbounded range matching every version.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            lower: None,
            upper: None,
        }
    }

    /// Range containing exactly one version.
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            lower: Some(Bound::inclusive(version.clone())),
            upper: Some(Bound::inclusive(version)),
        }
    }

    /// Build a range from the inclusive `minVersion`/`maxVersion` pair of a manifest
    /// dependency.
    ///
    /// # Errors
    ///
    /// Returns [`ToolgraphError::InvalidVersion`] if either bound is not a version.
    pub fn from_bounds(min: Option<&str>, max: Option<&str>) -> Result<Self, ToolgraphError> {
        let lower = min
            .map(VersionComparator::parse_version)
            .transpose()?
            .map(Bound::inclusive);
        let upper = max
            .map(VersionComparator::parse_version)
            .transpose()?
            .map(Bound::inclusive);
        Ok(Self {
            lower,
            upper,
        })
    }

    /// Parse a constraint expression such as `>=1.0, <2.0` or `^3.1`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolgraphError::InvalidVersionConstraint`] for unknown operators or
    /// malformed versions.
    pub fn parse(constraint: &str) -> Result<Self, ToolgraphError> {
        let mut range = Self::any();
        for term in constraint.split(',') {
            let term = term.trim();
            let parsed = Self::parse_term(term).map_err(|reason| {
                ToolgraphError::InvalidVersionConstraint {
                    constraint: constraint.to_string(),
                    reason,
                }
            })?;
            range = range.intersect(&parsed);
        }
        Ok(range)
    }

    fn parse_term(term: &str) -> Result<Self, String> {
        if term.is_empty() || term == "*" || term.eq_ignore_ascii_case("latest") {
            return Ok(Self::any());
        }

        let (op, rest) = [">=", "<=", ">", "<", "=", "^", "~"]
            .iter()
            .find_map(|op| term.strip_prefix(op).map(|rest| (*op, rest.trim())))
            .unwrap_or(("=", term));

        let parsed = VersionComparator::parse_detailed(rest)
            .map_err(|_| format!("'{rest}' is not a version"))?;
        let version = parsed.version;

        let range = match op {
            ">=" => Self {
                lower: Some(Bound::inclusive(version)),
                upper: None,
            },
            ">" => Self {
                lower: Some(Bound::exclusive(version)),
                upper: None,
            },
            "<=" => Self {
                lower: None,
                upper: Some(Bound::inclusive(version)),
            },
            "<" => Self {
                lower: None,
                upper: Some(Bound::exclusive(version)),
            },
            "^" => {
                let ceiling = if version.major > 0 || parsed.components == 1 {
                    version.major.checked_add(1).map(|major| Version::new(major, 0, 0))
                } else if version.minor > 0 || parsed.components == 2 {
                    version.minor.checked_add(1).map(|minor| Version::new(0, minor, 0))
                } else {
                    version.patch.checked_add(1).map(|patch| Version::new(0, 0, patch))
                };
                Self {
                    lower: Some(Bound::inclusive(version)),
                    upper: ceiling.map(Bound::exclusive),
                }
            }
            "~" => {
                // A component already at its maximum has no next release to stop at
                let ceiling = if parsed.components == 1 {
                    version.major.checked_add(1).map(|major| Version::new(major, 0, 0))
                } else {
                    version.minor.checked_add(1).map(|minor| Version::new(version.major, minor, 0))
                };
                Self {
                    lower: Some(Bound::inclusive(version)),
                    upper: ceiling.map(Bound::exclusive),
                }
            }
            _ => Self::exact(version),
        };
        Ok(range)
    }

    /// Whether the range is unbounded on both ends.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Whether no version can satisfy the range.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Some(lower), Some(upper)) => match lower.version.cmp(&upper.version) {
                Ordering::Greater => true,
                Ordering::Equal => !(lower.inclusive && upper.inclusive),
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    /// Whether `version` lies inside the range.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        let above_lower = self.lower.as_ref().is_none_or(|bound| {
            if bound.inclusive {
                version >= &bound.version
            } else {
                version > &bound.version
            }
        });
        let below_upper = self.upper.as_ref().is_none_or(|bound| {
            if bound.inclusive {
                version <= &bound.version
            } else {
                version < &bound.version
            }
        });
        above_lower && below_upper
    }

    /// Intersection of two ranges. The result may be empty.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let lower = match (&self.lower, &other.lower) {
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        let upper = match (&self.upper, &other.upper) {
            (Some(a), Some(b)) => Some(match a.version.cmp(&b.version) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal => Bound {
                    version: a.version.clone(),
                    inclusive: a.inclusive && b.inclusive,
                },
            }),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        Self {
            lower,
            upper,
        }
    }

    /// Intersection of every range in `ranges`; the unbounded range when empty.
    pub fn intersect_all<'a>(ranges: impl IntoIterator<Item = &'a VersionRange>) -> Self {
        ranges.into_iter().fold(Self::any(), |acc, range| acc.intersect(range))
    }

    /// Pick a candidate from `available` that lies in the range.
    ///
    /// Returns the highest match when `prefer_latest` is set and the lowest otherwise.
    #[must_use]
    pub fn best_match<'a>(&self, available: &'a [Version], prefer_latest: bool) -> Option<&'a Version> {
        let mut matching = available.iter().filter(|v| self.contains(v));
        if prefer_latest {
            matching.max()
        } else {
            matching.min()
        }
    }

    /// The smallest easily-named version inside the range, used when no list of
    /// available versions is known.
    #[must_use]
    pub fn representative(&self) -> Option<Version> {
        if self.is_empty() {
            return None;
        }
        let candidate = match (&self.lower, &self.upper) {
            (Some(lower), _) if lower.inclusive => lower.version.clone(),
            (Some(lower), _) => {
                let mut bumped = lower.version.clone();
                bumped.pre = semver::Prerelease::EMPTY;
                bumped.patch = bumped.patch.checked_add(1)?;
                bumped
            }
            (None, Some(upper)) if upper.inclusive => upper.version.clone(),
            _ => Version::new(0, 0, 0),
        };
        self.contains(&candidate).then_some(candidate)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.lower, &self.upper) {
            (None, None) => f.write_str("*"),
            (Some(lower), Some(upper))
                if lower.inclusive && upper.inclusive && lower.version == upper.version =>
            {
                write!(f, "={}", lower.version)
            }
            (lower, upper) => {
                let mut parts = Vec::with_capacity(2);
                if let Some(lower) = lower {
                    let op = if lower.inclusive { ">=" } else { ">" };
                    parts.push(format!("{op}{}", lower.version));
                }
                if let Some(upper) = upper {
                    let op = if upper.inclusive { "<=" } else { "<" };
                    parts.push(format!("{op}{}", upper.version));
                }
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl FromStr for VersionRange {
    type Err = ToolgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
