//! Algorithm selection and options for [`DependencyResolver`](super::DependencyResolver).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::core::ToolgraphError;
use crate::manifest::DependencyType;

/// Installation-order algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionAlgorithm {
    /// Kahn's algorithm with one batch per ready set
    #[default]
    Topological,
    /// Post-order depth-first descent from the requested tools
    Dfs,
    /// Kahn's algorithm with a FIFO queue in breadth-first discovery order
    Bfs,
    /// Topological with optional and suggested dependencies included
    Eager,
    /// Topological over required dependencies only
    Lazy,
}

impl ResolutionAlgorithm {
    /// Every algorithm.
    pub const ALL: [ResolutionAlgorithm; 5] = [
        ResolutionAlgorithm::Topological,
        ResolutionAlgorithm::Dfs,
        ResolutionAlgorithm::Bfs,
        ResolutionAlgorithm::Eager,
        ResolutionAlgorithm::Lazy,
    ];

    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResolutionAlgorithm::Topological => "topological",
            ResolutionAlgorithm::Dfs => "dfs",
            ResolutionAlgorithm::Bfs => "bfs",
            ResolutionAlgorithm::Eager => "eager",
            ResolutionAlgorithm::Lazy => "lazy",
        }
    }
}

impl fmt::Display for ResolutionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionAlgorithm {
    type Err = ToolgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "topological" | "topo" | "kahn" => Ok(ResolutionAlgorithm::Topological),
            "dfs" | "depth-first" => Ok(ResolutionAlgorithm::Dfs),
            "bfs" | "breadth-first" => Ok(ResolutionAlgorithm::Bfs),
            "eager" => Ok(ResolutionAlgorithm::Eager),
            "lazy" => Ok(ResolutionAlgorithm::Lazy),
            _ => Err(ToolgraphError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Options of a resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    /// Algorithm used by [`DependencyResolver::resolve`](super::DependencyResolver::resolve)
    pub algorithm: ResolutionAlgorithm,
    /// Follow optional dependencies
    pub include_optional: bool,
    /// Follow suggested dependencies
    pub include_suggested: bool,
    /// Group independent tools into shared batches; otherwise one tool per batch
    pub enable_parallel: bool,
    /// Memoize orders per request and graph revision
    pub enable_caching: bool,
    /// Soft deadline checked once per processed tool
    #[serde(serialize_with = "serialize_millis")]
    pub max_execution_time: Duration,
    /// Conflict-resolution rounds before failure is final
    pub max_retries: usize,
    /// Leave tools reported as installed out of the sequence
    pub skip_installed: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            algorithm: ResolutionAlgorithm::Topological,
            include_optional: true,
            include_suggested: false,
            enable_parallel: true,
            enable_caching: true,
            max_execution_time: Duration::from_secs(30),
            max_retries: 3,
            skip_installed: false,
        }
    }
}

impl ResolveOptions {
    /// Default options with `algorithm` selected.
    #[must_use]
    pub fn with_algorithm(algorithm: ResolutionAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Defaults overridden by every field set in `partial`.
    #[must_use]
    pub fn merged_with_defaults(partial: PartialResolveOptions) -> Self {
        let defaults = Self::default();
        Self {
            algorithm: partial.algorithm.unwrap_or(defaults.algorithm),
            include_optional: partial.include_optional.unwrap_or(defaults.include_optional),
            include_suggested: partial.include_suggested.unwrap_or(defaults.include_suggested),
            enable_parallel: partial.enable_parallel.unwrap_or(defaults.enable_parallel),
            enable_caching: partial.enable_caching.unwrap_or(defaults.enable_caching),
            max_execution_time: partial
                .max_execution_time_ms
                .map_or(defaults.max_execution_time, Duration::from_millis),
            max_retries: partial.max_retries.unwrap_or(defaults.max_retries),
            skip_installed: partial.skip_installed.unwrap_or(defaults.skip_installed),
        }
    }

    /// The options an algorithm actually runs with: eager turns optional and
    /// suggested dependencies on, lazy turns them off.
    #[must_use]
    pub(crate) fn effective(mut self) -> Self {
        match self.algorithm {
            ResolutionAlgorithm::Eager => {
                self.include_optional = true;
                self.include_suggested = true;
            }
            ResolutionAlgorithm::Lazy => {
                self.include_optional = false;
                self.include_suggested = false;
            }
            _ => {}
        }
        self
    }

    /// Whether edges of this type are followed.
    #[must_use]
    pub(crate) const fn follows(&self, dependency_type: DependencyType) -> bool {
        match dependency_type {
            DependencyType::Required => true,
            DependencyType::Optional => self.include_optional,
            DependencyType::Suggested => self.include_suggested,
        }
    }
}

/// `[resolve]` overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialResolveOptions {
    pub algorithm: Option<ResolutionAlgorithm>,
    pub include_optional: Option<bool>,
    pub include_suggested: Option<bool>,
    pub enable_parallel: Option<bool>,
    pub enable_caching: Option<bool>,
    pub max_execution_time_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub skip_installed: Option<bool>,
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names() {
        for algorithm in ResolutionAlgorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<ResolutionAlgorithm>().unwrap(), algorithm);
        }
        assert_eq!("Depth_First".parse::<ResolutionAlgorithm>().unwrap(), ResolutionAlgorithm::Dfs);
        assert!(matches!(
            "random".parse::<ResolutionAlgorithm>(),
            Err(ToolgraphError::UnknownAlgorithm { .. })
        ));
    }

    #[test]
    fn test_eager_and_lazy_override_inclusion() {
        let eager = ResolveOptions {
            include_optional: false,
            ..ResolveOptions::with_algorithm(ResolutionAlgorithm::Eager)
        }
        .effective();
        assert!(eager.include_optional && eager.include_suggested);

        let lazy = ResolveOptions::with_algorithm(ResolutionAlgorithm::Lazy).effective();
        assert!(lazy.follows(DependencyType::Required));
        assert!(!lazy.follows(DependencyType::Optional));
        assert!(!lazy.follows(DependencyType::Suggested));
    }

    #[test]
    fn test_partial_merge() {
        let partial: PartialResolveOptions =
            toml::from_str("algorithm = \"bfs\"\nmax-execution-time-ms = 500\n").unwrap();
        let options = ResolveOptions::merged_with_defaults(partial);
        assert_eq!(options.algorithm, ResolutionAlgorithm::Bfs);
        assert_eq!(options.max_execution_time, Duration::from_millis(500));
        assert_eq!(options.max_retries, 3);
        assert!(options.include_optional);
    }
}
