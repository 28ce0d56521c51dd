//! Error handling for toolgraph
//!
//! The crate separates two kinds of failure:
//!
//! 1. **Domain outcomes** such as a missing target tool, an unbreakable cycle or an
//!    unsatisfiable version range. These are ordinary results and are reported as
//!    data (`success = false`, `errors`, `remaining_conflicts`) by the resolver and
//!    conflict components, never as `Err`.
//! 2. **Input and programmer errors** such as an unparseable version constraint, an
//!    unknown platform name or an unknown algorithm name. These are represented by
//!    [`ToolgraphError`].
//!
//! [`ErrorContext`] wraps a [`ToolgraphError`] with an actionable suggestion for the
//! command-line collaborator that renders it. The library itself never prints.
//!
//! # Examples
//!
//! ```rust,no_run
//! use toolgraph::core::{ErrorContext, ToolgraphError, user_friendly_error};
//!
//! let error = ToolgraphError::UnknownPlatform { name: "beos".to_string() };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! assert!(context.suggestion.is_some());
//! println!("{context}");
//! ```

use std::fmt;
use thiserror::Error;

/// The main error type for toolgraph operations.
#[derive(Error, Debug)]
pub enum ToolgraphError {
    /// An algorithm name did not match any known traversal or resolution algorithm
    #[error("Unknown algorithm: {name}")]
    UnknownAlgorithm {
        /// The name that failed to parse
        name: String,
    },

    /// A version string could not be normalized to a semantic version
    #[error("Invalid version: {version}")]
    InvalidVersion {
        /// The version string as written in the manifest
        version: String,
    },

    /// A version constraint used an unsupported operator or malformed version
    #[error("Invalid version constraint: {constraint}")]
    InvalidVersionConstraint {
        /// The constraint string as written
        constraint: String,
        /// Why parsing failed
        reason: String,
    },

    /// Unknown platform name
    #[error("Unknown platform: {name}")]
    UnknownPlatform {
        /// The platform name that failed to parse
        name: String,
    },

    /// Unknown CPU architecture name
    #[error("Unknown architecture: {name}")]
    UnknownArchitecture {
        /// The architecture name that failed to parse
        name: String,
    },

    /// A dependency cycle made a strict ordering impossible
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// The cycle rendered as `a → b → a`
        chain: String,
    },

    /// Referenced tool is not part of the graph
    #[error("Tool '{id}' not found")]
    ToolNotFound {
        /// Id of the missing tool
        id: String,
    },

    /// Manifest content could not be parsed
    #[error("Invalid manifest for '{id}': {reason}")]
    ManifestParseError {
        /// Tool id, or `<unknown>` when the id itself could not be read
        id: String,
        /// Specific reason for the parsing failure
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Semantic version parsing error
    #[error("Semver parsing error: {0}")]
    SemverError(#[from] semver::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// A [`ToolgraphError`] enriched with a suggestion and optional details.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: ToolgraphError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: ToolgraphError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// Errors that are not a [`ToolgraphError`] are wrapped as [`ToolgraphError::Other`]
/// and keep their full `anyhow` context chain in `details`.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<ToolgraphError>() {
        Ok(error) => error,
        Err(other) => {
            let chain = other.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>();
            let context = ErrorContext::new(ToolgraphError::Other {
                message: other.to_string(),
            });
            return if chain.is_empty() {
                context
            } else {
                context.with_details(chain.join(": "))
            };
        }
    };

    match &error {
        ToolgraphError::UnknownAlgorithm { .. } => ErrorContext::new(error).with_suggestion(
            "Use one of: depth-first, breadth-first, topological, dependency-first, category-first \
             (traversal) or topological, dfs, bfs, eager, lazy (resolution)",
        ),
        ToolgraphError::InvalidVersion { .. } => ErrorContext::new(error)
            .with_suggestion("Use a semantic version such as '1.2.3' (a leading 'v' is accepted)"),
        ToolgraphError::InvalidVersionConstraint { reason, .. } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_suggestion(
                    "Supported operators are >=, >, <=, <, =, ^ and ~; join bounds with commas",
                )
                .with_details(details)
        }
        ToolgraphError::UnknownPlatform { .. } => ErrorContext::new(error)
            .with_suggestion("Supported platforms are 'windows', 'macos' and 'linux'"),
        ToolgraphError::UnknownArchitecture { .. } => ErrorContext::new(error)
            .with_suggestion("Supported architectures are 'x64', 'x86' and 'arm64'"),
        ToolgraphError::CircularDependency { .. } => ErrorContext::new(error).with_suggestion(
            "Mark one of the dependencies in the cycle as optional so it can be deferred",
        ),
        ToolgraphError::ToolNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Check that a manifest for the tool was loaded into the catalog"),
        ToolgraphError::ConfigError { .. } | ToolgraphError::TomlError(_) => {
            ErrorContext::new(error).with_suggestion("Check the configuration file syntax")
        }
        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_display() {
        let error = ToolgraphError::CircularDependency {
            chain: "a → b → a".to_string(),
        };
        assert_eq!(error.to_string(), "Circular dependency detected: a → b → a");

        let error = ToolgraphError::ToolNotFound {
            id: "node".to_string(),
        };
        assert_eq!(error.to_string(), "Tool 'node' not found");
    }

    #[test]
    fn test_error_context_display() {
        let context = ErrorContext::new(ToolgraphError::UnknownPlatform {
            name: "beos".to_string(),
        })
        .with_details("manifest 'foo'")
        .with_suggestion("use linux");

        let rendered = context.to_string();
        assert!(rendered.contains("Unknown platform: beos"));
        assert!(rendered.contains("Details: manifest 'foo'"));
        assert!(rendered.contains("Suggestion: use linux"));
    }

    #[test]
    fn test_user_friendly_error_adds_suggestion() {
        let error = anyhow::Error::from(ToolgraphError::UnknownAlgorithm {
            name: "random".to_string(),
        });
        let context = user_friendly_error(error);
        assert!(matches!(context.error, ToolgraphError::UnknownAlgorithm { .. }));
        assert!(context.suggestion.unwrap().contains("topological"));
    }

    #[test]
    fn test_user_friendly_error_keeps_foreign_chain() {
        let result: anyhow::Result<()> =
            Err(anyhow::anyhow!("inner failure")).context("loading configuration");
        let context = user_friendly_error(result.unwrap_err());
        assert!(matches!(context.error, ToolgraphError::Other { .. }));
        assert_eq!(context.error.to_string(), "loading configuration");
        assert_eq!(context.details.as_deref(), Some("inner failure"));
    }
}
