//! Target platform and CPU architecture types.
//!
//! Manifests declare the platforms and architectures a tool supports, and every
//! resolution runs against a single [`TargetPlatform`]. Both enums serialize to the
//! lowercase names used in manifests and accept the common aliases (`darwin`,
//! `win32`, `amd64`, `aarch64`, ...) when parsed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::ToolgraphError;

/// Operating system family a tool can be installed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Microsoft Windows
    #[serde(alias = "win32", alias = "win")]
    Windows,
    /// Apple macOS
    #[serde(alias = "darwin", alias = "osx")]
    Macos,
    /// Linux distributions
    Linux,
}

impl Platform {
    /// All platforms, in a stable order.
    pub const ALL: [Platform; 3] = [Platform::Windows, Platform::Macos, Platform::Linux];

    /// Lowercase manifest name of the platform.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Macos => "macos",
            Platform::Linux => "linux",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ToolgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "windows" | "win32" | "win" => Ok(Platform::Windows),
            "macos" | "darwin" | "osx" => Ok(Platform::Macos),
            "linux" => Ok(Platform::Linux),
            _ => Err(ToolgraphError::UnknownPlatform {
                name: s.to_string(),
            }),
        }
    }
}

/// CPU architecture a tool binary is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// 64-bit x86
    #[serde(alias = "x86_64", alias = "amd64")]
    X64,
    /// 32-bit x86
    #[serde(alias = "i386", alias = "i686", alias = "ia32")]
    X86,
    /// 64-bit ARM
    #[serde(alias = "aarch64", alias = "arm")]
    Arm64,
}

impl Architecture {
    /// All architectures, in a stable order.
    pub const ALL: [Architecture; 3] = [Architecture::X64, Architecture::X86, Architecture::Arm64];

    /// Lowercase manifest name of the architecture.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Architecture::X64 => "x64",
            Architecture::X86 => "x86",
            Architecture::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = ToolgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Ok(Architecture::X64),
            "x86" | "i386" | "i686" | "ia32" => Ok(Architecture::X86),
            "arm64" | "aarch64" | "arm" => Ok(Architecture::Arm64),
            _ => Err(ToolgraphError::UnknownArchitecture {
                name: s.to_string(),
            }),
        }
    }
}

/// The platform/architecture pair a resolution is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetPlatform {
    /// Target operating system
    pub platform: Platform,
    /// Target CPU architecture
    pub architecture: Architecture,
}

impl TargetPlatform {
    /// Create a target from already-parsed parts.
    #[must_use]
    pub const fn new(platform: Platform, architecture: Architecture) -> Self {
        Self {
            platform,
            architecture,
        }
    }

    /// Parse a target from the string pair supplied by the manifest loader.
    ///
    /// # Errors
    ///
    /// Returns [`ToolgraphError::UnknownPlatform`] or
    /// [`ToolgraphError::UnknownArchitecture`] for unrecognized names.
    pub fn parse(platform: &str, architecture: &str) -> Result<Self, ToolgraphError> {
        Ok(Self {
            platform: platform.parse()?,
            architecture: architecture.parse()?,
        })
    }
}

impl Default for TargetPlatform {
    fn default() -> Self {
        Self::new(Platform::Linux, Architecture::X64)
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform, self.architecture)
    }
}
