//! Sample manifest catalogs
//!
//! Catalogs are JSON arrays in the format accepted by
//! [`ToolManifest::catalog_from_json_str`].

use crate::manifest::ToolManifest;

/// A named JSON manifest catalog.
#[derive(Clone, Debug)]
pub struct CatalogFixture {
    pub name: String,
    pub content: String,
}

impl CatalogFixture {
    /// Parse the catalog; panics on malformed fixtures.
    pub fn manifests(&self) -> Vec<ToolManifest> {
        ToolManifest::catalog_from_json_str(&self.content)
            .unwrap_or_else(|e| panic!("fixture '{}' is invalid: {e:#}", self.name))
    }

    /// A small web-development stack without conflicts.
    pub fn web_stack() -> Self {
        Self {
            name: "web_stack".to_string(),
            content: r#"
[
  {
    "id": "git",
    "category": "version-control",
    "version": { "stable": "2.43.0" }
  },
  {
    "id": "node",
    "name": "Node.js",
    "category": "runtime",
    "version": { "stable": "20.11.0", "available": ["18.19.0", "20.11.0"] },
    "estimatedInstallTime": 120
  },
  {
    "id": "npm",
    "category": "package-manager",
    "version": { "stable": "10.2.4" },
    "dependencies": [ { "toolId": "node", "type": "required", "minVersion": "18.0.0" } ]
  },
  {
    "id": "typescript",
    "category": "build-tool",
    "version": { "stable": "5.3.3" },
    "dependencies": [
      { "toolId": "node", "type": "required", "minVersion": "16.0.0" },
      { "toolId": "npm", "type": "required" }
    ]
  },
  {
    "id": "react",
    "category": "framework",
    "version": { "stable": "18.2.0" },
    "dependencies": [
      { "toolId": "node", "type": "required", "minVersion": "16.0.0" },
      { "toolId": "npm", "type": "optional" },
      { "toolId": "typescript", "type": "suggested" },
      { "toolId": "git", "type": "suggested" }
    ]
  }
]
"#
            .trim()
            .to_string(),
        }
    }

    /// Two tools with disjoint requirements on a shared library.
    pub fn version_clash() -> Self {
        Self {
            name: "version_clash".to_string(),
            content: r#"
[
  { "id": "lib", "category": "framework", "version": { "stable": "1.8.0", "available": ["1.2.0", "1.5.0", "2.1.0"] } },
  {
    "id": "a",
    "category": "utility",
    "dependencies": [ { "toolId": "lib", "type": "required", "minVersion": "2.0.0" } ]
  },
  {
    "id": "b",
    "category": "utility",
    "dependencies": [ { "toolId": "lib", "type": "required", "maxVersion": "1.5.0" } ]
  }
]
"#
            .trim()
            .to_string(),
        }
    }

    /// Tools with platform restrictions and an alternative.
    pub fn platform_mix() -> Self {
        Self {
            name: "platform_mix".to_string(),
            content: r#"
[
  {
    "id": "homebrew",
    "category": "package-manager",
    "systemRequirements": { "platforms": ["macos", "linux"] },
    "alternatives": ["scoop"]
  },
  {
    "id": "scoop",
    "category": "package-manager",
    "systemRequirements": { "platforms": ["windows"] }
  },
  {
    "id": "valgrind",
    "category": "testing",
    "systemRequirements": { "platforms": ["linux"], "architectures": ["x64", "arm64"] }
  },
  {
    "id": "docker",
    "category": "container",
    "systemRequirements": { "platforms": ["windows", "macos", "linux"] }
  }
]
"#
            .trim()
            .to_string(),
        }
    }
}
