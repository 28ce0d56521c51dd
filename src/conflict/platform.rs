//! Platform incompatibility analysis.
//!
//! A tool is incompatible when its manifest restricts platforms or architectures
//! and the detector's target is not among them. For each such tool the analysis
//! lists:
//!
//! - alternatives: tools in the graph declared as alternatives (in either
//!   direction), scored `0.5` for the target platform, `0.3` for the target
//!   architecture and `0.2` for sharing the category
//! - workarounds: WSL (0.7), a Linux container (0.5), Rosetta (0.8) and generic x64
//!   emulation (0.6), each offered only where it applies

use serde::Serialize;
use std::collections::BTreeSet;

use super::{
    ConflictDetail, ConflictSeverity, ConflictType, ResolutionAction, ResolutionStep,
    SuggestedResolution,
};
use crate::core::{Architecture, Platform, TargetPlatform};
use crate::graph::{GraphNode, GraphView};

/// What the target lacks for a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingSupport {
    /// The target platform when the tool does not support it
    pub platforms: Vec<Platform>,
    /// The target architecture when the tool does not support it
    pub architectures: Vec<Architecture>,
}

/// A tool that can stand in for an incompatible one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeTool {
    /// Alternative tool id
    pub tool_id: String,
    /// Score in `0.0..=1.0`
    pub compatibility_score: f64,
}

/// A manual way to run an incompatible tool anyway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workaround {
    /// Summary
    pub description: String,
    /// Steps for the user
    pub steps: Vec<String>,
    /// Probability in `0.0..=1.0` that the workaround holds up
    pub reliability: f64,
}

/// A tool that does not run on the target.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformIncompatibility {
    /// Id of the matching [`ConflictDetail`]
    pub conflict_id: String,
    /// Incompatible tool
    pub tool_id: String,
    /// Platform the resolution targets
    pub target_platform: Platform,
    /// Architecture the resolution targets
    pub target_architecture: Architecture,
    /// What is missing
    pub missing_support: MissingSupport,
    /// Platforms the tool does support
    pub supported_platforms: Vec<Platform>,
    /// Candidate replacements, best first
    pub alternatives: Vec<AlternativeTool>,
    /// Manual workarounds, most reliable first
    pub workarounds: Vec<Workaround>,
}

fn score(candidate: &GraphNode, original: &GraphNode, target: TargetPlatform) -> f64 {
    let mut score = 0.0;
    if candidate.platform.supported.contains(&target.platform) {
        score += 0.5;
    }
    if candidate.platform.architectures.contains(&target.architecture) {
        score += 0.3;
    }
    if candidate.manifest.category == original.manifest.category {
        score += 0.2;
    }
    score
}

fn alternatives(view: GraphView<'_>, node: &GraphNode, target: TargetPlatform) -> Vec<AlternativeTool> {
    let mut ids: BTreeSet<&str> = node.manifest.alternatives.iter().map(String::as_str).collect();
    ids.extend(
        view.nodes()
            .filter(|other| other.manifest.alternatives.iter().any(|alt| alt == node.id()))
            .map(GraphNode::id),
    );
    ids.remove(node.id());

    let mut found: Vec<AlternativeTool> = ids
        .into_iter()
        .filter_map(|id| view.node(id))
        .filter(|candidate| candidate.manifest.supports(target))
        .map(|candidate| AlternativeTool {
            tool_id: candidate.id().to_string(),
            compatibility_score: score(candidate, node, target),
        })
        .collect();
    found.sort_by(|a, b| b.compatibility_score.total_cmp(&a.compatibility_score));
    found
}

fn workarounds(node: &GraphNode, target: TargetPlatform) -> Vec<Workaround> {
    let name = node.manifest.display_name();
    let supported = &node.platform.supported;
    let architectures = &node.platform.architectures;
    let mut found = Vec::new();

    if !supported.contains(&target.platform) {
        if target.platform == Platform::Windows && supported.contains(&Platform::Linux) {
            found.push(Workaround {
                description: format!("Run {name} inside WSL"),
                steps: vec![
                    "Enable the Windows Subsystem for Linux".to_string(),
                    "Install a Linux distribution".to_string(),
                    format!("Install {name} inside the distribution"),
                ],
                reliability: 0.7,
            });
        }
        if supported.contains(&Platform::Linux) {
            found.push(Workaround {
                description: format!("Run {name} in a Linux container"),
                steps: vec![
                    "Install a container runtime".to_string(),
                    format!("Use an image that provides {name}"),
                ],
                reliability: 0.5,
            });
        }
    }

    if !architectures.contains(&target.architecture)
        && target.architecture == Architecture::Arm64
        && architectures.contains(&Architecture::X64)
    {
        if target.platform == Platform::Macos {
            found.push(Workaround {
                description: format!("Run the x64 build of {name} under Rosetta 2"),
                steps: vec![
                    "Install Rosetta 2".to_string(),
                    format!("Install the x64 build of {name}"),
                ],
                reliability: 0.8,
            });
        } else {
            found.push(Workaround {
                description: format!("Run the x64 build of {name} under emulation"),
                steps: vec![format!("Install the x64 build of {name} with an x64 emulation layer")],
                reliability: 0.6,
            });
        }
    }

    found.sort_by(|a, b| b.reliability.total_cmp(&a.reliability));
    found
}

/// Analyse the tools in `scope` against `target`.
pub(crate) fn analyze<'s>(
    view: GraphView<'_>,
    scope: impl IntoIterator<Item = &'s String>,
    target: TargetPlatform,
) -> Vec<(PlatformIncompatibility, ConflictDetail)> {
    let mut found = Vec::new();

    for tool_id in scope {
        let Some(node) = view.node(tool_id) else {
            continue;
        };
        if node.manifest.supports(target) {
            continue;
        }

        let missing_support = MissingSupport {
            platforms: if node.manifest.supports_platform(target.platform) {
                Vec::new()
            } else {
                vec![target.platform]
            },
            architectures: if node.manifest.supports_architecture(target.architecture) {
                Vec::new()
            } else {
                vec![target.architecture]
            },
        };
        let alternatives = alternatives(view, node, target);
        let workarounds = workarounds(node, target);
        let conflict_id = format!("platform:{tool_id}");

        let mut resolutions: Vec<SuggestedResolution> = alternatives
            .iter()
            .map(|alt| {
                let step = ResolutionStep::new(
                    ResolutionAction::Substitute,
                    tool_id.clone(),
                    format!("Install {} instead of {tool_id}", alt.tool_id),
                )
                .with_replacement(&alt.tool_id)
                .with_side_effect(format!("{tool_id} is replaced by {}", alt.tool_id));
                SuggestedResolution::new(
                    format!("{conflict_id}:substitute-{}", alt.tool_id),
                    "use-alternative",
                    alt.compatibility_score,
                    vec![step],
                )
            })
            .collect();
        resolutions.extend(workarounds.iter().enumerate().map(|(i, workaround)| {
            let step = ResolutionStep::new(
                ResolutionAction::Workaround,
                tool_id.clone(),
                workaround.description.clone(),
            )
            .with_side_effect(format!("{tool_id} needs manual setup: {}", workaround.steps.join(", ")));
            SuggestedResolution::new(
                format!("{conflict_id}:workaround-{}", i + 1),
                "workaround",
                workaround.reliability * 0.8,
                vec![step],
            )
        }));

        let blocking = alternatives.is_empty() && workarounds.is_empty();
        let incompatibility = PlatformIncompatibility {
            conflict_id: conflict_id.clone(),
            tool_id: tool_id.clone(),
            target_platform: target.platform,
            target_architecture: target.architecture,
            missing_support,
            supported_platforms: node.platform.supported.iter().copied().collect(),
            alternatives,
            workarounds,
        };
        let detail = ConflictDetail {
            id: conflict_id,
            conflict_type: ConflictType::Platform,
            severity: if blocking { ConflictSeverity::Critical } else { ConflictSeverity::Major },
            tools: vec![tool_id.clone()],
            description: format!("{tool_id} does not support {target}"),
            root_cause: format!(
                "{tool_id} supports {}",
                incompatibility
                    .supported_platforms
                    .iter()
                    .map(Platform::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            suggested_resolutions: resolutions,
            blocking,
        };
        found.push((incompatibility, detail.rank_resolutions()));
    }

    found
}
