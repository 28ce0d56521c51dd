//! Installation-order algorithms over a graph snapshot.
//!
//! Every algorithm works in three phases:
//!
//! 1. **Scope**: breadth-first discovery from the requested tools along the edges
//!    the options follow and the target platform applies. Edges already deferred by
//!    conflict resolution pull their dependency into scope but do not constrain
//!    the order.
//! 2. **Order**: Kahn's algorithm (batched or FIFO) or post-order DFS. A residual
//!    cycle is broken by deferring its weakest optional or suggested edge; a cycle
//!    of required edges fails the run.
//! 3. **Batches**: tools are grouped by their longest chain of remaining
//!    constraints, so every batch only depends on earlier batches.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};
use strsim::levenshtein;
use tracing::{debug, trace, warn};

use super::{DeferredDependency, InstallationOrder, ResolutionAlgorithm, ResolveOptions};
use crate::core::TargetPlatform;
use crate::graph::cycles::find_cycles;
use crate::graph::{EdgeConflictStatus, GraphView, format_cycle};
use crate::manifest::DependencyType;

/// Maximum Levenshtein distance, as a percentage of the unknown id's length, for a
/// "did you mean" suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Counters collected by one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct RunStats {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    pub memory_bytes: usize,
}

struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    fn expired(&self) -> bool {
        self.started.elapsed() >= self.limit
    }
}

enum Failure {
    Deadline,
    Cycles(Vec<Vec<String>>),
}

/// Tools in scope and the order constraints between them.
struct Scope<'a> {
    /// Discovery order, requested tools first
    tools: Vec<&'a str>,
    /// Tool → dependencies that must be installed before it
    constraints: BTreeMap<&'a str, BTreeSet<&'a str>>,
    deferred: Vec<DeferredDependency>,
}

impl<'a> Scope<'a> {
    fn dependents(&self) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
        let mut dependents: BTreeMap<&'a str, BTreeSet<&'a str>> = BTreeMap::new();
        for (from, deps) in &self.constraints {
            for to in deps {
                dependents.entry(*to).or_default().insert(*from);
            }
        }
        dependents
    }

    /// Drop the constraint `from → to` and record why.
    fn defer(&mut self, view: GraphView<'_>, from: &str, to: &str, reason: String) {
        if let Some(deps) = self.constraints.get_mut(from) {
            deps.remove(to);
        }
        let dependency_type = view.edge(from, to).map_or(DependencyType::Optional, |e| e.dependency_type());
        debug!(from, to, %dependency_type, "Deferring dependency");
        self.deferred.push(DeferredDependency {
            from: from.to_string(),
            to: to.to_string(),
            dependency_type,
            reason,
        });
    }
}

/// Compute the installation order of `requested` on `view`.
pub(crate) fn compute_order(
    view: GraphView<'_>,
    requested: &[String],
    options: &ResolveOptions,
    target: TargetPlatform,
) -> (InstallationOrder, RunStats) {
    let options = options.effective();
    let mut order = InstallationOrder::new(options.algorithm, requested.to_vec(), view.revision());
    let mut stats = RunStats::default();
    let deadline = Deadline {
        started: Instant::now(),
        limit: options.max_execution_time,
    };

    let missing: Vec<&str> = requested.iter().map(String::as_str).filter(|id| !view.contains(id)).collect();
    if !missing.is_empty() {
        order.errors.push(format!("Missing tools: {}", missing.join(", ")));
        for id in missing {
            let similar = suggestions(view, id);
            if !similar.is_empty() {
                order.warnings.push(format!("Unknown tool '{id}', did you mean: {}?", similar.join(", ")));
            }
        }
        warn!(errors = ?order.errors, "Resolution failed");
        return (order, stats);
    }

    let mut scope = match discover(view, requested, &options, target, &deadline, &mut stats) {
        Ok(scope) => scope,
        Err(failure) => return (fail(order, failure, &options), stats),
    };

    let sequence = match options.algorithm {
        ResolutionAlgorithm::Dfs => depth_first(view, &mut scope, &deadline, &mut stats),
        ResolutionAlgorithm::Bfs => kahn(view, &mut scope, false, &deadline, &mut stats),
        ResolutionAlgorithm::Topological | ResolutionAlgorithm::Eager | ResolutionAlgorithm::Lazy => {
            kahn(view, &mut scope, true, &deadline, &mut stats)
        }
    };

    stats.memory_bytes = estimate_memory(&scope);
    order.deferred_dependencies = std::mem::take(&mut scope.deferred);
    let sequence = match sequence {
        Ok(sequence) => sequence,
        Err(failure) => return (fail(order, failure, &options), stats),
    };

    let mut batches = if options.enable_parallel {
        batches_by_level(&sequence, &scope.constraints)
    } else {
        sequence.iter().map(|id| vec![*id]).collect()
    };
    let mut sequence = sequence;

    if options.skip_installed {
        let installed: BTreeSet<&str> = sequence
            .iter()
            .copied()
            .filter(|id| view.node(id).is_some_and(|n| n.status == crate::graph::InstallationStatus::Installed))
            .collect();
        sequence.retain(|id| !installed.contains(id));
        for batch in &mut batches {
            batch.retain(|id| !installed.contains(id));
        }
        batches.retain(|batch| !batch.is_empty());
        order.already_installed = installed.into_iter().map(ToString::to_string).collect();
    }

    for id in &sequence {
        if let Some(node) = view.node(id) {
            if !node.manifest.supports(target) {
                order.warnings.push(format!("Tool '{id}' does not support {target}"));
            }
        }
    }

    order.estimated_time_secs = batches
        .iter()
        .map(|batch| {
            batch
                .iter()
                .filter_map(|id| view.node(id))
                .map(|n| n.manifest.install_secs())
                .max()
                .unwrap_or(0)
        })
        .sum();
    order.sequence = sequence.into_iter().map(ToString::to_string).collect();
    order.batches = batches
        .into_iter()
        .map(|batch| batch.into_iter().map(ToString::to_string).collect())
        .collect();
    order.success = true;

    debug!(
        algorithm = %options.algorithm,
        tools = order.sequence.len(),
        batches = order.batches.len(),
        deferred = order.deferred_dependencies.len(),
        "Installation order computed"
    );
    (order, stats)
}

fn fail(mut order: InstallationOrder, failure: Failure, options: &ResolveOptions) -> InstallationOrder {
    match failure {
        Failure::Deadline => {
            order.errors.push(format!(
                "Resolution exceeded the time limit of {} ms",
                options.max_execution_time.as_millis()
            ));
        }
        Failure::Cycles(cycles) => {
            for cycle in &cycles {
                order.errors.push(format!("Unbreakable circular dependency: {}", format_cycle(cycle)));
            }
            order.circular_dependencies = cycles;
        }
    }
    warn!(algorithm = %options.algorithm, errors = ?order.errors, "Resolution failed");
    order
}

/// Up to three known ids close to `unknown`.
fn suggestions(view: GraphView<'_>, unknown: &str) -> Vec<String> {
    let mut scored: Vec<(&str, usize)> = view.node_ids().map(|id| (id, levenshtein(unknown, id))).collect();
    scored.sort_by_key(|(_, distance)| *distance);
    scored
        .into_iter()
        .filter(|(_, distance)| *distance <= unknown.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .take(3)
        .map(|(id, _)| id.to_string())
        .collect()
}

fn discover<'a>(
    view: GraphView<'a>,
    requested: &[String],
    options: &ResolveOptions,
    target: TargetPlatform,
    deadline: &Deadline,
    stats: &mut RunStats,
) -> Result<Scope<'a>, Failure> {
    let mut scope = Scope {
        tools: Vec::new(),
        constraints: BTreeMap::new(),
        deferred: Vec::new(),
    };
    let mut seen: BTreeSet<&'a str> = BTreeSet::new();
    let mut queue: VecDeque<&'a str> = VecDeque::new();
    for id in requested {
        if let Some(node) = view.node(id) {
            if seen.insert(node.id()) {
                queue.push_back(node.id());
            }
        }
    }

    while let Some(id) = queue.pop_front() {
        if deadline.expired() {
            return Err(Failure::Deadline);
        }
        stats.nodes_visited += 1;
        scope.tools.push(id);
        let mut deps = BTreeSet::new();

        for edge in view.dependency_edges(id) {
            stats.edges_traversed += 1;
            if !options.follows(edge.dependency_type()) || !edge.platforms.contains(&target.platform) {
                trace!(from = id, to = %edge.to, "Edge not followed");
                continue;
            }
            let to = edge.to.as_str();
            if edge.resolution.status == EdgeConflictStatus::Deferred {
                scope.deferred.push(DeferredDependency {
                    from: id.to_string(),
                    to: to.to_string(),
                    dependency_type: edge.dependency_type(),
                    reason: "deferred by conflict resolution".to_string(),
                });
            } else {
                deps.insert(to);
            }
            if seen.insert(to) {
                queue.push_back(to);
            }
        }
        scope.constraints.insert(id, deps);
    }
    Ok(scope)
}

/// Defer the weakest breakable edge of the first cycle that has one.
///
/// Returns the unbreakable cycles when none of `cycles` can be broken.
fn break_cycle(view: GraphView<'_>, scope: &mut Scope<'_>, cycles: &[Vec<String>]) -> Result<(String, String), Failure> {
    for cycle in cycles {
        let weakest = cycle
            .iter()
            .enumerate()
            .map(|(i, from)| (from, &cycle[(i + 1) % cycle.len()]))
            .filter_map(|(from, to)| {
                let kind = view.edge(from, to)?.dependency_type();
                kind.is_breakable().then_some((from, to, kind))
            })
            .min_by_key(|(_, _, kind)| match kind {
                DependencyType::Suggested => 0,
                DependencyType::Optional => 1,
                DependencyType::Required => 2,
            });
        if let Some((from, to, _)) = weakest {
            let reason = format!("breaks cycle {}", format_cycle(cycle));
            scope.defer(view, from, to, reason);
            return Ok((from.clone(), to.clone()));
        }
    }
    Err(Failure::Cycles(cycles.to_vec()))
}

/// Remaining constraints among tools not yet emitted.
fn residual(scope: &Scope<'_>, emitted: &BTreeSet<&str>) -> BTreeMap<String, BTreeSet<String>> {
    scope
        .constraints
        .iter()
        .filter(|(id, _)| !emitted.contains(*id))
        .map(|(id, deps)| {
            let deps = deps.iter().filter(|d| !emitted.contains(*d)).map(ToString::to_string).collect();
            (id.to_string(), deps)
        })
        .collect()
}

/// Kahn's algorithm. A node is ready once all its dependencies are emitted.
///
/// `batched` emits whole ready sets sorted by id; otherwise ready tools leave a
/// FIFO queue in discovery order.
fn kahn<'a>(
    view: GraphView<'a>,
    scope: &mut Scope<'a>,
    batched: bool,
    deadline: &Deadline,
    stats: &mut RunStats,
) -> Result<Vec<&'a str>, Failure> {
    let rank: HashMap<&str, usize> = scope.tools.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let dependents = scope.dependents();
    let mut pending: HashMap<&'a str, usize> =
        scope.constraints.iter().map(|(id, deps)| (*id, deps.len())).collect();
    let mut ready: VecDeque<&'a str> = scope.tools.iter().copied().filter(|id| pending[id] == 0).collect();
    if batched {
        ready.make_contiguous().sort_unstable();
    }
    let mut emitted: BTreeSet<&'a str> = BTreeSet::new();
    let mut sequence = Vec::with_capacity(scope.tools.len());

    while emitted.len() < scope.tools.len() {
        if ready.is_empty() {
            let cycles = find_cycles(&residual(scope, &emitted));
            let (from, to) = break_cycle(view, scope, &cycles)?;
            if let Some(count) = pending.get_mut(from.as_str()) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    if let Some(id) = scope.tools.iter().find(|t| **t == from) {
                        ready.push_back(*id);
                    }
                }
            }
            trace!(%from, %to, "Cycle broken");
            continue;
        }

        let round: Vec<&'a str> = if batched {
            ready.drain(..).collect()
        } else {
            ready.pop_front().into_iter().collect()
        };
        let mut released = Vec::new();
        for id in round {
            if deadline.expired() {
                return Err(Failure::Deadline);
            }
            stats.nodes_visited += 1;
            emitted.insert(id);
            sequence.push(id);
            for dependent in dependents.get(id).into_iter().flatten() {
                stats.edges_traversed += 1;
                if !scope.constraints.get(dependent).is_some_and(|d| d.contains(id)) {
                    continue;
                }
                if let Some(count) = pending.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        released.push(*dependent);
                    }
                }
            }
        }
        if batched {
            released.sort_unstable();
        } else {
            released.sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
        }
        ready.extend(released);
    }
    Ok(sequence)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

enum Pass<'a> {
    Complete(Vec<&'a str>),
    RequiredBackEdge(Vec<String>),
}

/// Post-order DFS from each tool in discovery order.
///
/// A back edge that is optional or suggested is deferred on the spot. A required
/// back edge closes a cycle: its weakest breakable edge is deferred and the
/// descent restarts; without one the run fails.
fn depth_first<'a>(
    view: GraphView<'a>,
    scope: &mut Scope<'a>,
    deadline: &Deadline,
    stats: &mut RunStats,
) -> Result<Vec<&'a str>, Failure> {
    loop {
        match dfs_pass(view, scope, deadline, stats)? {
            Pass::Complete(sequence) => return Ok(sequence),
            Pass::RequiredBackEdge(cycle) => {
                let (from, to) = break_cycle(view, scope, std::slice::from_ref(&cycle))?;
                trace!(%from, %to, "Restarting descent after breaking cycle");
            }
        }
    }
}

fn dfs_pass<'a>(
    view: GraphView<'a>,
    scope: &mut Scope<'a>,
    deadline: &Deadline,
    stats: &mut RunStats,
) -> Result<Pass<'a>, Failure> {
    let mut marks: HashMap<&'a str, Mark> = HashMap::new();
    let mut sequence = Vec::with_capacity(scope.tools.len());
    let roots = scope.tools.clone();

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        let mut path: Vec<&'a str> = vec![root];
        let mut frames: Vec<(&'a str, Vec<&'a str>, usize)> = vec![(root, deps_of(scope, root), 0)];
        marks.insert(root, Mark::OnPath);

        while let Some((node, deps, next)) = frames.last_mut() {
            if deadline.expired() {
                return Err(Failure::Deadline);
            }
            let node = *node;
            let Some(dep) = deps.get(*next).copied() else {
                frames.pop();
                path.pop();
                marks.insert(node, Mark::Done);
                stats.nodes_visited += 1;
                sequence.push(node);
                continue;
            };
            *next += 1;
            stats.edges_traversed += 1;

            match marks.get(dep) {
                Some(Mark::Done) => {}
                Some(Mark::OnPath) => {
                    let kind = view.edge(node, dep).map_or(DependencyType::Required, |e| e.dependency_type());
                    let start = path.iter().position(|p| *p == dep).unwrap_or(0);
                    let cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
                    if kind.is_breakable() {
                        let reason = format!("breaks cycle {}", format_cycle(&cycle));
                        scope.defer(view, node, dep, reason);
                    } else {
                        return Ok(Pass::RequiredBackEdge(cycle));
                    }
                }
                None => {
                    marks.insert(dep, Mark::OnPath);
                    path.push(dep);
                    frames.push((dep, deps_of(scope, dep), 0));
                }
            }
        }
    }
    Ok(Pass::Complete(sequence))
}

fn deps_of<'a>(scope: &Scope<'a>, id: &str) -> Vec<&'a str> {
    scope.constraints.get(id).map(|d| d.iter().copied().collect()).unwrap_or_default()
}

/// Group `sequence` by the longest chain of constraints below each tool.
///
/// `sequence` must list dependencies before dependents.
fn batches_by_level<'a>(sequence: &[&'a str], constraints: &BTreeMap<&'a str, BTreeSet<&'a str>>) -> Vec<Vec<&'a str>> {
    let mut level: HashMap<&str, usize> = HashMap::new();
    let mut batches: Vec<Vec<&'a str>> = Vec::new();
    for id in sequence {
        let depth = constraints
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|dep| level.get(dep))
            .map(|l| l + 1)
            .max()
            .unwrap_or(0);
        level.insert(id, depth);
        if batches.len() <= depth {
            batches.resize_with(depth + 1, Vec::new);
        }
        batches[depth].push(id);
    }
    batches
}

fn estimate_memory(scope: &Scope<'_>) -> usize {
    let ids: usize = scope.tools.iter().map(|id| id.len() + std::mem::size_of::<&str>()).sum();
    let edges: usize = scope.constraints.values().map(|d| d.len() * std::mem::size_of::<&str>() * 2).sum();
    ids + edges
}
