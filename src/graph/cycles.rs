//! Cycle detection over adjacency maps.
//!
//! The search is the classic three-colour DFS, run with an explicit frame stack so
//! that long dependency chains cannot overflow the call stack. Every back edge to a
//! node that is still on the current path records the slice of the path starting at
//! that node as one cycle; the search then continues, so all back-edge cycles are
//! reported rather than only the first.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Outcome of [`DependencyGraph::detect_cycles`](super::DependencyGraph::detect_cycles).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleDetectionResult {
    /// Whether at least one cycle exists
    pub has_cycles: bool,
    /// Each cycle as the path from its entry node, without repeating it at the end
    pub cycles: Vec<Vec<String>>,
    /// `cycles.len()`
    pub cycle_count: usize,
    /// Union of all nodes taking part in a cycle
    pub affected_nodes: BTreeSet<String>,
}

impl CycleDetectionResult {
    pub(crate) fn from_cycles(cycles: Vec<Vec<String>>) -> Self {
        let affected_nodes = cycles.iter().flatten().cloned().collect();
        Self {
            has_cycles: !cycles.is_empty(),
            cycle_count: cycles.len(),
            cycles,
            affected_nodes,
        }
    }
}

/// Colour states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the current DFS path.
    Gray,
    /// Node and everything below it has been explored.
    Black,
}

/// Find cycles in `adjacency`, visiting roots and neighbours in key order.
pub(crate) fn find_cycles(adjacency: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    let mut colors: HashMap<&str, Color> =
        adjacency.keys().map(|k| (k.as_str(), Color::White)).collect();
    let mut cycles = Vec::new();

    for root in adjacency.keys() {
        if colors.get(root.as_str()) != Some(&Color::White) {
            continue;
        }

        let mut path: Vec<&str> = vec![root.as_str()];
        let mut frames: Vec<std::collections::btree_set::Iter<'_, String>> =
            vec![adjacency[root].iter()];
        colors.insert(root.as_str(), Color::Gray);

        while let Some(frame) = frames.last_mut() {
            match frame.next() {
                Some(next) => {
                    let next = next.as_str();
                    match colors.get(next).copied().unwrap_or(Color::White) {
                        Color::Gray => {
                            if let Some(start) = path.iter().position(|n| *n == next) {
                                cycles.push(path[start..].iter().map(ToString::to_string).collect());
                            }
                        }
                        Color::White => {
                            colors.insert(next, Color::Gray);
                            path.push(next);
                            match adjacency.get(next) {
                                Some(children) => frames.push(children.iter()),
                                None => {
                                    // Dangling target: treat as a leaf.
                                    colors.insert(next, Color::Black);
                                    path.pop();
                                }
                            }
                        }
                        Color::Black => {}
                    }
                }
                None => {
                    frames.pop();
                    if let Some(done) = path.pop() {
                        colors.insert(done, Color::Black);
                    }
                }
            }
        }
    }

    cycles
}

/// Render a cycle as `a → b → a`.
#[must_use]
pub fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => {
            let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
            parts.push(first);
            parts.join(" → ")
        }
        None => String::new(),
    }
}
