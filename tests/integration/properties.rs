//! Ordering invariants on generated graphs.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use toolgraph::core::TargetPlatform;
use toolgraph::manifest::{DependencyType, ToolManifest};
use toolgraph::resolver::{DependencyResolver, InstallationOrder, ResolutionAlgorithm, ResolveOptions};
use toolgraph::test_utils::{ToolBuilder, graph_of};

const TYPES: [DependencyType; 3] = [DependencyType::Required, DependencyType::Optional, DependencyType::Suggested];

fn tool(i: usize) -> String {
    format!("tool-{i}")
}

fn manifests(count: usize, edges: &BTreeMap<(usize, usize), DependencyType>) -> Vec<ToolManifest> {
    (0..count)
        .map(|i| {
            edges
                .iter()
                .filter(|((from, _), _)| *from == i)
                .fold(ToolBuilder::utility(&tool(i)), |builder, ((_, to), kind)| match kind {
                    DependencyType::Required => builder.requires(&tool(*to)),
                    DependencyType::Optional => builder.optional(&tool(*to)),
                    DependencyType::Suggested => builder.suggests(&tool(*to)),
                })
                .build()
        })
        .collect()
}

/// A DAG: every edge points from a higher index to a lower one.
fn dag() -> impl Strategy<Value = (usize, BTreeMap<(usize, usize), DependencyType>)> {
    (2usize..10).prop_flat_map(|count| {
        prop::collection::vec((0..count, 0..count, 0usize..3), 0..24).prop_map(move |raw| {
            let edges = raw
                .into_iter()
                .filter(|(a, b, _)| a != b)
                .map(|(a, b, kind)| ((a.max(b), a.min(b)), TYPES[kind]))
                .collect();
            (count, edges)
        })
    })
}

fn follows(algorithm: ResolutionAlgorithm, kind: DependencyType) -> bool {
    match kind {
        DependencyType::Required => true,
        DependencyType::Optional => algorithm != ResolutionAlgorithm::Lazy,
        DependencyType::Suggested => algorithm == ResolutionAlgorithm::Eager,
    }
}

fn batch_index(order: &InstallationOrder) -> HashMap<&str, usize> {
    order
        .batches
        .iter()
        .enumerate()
        .flat_map(|(i, batch)| batch.iter().map(move |id| (id.as_str(), i)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_orders_respect_followed_edges((count, edges) in dag()) {
        let resolver = DependencyResolver::new(Arc::new(graph_of(manifests(count, &edges))), TargetPlatform::default());
        let requested: Vec<String> = (0..count).map(tool).collect();

        for algorithm in ResolutionAlgorithm::ALL {
            let order = resolver.resolve(&requested, &ResolveOptions::with_algorithm(algorithm));
            prop_assert!(order.success, "{}: {:?}", algorithm, order.errors);
            prop_assert!(order.deferred_dependencies.is_empty());

            let unique: BTreeSet<&String> = order.sequence.iter().collect();
            prop_assert_eq!(unique.len(), order.sequence.len());
            prop_assert_eq!(order.sequence.len(), count);

            let batches = batch_index(&order);
            prop_assert_eq!(batches.len(), count);

            for ((from, to), kind) in &edges {
                if !follows(algorithm, *kind) {
                    continue;
                }
                let (from, to) = (tool(*from), tool(*to));
                prop_assert!(order.position(&to) < order.position(&from), "{}: {} before {}", algorithm, to, from);
                prop_assert!(batches[to.as_str()] < batches[from.as_str()], "{}: batch of {} before {}", algorithm, to, from);
            }
        }
    }

    #[test]
    fn prop_ring_with_optional_edge_is_broken(count in 2usize..8, optional in prop::collection::vec(any::<bool>(), 8)) {
        // tool-i depends on tool-(i+1); the edge out of tool-0 is always optional
        let edges: BTreeMap<(usize, usize), DependencyType> = (0..count)
            .map(|i| {
                let kind = if i == 0 || optional[i] { DependencyType::Optional } else { DependencyType::Required };
                ((i, (i + 1) % count), kind)
            })
            .collect();
        let resolver = DependencyResolver::new(Arc::new(graph_of(manifests(count, &edges))), TargetPlatform::default());

        for algorithm in [ResolutionAlgorithm::Topological, ResolutionAlgorithm::Dfs, ResolutionAlgorithm::Bfs] {
            let order = resolver.resolve(&[tool(0)], &ResolveOptions::with_algorithm(algorithm));
            prop_assert!(order.success, "{}: {:?}", algorithm, order.errors);
            prop_assert_eq!(order.sequence.len(), count);
            prop_assert_eq!(order.deferred_dependencies.len(), 1);
            prop_assert_ne!(order.deferred_dependencies[0].dependency_type, DependencyType::Required);
        }
    }
}
