//! Runs every algorithm on the same query for side-by-side comparison

use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use super::{AlgorithmKind, AlgorithmRunResult, create_algorithm, run_to_completion};
use crate::{Cost, Error, RoadGraph};

#[derive(Debug, Clone)]
pub struct AlgorithmComparison {
    pub result: AlgorithmRunResult,
    /// Sum of edge costs along the route
    pub path_cost: Option<Cost>,
    /// `path_cost` over the cheapest route any algorithm found
    pub relative_cost: Option<f64>,
}

/// Runs all four algorithms in parallel, each on its own copy of `graph`.
///
/// # Errors
///
/// Returns [`Error::InvalidNodeIndex`] when either endpoint is not in `graph`.
pub fn compare_algorithms(
    graph: &RoadGraph,
    start: NodeIndex,
    end: NodeIndex,
    max_steps: usize,
) -> Result<Vec<AlgorithmComparison>, Error> {
    let mut comparisons = AlgorithmKind::ALL
        .into_par_iter()
        .map(|kind| {
            let mut local = graph.clone();
            let mut algorithm = create_algorithm(kind);
            let result =
                run_to_completion(algorithm.as_mut(), &mut local, start, end, max_steps, None)?;
            let path_cost = result.success.then(|| local.path_cost(&result.path)).flatten();
            Ok(AlgorithmComparison {
                result,
                path_cost,
                relative_cost: None,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let best = comparisons
        .iter()
        .filter_map(|comparison| comparison.path_cost)
        .min_by(f64::total_cmp);
    if let Some(best) = best.filter(|&best| best > 0.0) {
        for comparison in &mut comparisons {
            comparison.relative_cost = comparison.path_cost.map(|cost| cost / best);
        }
    }
    Ok(comparisons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::algorithms::fixtures;

    #[test]
    fn every_algorithm_reaches_the_corner() {
        let (graph, nodes) = fixtures::grid(5);
        let comparisons = compare_algorithms(&graph, nodes[0], nodes[24], 1_000).unwrap();
        assert_eq!(comparisons.len(), 4);
        for comparison in &comparisons {
            assert!(comparison.result.success, "{:?}", comparison.result.kind);
            assert!(comparison.relative_cost.unwrap() >= 1.0 - 1e-9);
        }
        let kinds: Vec<_> = comparisons.iter().map(|c| c.result.kind).collect();
        assert_eq!(kinds, AlgorithmKind::ALL.to_vec());
    }

    #[test]
    fn dijkstra_is_never_worse_than_greedy() {
        let (graph, nodes) = fixtures::grid(7);
        let comparisons = compare_algorithms(&graph, nodes[3], nodes[45], 1_000).unwrap();
        let cost_of = |kind| {
            comparisons
                .iter()
                .find(|c| c.result.kind == kind)
                .and_then(|c| c.path_cost)
                .unwrap()
        };
        assert!(cost_of(AlgorithmKind::Dijkstra) <= cost_of(AlgorithmKind::Greedy) + 1e-9);
    }

    #[test]
    fn step_limit_is_reported() {
        let (graph, nodes) = fixtures::grid(6);
        let comparisons = compare_algorithms(&graph, nodes[0], nodes[35], 3).unwrap();
        for comparison in comparisons {
            assert_eq!(comparison.result.outcome, crate::SearchOutcome::StepLimit);
            assert!(!comparison.result.success);
            assert_eq!(comparison.result.steps, 3);
        }
    }
}
