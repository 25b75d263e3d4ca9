use super::best_first_algorithm;
use crate::routing::{
    AlgorithmKind,
    common::{BestFirst, Ranking},
};

/// A* ranked by g + h, with h the great-circle distance to the end node.
///
/// Optimal as long as edge costs are not below the geographic distance they
/// span; cost overrides smaller than that make the heuristic inadmissible.
#[derive(Debug, Clone)]
pub struct AStar {
    search: BestFirst,
}

impl AStar {
    pub fn new() -> Self {
        Self {
            search: BestFirst::new(Ranking::CostPlusHeuristic, true),
        }
    }
}

impl Default for AStar {
    fn default() -> Self {
        Self::new()
    }
}

best_first_algorithm!(AStar, AlgorithmKind::AStar);
