use super::best_first_algorithm;
use crate::routing::{
    AlgorithmKind,
    common::{BestFirst, Ranking},
};

/// Greedy best-first search ranked by the heuristic alone.
///
/// A node is admitted once and never re-ranked, so the route is found fast
/// but is not necessarily the cheapest.
#[derive(Debug, Clone)]
pub struct GreedyBestFirst {
    search: BestFirst,
}

impl GreedyBestFirst {
    pub fn new() -> Self {
        Self {
            search: BestFirst::new(Ranking::Heuristic, false),
        }
    }
}

impl Default for GreedyBestFirst {
    fn default() -> Self {
        Self::new()
    }
}

best_first_algorithm!(GreedyBestFirst, AlgorithmKind::Greedy);
