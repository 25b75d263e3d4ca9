use super::best_first_algorithm;
use crate::routing::{
    AlgorithmKind,
    common::{BestFirst, Ranking},
};

/// Uniform-cost search: ranked by accumulated cost only
#[derive(Debug, Clone)]
pub struct Dijkstra {
    search: BestFirst,
}

impl Dijkstra {
    pub fn new() -> Self {
        Self {
            search: BestFirst::new(Ranking::Cost, true),
        }
    }
}

impl Default for Dijkstra {
    fn default() -> Self {
        Self::new()
    }
}

best_first_algorithm!(Dijkstra, AlgorithmKind::Dijkstra);
