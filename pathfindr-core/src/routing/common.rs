use fixedbitset::FixedBitSet;
use geo::Point;
use log::{debug, trace};
use petgraph::graph::NodeIndex;

use super::{SearchStats, Step, state::Frontier};
use crate::{Cost, Error, RoadGraph, model::geo_distance};

/// Frontier ordering of a best-first search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ranking {
    /// g + h
    CostPlusHeuristic,
    /// g, heuristic forced to zero
    Cost,
    /// h only
    Heuristic,
}

/// Single-frontier best-first search shared by A*, Dijkstra and Greedy.
#[derive(Debug, Clone)]
pub(crate) struct BestFirst {
    ranking: Ranking,
    /// Whether an open node may be re-ranked when a cheaper route turns up
    reoptimize: bool,
    frontier: Frontier,
    open: FixedBitSet,
    closed: FixedBitSet,
    endpoints: Option<(NodeIndex, NodeIndex)>,
    finished: bool,
    found: bool,
    nodes_explored: usize,
    edges_explored: usize,
}

impl BestFirst {
    pub(crate) fn new(ranking: Ranking, reoptimize: bool) -> Self {
        Self {
            ranking,
            reoptimize,
            frontier: Frontier::default(),
            open: FixedBitSet::new(),
            closed: FixedBitSet::new(),
            endpoints: None,
            finished: false,
            found: false,
            nodes_explored: 0,
            edges_explored: 0,
        }
    }

    fn heuristic(&self, from: Point<f64>, to: Point<f64>) -> Cost {
        match self.ranking {
            Ranking::Cost => 0.0,
            Ranking::CostPlusHeuristic | Ranking::Heuristic => geo_distance(from, to),
        }
    }

    fn rank(&self, g: Cost, h: Cost) -> Cost {
        match self.ranking {
            Ranking::CostPlusHeuristic => g + h,
            Ranking::Cost => g,
            Ranking::Heuristic => h,
        }
    }

    pub(crate) fn start(
        &mut self,
        graph: &mut RoadGraph,
        start: NodeIndex,
        end: NodeIndex,
    ) -> Result<(), Error> {
        let start_point = graph.try_node(start)?.geometry;
        let end_point = graph.try_node(end)?.geometry;

        graph.reset_nodes();
        self.reset();
        self.open.grow(graph.node_count());
        self.closed.grow(graph.node_count());
        self.endpoints = Some((start, end));

        let h = self.heuristic(start_point, end_point);
        let node = graph.search_node_mut(start);
        node.distance_from_start = 0.0;
        node.distance_to_end = h;
        self.open.insert(start.index());
        self.frontier.push(start, self.rank(0.0, h));
        Ok(())
    }

    pub(crate) fn next_step(&mut self, graph: &mut RoadGraph) -> Step {
        if self.finished {
            return Step::Done {
                updated: Vec::new(),
                path: self.path(graph),
            };
        }
        let Some((_, end)) = self.endpoints else {
            self.finished = true;
            return Step::Done {
                updated: Vec::new(),
                path: Vec::new(),
            };
        };

        let current = loop {
            match self.frontier.pop() {
                None => {
                    debug!(
                        "Frontier exhausted after {} nodes, no route",
                        self.nodes_explored
                    );
                    self.finished = true;
                    return Step::Done {
                        updated: Vec::new(),
                        path: Vec::new(),
                    };
                }
                Some(state) if self.closed.contains(state.node.index()) => {}
                Some(state) => break state.node,
            }
        };

        self.open.set(current.index(), false);
        self.closed.insert(current.index());
        self.nodes_explored += 1;
        let g_current = {
            let node = graph.search_node_mut(current);
            node.visited = true;
            node.distance_from_start
        };
        trace!("Expanding {current:?} at cost {g_current:.1}");

        let mut updated = vec![current];
        if current == end {
            self.finished = true;
            self.found = true;
            return Step::Done {
                updated,
                path: graph.trace_referers(end),
            };
        }

        let end_point = graph.graph[end].geometry;
        let neighbors: Vec<_> = graph.neighbors(current).collect();
        for (neighbor, edge_id, cost) in neighbors {
            if self.closed.contains(neighbor.index()) {
                continue;
            }
            let is_open = self.open.contains(neighbor.index());
            let tentative = g_current + cost;
            if is_open
                && (!self.reoptimize || tentative >= graph.graph[neighbor].distance_from_start)
            {
                continue;
            }

            if graph.mark_edge_visited(edge_id) {
                self.edges_explored += 1;
            }
            let h = self.heuristic(graph.graph[neighbor].geometry, end_point);
            let node = graph.search_node_mut(neighbor);
            node.referer = Some(current);
            node.distance_from_start = tentative;
            node.distance_to_end = h;

            self.open.insert(neighbor.index());
            self.frontier.push(neighbor, self.rank(tentative, h));
            updated.push(neighbor);
        }

        Step::Continue(updated)
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn found_path(&self) -> bool {
        self.found
    }

    pub(crate) fn path(&self, graph: &RoadGraph) -> Vec<NodeIndex> {
        match self.endpoints {
            Some((_, end)) if self.found => graph.trace_referers(end),
            _ => Vec::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.frontier.clear();
        self.open.clear();
        self.closed.clear();
        self.endpoints = None;
        self.finished = false;
        self.found = false;
        self.nodes_explored = 0;
        self.edges_explored = 0;
    }

    pub(crate) fn stats(&self) -> SearchStats {
        SearchStats {
            open_nodes: self.open.count_ones(..),
            closed_nodes: self.closed.count_ones(..),
            nodes_explored: self.nodes_explored,
            edges_explored: self.edges_explored,
        }
    }
}
