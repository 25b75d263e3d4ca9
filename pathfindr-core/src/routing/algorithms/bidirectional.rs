use fixedbitset::FixedBitSet;
use geo::Point;
use hashbrown::HashMap;
use log::{debug, trace};
use petgraph::graph::NodeIndex;

use crate::{
    Cost, Error, RoadGraph,
    model::geo_distance,
    routing::{AlgorithmKind, SearchAlgorithm, SearchStats, Step, state::Frontier},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Forward,
    Backward,
}

/// One direction of the search. Costs and parents are kept locally; the
/// forward half additionally mirrors them onto the graph nodes.
#[derive(Debug, Clone)]
struct Half {
    side: Side,
    frontier: Frontier,
    open: FixedBitSet,
    closed: FixedBitSet,
    g: HashMap<NodeIndex, Cost>,
    parent: HashMap<NodeIndex, NodeIndex>,
    /// Node this half heads toward, for the heuristic
    goal: Point<f64>,
    nodes_explored: usize,
    edges_explored: usize,
}

impl Half {
    fn new(side: Side) -> Self {
        Self {
            side,
            frontier: Frontier::default(),
            open: FixedBitSet::new(),
            closed: FixedBitSet::new(),
            g: HashMap::new(),
            parent: HashMap::new(),
            goal: Point::new(0.0, 0.0),
            nodes_explored: 0,
            edges_explored: 0,
        }
    }

    fn clear(&mut self) {
        self.frontier.clear();
        self.open.clear();
        self.closed.clear();
        self.g.clear();
        self.parent.clear();
        self.nodes_explored = 0;
        self.edges_explored = 0;
    }

    fn prime(&mut self, graph: &mut RoadGraph, origin: NodeIndex, goal: Point<f64>) {
        self.open.grow(graph.node_count());
        self.closed.grow(graph.node_count());
        self.goal = goal;
        let h = geo_distance(graph.graph[origin].geometry, goal);
        self.g.insert(origin, 0.0);
        self.open.insert(origin.index());
        self.frontier.push(origin, h);
        if self.side == Side::Forward {
            let node = graph.search_node_mut(origin);
            node.distance_from_start = 0.0;
            node.distance_to_end = h;
        }
    }

    fn is_open(&self, node: NodeIndex) -> bool {
        self.open.contains(node.index())
    }

    fn is_closed(&self, node: NodeIndex) -> bool {
        self.closed.contains(node.index())
    }

    /// Expands the best open node. `None` when this half has nothing left.
    fn expand(
        &mut self,
        graph: &mut RoadGraph,
        assigned: &mut Vec<(NodeIndex, NodeIndex)>,
    ) -> Option<Vec<NodeIndex>> {
        let current = loop {
            let state = self.frontier.pop()?;
            if !self.is_closed(state.node) {
                break state.node;
            }
        };
        self.open.set(current.index(), false);
        self.closed.insert(current.index());
        self.nodes_explored += 1;
        graph.search_node_mut(current).visited = true;
        let g_current = self.g.get(&current).copied().unwrap_or(Cost::INFINITY);
        trace!("{:?} half expanding {current:?}", self.side);

        let neighbors: Vec<_> = match self.side {
            Side::Forward => graph.neighbors(current).collect(),
            Side::Backward => graph.predecessors(current).collect(),
        };

        let mut updated = vec![current];
        for (neighbor, edge_id, cost) in neighbors {
            if self.is_closed(neighbor) {
                continue;
            }
            let tentative = g_current + cost;
            if self.is_open(neighbor)
                && self
                    .g
                    .get(&neighbor)
                    .is_some_and(|&known| tentative >= known)
            {
                continue;
            }

            if graph.mark_edge_visited(edge_id) {
                self.edges_explored += 1;
            }
            let h = geo_distance(graph.graph[neighbor].geometry, self.goal);
            self.g.insert(neighbor, tentative);
            self.parent.insert(neighbor, current);
            self.open.insert(neighbor.index());
            self.frontier.push(neighbor, tentative + h);
            if self.side == Side::Forward {
                let node = graph.search_node_mut(neighbor);
                node.referer = Some(current);
                node.distance_from_start = tentative;
                node.distance_to_end = h;
            }
            assigned.push((neighbor, current));
            updated.push(neighbor);
        }
        Some(updated)
    }

    /// Walks parents from `from` back to this half's origin, bounded by
    /// `limit` hops. Returned in walk order (from `from` toward the origin).
    fn chain(&self, from: NodeIndex, limit: usize) -> Vec<NodeIndex> {
        let mut chain = vec![from];
        let mut current = from;
        while let Some(&parent) = self.parent.get(&current) {
            if chain.len() > limit {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }
}

/// Two A*-ranked searches, one from each end, alternating one expansion at a
/// time until they touch.
///
/// After each step every node touched by that step is checked; a node closed
/// by both halves, or closed by one and open in the other, is a meeting
/// candidate and the cheapest candidate (combined cost) ends the search. The
/// route is the forward parents up to the meeting node followed by the
/// backward parents down to the end, written back onto the `referer` chain.
#[derive(Debug, Clone)]
pub struct BidirectionalSearch {
    forward: Half,
    backward: Half,
    endpoints: Option<(NodeIndex, NodeIndex)>,
    forward_turn: bool,
    /// Parents assigned during the latest step, for drawing
    last_assigned: Vec<(NodeIndex, NodeIndex)>,
    meeting: Option<(NodeIndex, Cost)>,
    path: Vec<NodeIndex>,
    finished: bool,
}

impl BidirectionalSearch {
    pub fn new() -> Self {
        Self {
            forward: Half::new(Side::Forward),
            backward: Half::new(Side::Backward),
            endpoints: None,
            forward_turn: true,
            last_assigned: Vec::new(),
            meeting: None,
            path: Vec::new(),
            finished: false,
        }
    }

    /// Node where the two halves met and the combined cost through it
    pub fn meeting_point(&self) -> Option<(NodeIndex, Cost)> {
        self.meeting
    }

    /// Share of expansions done by the forward half, in `[0, 1]`
    #[allow(clippy::cast_precision_loss)]
    pub fn balance(&self) -> f64 {
        let total = self.forward.nodes_explored + self.backward.nodes_explored;
        if total == 0 {
            0.5
        } else {
            self.forward.nodes_explored as f64 / total as f64
        }
    }

    /// Ratio of the meeting cost to the given optimal cost; 1.0 means the
    /// meeting point lies on an optimal route.
    pub fn meeting_optimality(&self, optimal_cost: Cost) -> Option<f64> {
        let (_, cost) = self.meeting?;
        (optimal_cost > 0.0).then(|| cost / optimal_cost)
    }

    fn find_meeting(&self, touched: &[NodeIndex]) -> Option<(NodeIndex, Cost)> {
        let mut best: Option<(NodeIndex, Cost)> = None;
        for &node in touched {
            let (fc, bc) = (self.forward.is_closed(node), self.backward.is_closed(node));
            let (fo, bo) = (self.forward.is_open(node), self.backward.is_open(node));
            if !((fc && (bc || bo)) || (bc && fo)) {
                continue;
            }
            let (Some(gf), Some(gb)) = (self.forward.g.get(&node), self.backward.g.get(&node))
            else {
                continue;
            };
            let cost = gf + gb;
            if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                best = Some((node, cost));
            }
        }
        best
    }

    fn assemble_path(&self, graph: &RoadGraph, meeting: NodeIndex) -> Vec<NodeIndex> {
        let limit = graph.node_count();
        let mut forward_half = self.forward.chain(meeting, limit);
        forward_half.reverse();
        let backward_half = self.backward.chain(meeting, limit);

        let mut path: Vec<NodeIndex> = Vec::with_capacity(forward_half.len() + backward_half.len());
        let mut position: HashMap<NodeIndex, usize> = HashMap::new();
        for node in forward_half.into_iter().chain(backward_half.into_iter().skip(1)) {
            if let Some(&at) = position.get(&node) {
                for removed in path.drain(at + 1..) {
                    position.remove(&removed);
                }
            } else {
                position.insert(node, path.len());
                path.push(node);
            }
        }
        path
    }

    /// Rewrites `referer` and `distance_from_start` along the route.
    fn commit_path(graph: &mut RoadGraph, path: &[NodeIndex]) {
        let mut g = 0.0;
        for (i, &node) in path.iter().enumerate() {
            let referer = i.checked_sub(1).map(|prev| path[prev]);
            if let Some(prev) = referer {
                g += graph.path_cost(&[prev, node]).unwrap_or(0.0);
            }
            let entry = graph.search_node_mut(node);
            entry.referer = referer;
            entry.distance_from_start = g;
        }
    }

    fn finish(&mut self, updated: Vec<NodeIndex>, path: Vec<NodeIndex>) -> Step {
        self.finished = true;
        self.path.clone_from(&path);
        Step::Done { updated, path }
    }
}

impl Default for BidirectionalSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchAlgorithm for BidirectionalSearch {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Bidirectional
    }

    fn start(&mut self, graph: &mut RoadGraph, start: NodeIndex, end: NodeIndex) -> Result<(), Error> {
        let start_point = graph.try_node(start)?.geometry;
        let end_point = graph.try_node(end)?.geometry;

        graph.reset_nodes();
        self.reset();
        self.endpoints = Some((start, end));
        self.forward.prime(graph, start, end_point);
        self.backward.prime(graph, end, start_point);
        Ok(())
    }

    fn next_step(&mut self, graph: &mut RoadGraph) -> Step {
        if self.finished {
            return Step::Done {
                updated: Vec::new(),
                path: self.path.clone(),
            };
        }
        if self.endpoints.is_none() {
            return self.finish(Vec::new(), Vec::new());
        }

        self.last_assigned.clear();
        let (first, second) = if self.forward_turn {
            (&mut self.forward, &mut self.backward)
        } else {
            (&mut self.backward, &mut self.forward)
        };
        self.forward_turn = !self.forward_turn;

        let updated = match first.expand(graph, &mut self.last_assigned) {
            Some(updated) => updated,
            None => match second.expand(graph, &mut self.last_assigned) {
                Some(updated) => updated,
                None => {
                    debug!("Both frontiers exhausted, no route");
                    return self.finish(Vec::new(), Vec::new());
                }
            },
        };

        match self.find_meeting(&updated) {
            Some((meeting, cost)) => {
                debug!("Searches met at {meeting:?} with combined cost {cost:.1}");
                self.meeting = Some((meeting, cost));
                let path = self.assemble_path(graph, meeting);
                Self::commit_path(graph, &path);
                self.finish(updated, path)
            }
            None => Step::Continue(updated),
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn found_path(&self) -> bool {
        self.finished && !self.path.is_empty()
    }

    fn path(&self, _graph: &RoadGraph) -> Vec<NodeIndex> {
        self.path.clone()
    }

    fn reset(&mut self) {
        self.forward.clear();
        self.backward.clear();
        self.endpoints = None;
        self.forward_turn = true;
        self.last_assigned.clear();
        self.meeting = None;
        self.path.clear();
        self.finished = false;
    }

    fn stats(&self) -> SearchStats {
        SearchStats {
            open_nodes: self.forward.open.count_ones(..) + self.backward.open.count_ones(..),
            closed_nodes: self.forward.closed.count_ones(..) + self.backward.closed.count_ones(..),
            nodes_explored: self.forward.nodes_explored + self.backward.nodes_explored,
            edges_explored: self.forward.edges_explored + self.backward.edges_explored,
        }
    }

    fn referer_of(&self, graph: &RoadGraph, node: NodeIndex) -> Option<NodeIndex> {
        self.last_assigned
            .iter()
            .rev()
            .find(|(child, _)| *child == node)
            .map(|&(_, parent)| parent)
            .or_else(|| graph.node(node).and_then(|n| n.referer))
            .or_else(|| self.backward.parent.get(&node).copied())
    }
}

#[cfg(test)]
mod tests {
    use hashbrown::HashSet;

    use super::*;
    use crate::routing::{AStar, algorithms::fixtures};

    #[test]
    fn line_graph_meets_in_the_middle() {
        let (mut graph, nodes) = fixtures::unit_line();
        let mut search = BidirectionalSearch::new();
        let (path, steps) = fixtures::run_to_end(&mut search, &mut graph, nodes[0], nodes[3]);
        assert_eq!(path, nodes);
        assert_eq!(steps, 4);
        assert_eq!(search.meeting_point().map(|(node, _)| node), Some(nodes[2]));
        assert!((search.balance() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn committed_path_is_readable_from_referers() {
        let (mut graph, nodes) = fixtures::grid(6);
        let (start, end) = (nodes[0], nodes[35]);
        let mut search = BidirectionalSearch::new();
        let (path, _) = fixtures::run_to_end(&mut search, &mut graph, start, end);

        assert_eq!(graph.trace_referers(end), path);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&end));
        let unique: HashSet<_> = path.iter().collect();
        assert_eq!(unique.len(), path.len());
        assert!(graph.path_cost(&path).is_some());
    }

    #[test]
    fn route_cost_is_close_to_astar() {
        let (mut graph, nodes) = fixtures::grid(6);
        let mut astar = AStar::new();
        let (optimal, _) = fixtures::run_to_end(&mut astar, &mut graph, nodes[0], nodes[35]);
        let optimal_cost = graph.path_cost(&optimal).unwrap();

        let mut search = BidirectionalSearch::new();
        let (path, _) = fixtures::run_to_end(&mut search, &mut graph, nodes[0], nodes[35]);
        let cost = graph.path_cost(&path).unwrap();
        assert!(cost >= optimal_cost - 1e-6);
        assert!(search.meeting_optimality(optimal_cost).is_some());
    }

    #[test]
    fn disconnected_components_exhaust_both_sides() {
        let (mut graph, nodes) = fixtures::disconnected();
        let mut search = BidirectionalSearch::new();
        let (path, _) = fixtures::run_to_end(&mut search, &mut graph, nodes[0], nodes[3]);
        assert!(path.is_empty());
        assert!(search.is_finished());
        assert!(!search.found_path());
        assert_eq!(search.nodes_explored(), 4);
    }

    #[test]
    fn backward_updates_are_drawn_from_backward_parents() {
        let (mut graph, nodes) = fixtures::unit_line();
        let mut search = BidirectionalSearch::new();
        search.start(&mut graph, nodes[0], nodes[3]).unwrap();
        search.next_step(&mut graph);
        let step = search.next_step(&mut graph);
        assert_eq!(step.updated(), &[nodes[3], nodes[2]]);
        assert_eq!(search.referer_of(&graph, nodes[2]), Some(nodes[3]));
    }
}
