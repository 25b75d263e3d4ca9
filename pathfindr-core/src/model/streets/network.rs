//! Road graph: node arena, shared edge records and a spatial index

use geo::{Coord, Point, Rect};
use hashbrown::HashMap;
use log::{debug, trace};
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};
use rstar::{RTree, primitives::GeomWithData};

use super::components::{EdgeId, RoadEdge, RoadNode, RoadType, Traversal};
use crate::{Cost, Error, OsmNodeId, model::geo_distance};

type IndexedPoint = GeomWithData<[f64; 2], NodeIndex>;

/// Road network for a single play area.
///
/// Topology is built once; per-run search state lives on the nodes and edges
/// and is cleared with [`RoadGraph::reset_nodes`], which only visits what the
/// previous run touched.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    pub(crate) graph: DiGraph<RoadNode, Traversal>,
    edges: Vec<RoadEdge>,
    id_index: HashMap<OsmNodeId, NodeIndex>,
    /// Directed (from, to) pairs and the edge record that covers them
    traversals: HashMap<(NodeIndex, NodeIndex), EdgeId>,
    rtree: RTree<IndexedPoint>,
    bounds: Option<Rect<f64>>,
    start_node: Option<NodeIndex>,
    end_node: Option<NodeIndex>,
    touched_nodes: Vec<NodeIndex>,
    touched_edges: Vec<EdgeId>,
}

/// Summary figures for a road graph
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub average_degree: f64,
    /// (min lon, min lat, max lon, max lat)
    pub bounding_box: Option<(f64, f64, f64, f64)>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds a node, or returns the existing index when the id is already known.
    pub fn add_node(&mut self, id: OsmNodeId, geometry: Point<f64>) -> NodeIndex {
        if let Some(&existing) = self.id_index.get(&id) {
            return existing;
        }

        let index = self.graph.add_node(RoadNode::new(id, geometry));
        self.id_index.insert(id, index);
        self.rtree
            .insert(GeomWithData::new([geometry.x(), geometry.y()], index));
        self.extend_bounds(geometry);
        index
    }

    /// Connects two nodes with an edge costing their geographic distance.
    ///
    /// Returns `None` for self-loops and when every requested direction is
    /// already covered. A bidirectional edge over a pair that so far only has
    /// a one-way edge upgrades that edge and returns its id.
    pub fn add_edge(
        &mut self,
        a: NodeIndex,
        b: NodeIndex,
        road_type: RoadType,
        bidirectional: bool,
    ) -> Option<EdgeId> {
        let (node_a, node_b) = (self.graph.node_weight(a)?, self.graph.node_weight(b)?);
        let cost = geo_distance(node_a.geometry, node_b.geometry);
        self.add_edge_with_cost(a, b, road_type, bidirectional, cost)
    }

    /// Same as [`RoadGraph::add_edge`] with an explicit cost.
    pub fn add_edge_with_cost(
        &mut self,
        a: NodeIndex,
        b: NodeIndex,
        road_type: RoadType,
        bidirectional: bool,
        cost: Cost,
    ) -> Option<EdgeId> {
        if a == b || self.graph.node_weight(a).is_none() || self.graph.node_weight(b).is_none() {
            return None;
        }
        let forward = self.traversals.get(&(a, b)).copied();
        let backward = self.traversals.get(&(b, a)).copied();

        match (forward, backward) {
            (Some(_), _) if !bidirectional => {
                trace!("Skipping duplicate edge {a:?} -> {b:?}");
                None
            }
            (Some(_), Some(_)) => {
                trace!("Skipping duplicate edge between {a:?} and {b:?}");
                None
            }
            (Some(existing), None) => Some(self.upgrade_to_bidirectional(existing, b, a)),
            (None, Some(existing)) if bidirectional => {
                Some(self.upgrade_to_bidirectional(existing, a, b))
            }
            _ => {
                let edge_id = self.edges.len();
                self.edges.push(RoadEdge {
                    source: a,
                    target: b,
                    cost,
                    road_type,
                    bidirectional,
                    visited: false,
                });
                self.add_traversal(a, b, edge_id);
                if bidirectional {
                    self.add_traversal(b, a, edge_id);
                }
                Some(edge_id)
            }
        }
    }

    /// Adds the missing `from -> to` traversal to a one-way edge record.
    fn upgrade_to_bidirectional(&mut self, edge_id: EdgeId, from: NodeIndex, to: NodeIndex) -> EdgeId {
        debug!("Edge {edge_id} between {from:?} and {to:?} becomes bidirectional");
        self.edges[edge_id].bidirectional = true;
        self.add_traversal(from, to, edge_id);
        edge_id
    }

    fn add_traversal(&mut self, from: NodeIndex, to: NodeIndex, edge_id: EdgeId) {
        self.graph.add_edge(from, to, Traversal { edge: edge_id });
        self.traversals.insert((from, to), edge_id);
    }

    /// Looks a node up by its external id.
    pub fn node_by_id(&self, id: OsmNodeId) -> Option<&RoadNode> {
        self.index_of(id).map(|index| &self.graph[index])
    }

    pub fn index_of(&self, id: OsmNodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn node(&self, index: NodeIndex) -> Option<&RoadNode> {
        self.graph.node_weight(index)
    }

    /// Checked lookup returning [`Error::InvalidNodeIndex`] for foreign indices.
    pub fn try_node(&self, index: NodeIndex) -> Result<&RoadNode, Error> {
        self.node(index).ok_or(Error::InvalidNodeIndex)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &RoadNode)> {
        self.graph
            .node_indices()
            .map(move |index| (index, &self.graph[index]))
    }

    pub fn edge(&self, id: EdgeId) -> Option<&RoadEdge> {
        self.edges.get(id)
    }

    pub fn edges(&self) -> &[RoadEdge] {
        &self.edges
    }

    /// Outgoing neighbors of `index` as (neighbor, edge id, cost).
    pub fn neighbors(&self, index: NodeIndex) -> impl Iterator<Item = (NodeIndex, EdgeId, Cost)> {
        self.adjacent(index, Direction::Outgoing)
    }

    /// Neighbors that can reach `index` in one hop, for searches running
    /// against edge direction.
    pub fn predecessors(&self, index: NodeIndex) -> impl Iterator<Item = (NodeIndex, EdgeId, Cost)> {
        self.adjacent(index, Direction::Incoming)
    }

    fn adjacent(
        &self,
        index: NodeIndex,
        direction: Direction,
    ) -> impl Iterator<Item = (NodeIndex, EdgeId, Cost)> {
        self.graph
            .edges_directed(index, direction)
            .map(move |edge| {
                let neighbor = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                let id = edge.weight().edge;
                (neighbor, id, self.edges[id].cost)
            })
    }

    /// Nearest node by straight-line distance on the lon/lat plane.
    pub fn find_nearest_node(&self, point: Point<f64>) -> Option<NodeIndex> {
        self.rtree
            .nearest_neighbor(&[point.x(), point.y()])
            .map(|entry| entry.data)
    }

    /// Nearest node together with its great-circle distance in metres.
    pub fn nearest_node_with_distance(&self, point: Point<f64>) -> Option<(NodeIndex, f64)> {
        let index = self.find_nearest_node(point)?;
        Some((index, geo_distance(point, self.graph[index].geometry)))
    }

    /// All nodes within `radius_m` metres of `center`.
    pub fn nodes_within(&self, center: Point<f64>, radius_m: f64) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&index| geo_distance(center, self.graph[index].geometry) <= radius_m)
            .collect()
    }

    pub fn set_start_node(&mut self, index: Option<NodeIndex>) {
        self.start_node = index.filter(|&i| self.graph.node_weight(i).is_some());
    }

    pub fn set_end_node(&mut self, index: Option<NodeIndex>) {
        self.end_node = index.filter(|&i| self.graph.node_weight(i).is_some());
    }

    pub fn start_node(&self) -> Option<NodeIndex> {
        self.start_node
    }

    pub fn end_node(&self) -> Option<NodeIndex> {
        self.end_node
    }

    /// Clears per-run search state on every node and edge touched since the
    /// last reset. Topology is left untouched.
    pub fn reset_nodes(&mut self) {
        for index in self.touched_nodes.drain(..) {
            if let Some(node) = self.graph.node_weight_mut(index) {
                node.clear_search_state();
            }
        }
        for id in self.touched_edges.drain(..) {
            if let Some(edge) = self.edges.get_mut(id) {
                edge.visited = false;
            }
        }
    }

    /// Mutable access for searches; records the node for the next reset.
    pub(crate) fn search_node_mut(&mut self, index: NodeIndex) -> &mut RoadNode {
        let node = &mut self.graph[index];
        if !node.touched {
            node.touched = true;
            self.touched_nodes.push(index);
        }
        node
    }

    /// Tags an edge as explored. Returns `false` when it already was.
    pub(crate) fn mark_edge_visited(&mut self, id: EdgeId) -> bool {
        match self.edges.get_mut(id) {
            Some(edge) if !edge.visited => {
                edge.visited = true;
                self.touched_edges.push(id);
                true
            }
            _ => false,
        }
    }

    /// Follows `referer` from `end` back to the first node without one.
    ///
    /// Stops after `node_count` hops so a corrupted chain cannot spin forever;
    /// returns the nodes in start-to-end order.
    pub fn trace_referers(&self, end: NodeIndex) -> Vec<NodeIndex> {
        let mut path = Vec::new();
        let mut current = Some(end);
        while let Some(index) = current {
            if path.len() > self.node_count() {
                log::warn!("Referer chain from {end:?} exceeds node count - truncating");
                break;
            }
            path.push(index);
            current = self.graph.node_weight(index).and_then(|node| node.referer);
        }
        path.reverse();
        path
    }

    /// Sum of geographic distances along consecutive path nodes, in metres.
    pub fn path_distance(&self, path: &[NodeIndex]) -> f64 {
        path.windows(2)
            .map(|pair| geo_distance(self.graph[pair[0]].geometry, self.graph[pair[1]].geometry))
            .sum()
    }

    /// Sum of edge costs along consecutive path nodes.
    ///
    /// Returns `None` when two consecutive nodes are not connected.
    pub fn path_cost(&self, path: &[NodeIndex]) -> Option<Cost> {
        path.windows(2)
            .map(|pair| {
                self.neighbors(pair[0])
                    .filter(|&(neighbor, _, _)| neighbor == pair[1])
                    .map(|(_, _, cost)| cost)
                    .min_by(f64::total_cmp)
            })
            .sum()
    }

    pub fn stats(&self) -> GraphStats {
        let node_count = self.node_count();
        let edge_count = self.edge_count();
        #[allow(clippy::cast_precision_loss)]
        let average_degree = if node_count > 0 {
            edge_count as f64 * 2.0 / node_count as f64
        } else {
            0.0
        };
        GraphStats {
            node_count,
            edge_count,
            average_degree,
            bounding_box: self
                .bounds
                .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y)),
        }
    }

    fn extend_bounds(&mut self, point: Point<f64>) {
        let coord: Coord<f64> = point.into();
        self.bounds = Some(match self.bounds {
            None => Rect::new(coord, coord),
            Some(rect) => Rect::new(
                Coord {
                    x: rect.min().x.min(coord.x),
                    y: rect.min().y.min(coord.y),
                },
                Coord {
                    x: rect.max().x.max(coord.x),
                    y: rect.max().y.max(coord.y),
                },
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_graph() -> (RoadGraph, Vec<NodeIndex>) {
        let mut graph = RoadGraph::new();
        let nodes: Vec<_> = (0..4)
            .map(|i| graph.add_node(i, Point::new(-0.127_5 + f64::from(i as i32) * 0.001_1, 51.507_3)))
            .collect();
        for pair in nodes.windows(2) {
            graph.add_edge(pair[0], pair[1], RoadType::Residential, true);
        }
        (graph, nodes)
    }

    #[test]
    fn add_node_then_lookup_returns_same_node() {
        let mut graph = RoadGraph::new();
        let index = graph.add_node(42, Point::new(13.404_954, 52.520_008));
        let node = graph.node_by_id(42).unwrap();
        assert_eq!(node.id, 42);
        assert_eq!(node.geometry, Point::new(13.404_954, 52.520_008));
        assert_eq!(graph.index_of(42), Some(index));
        assert!(graph.node_by_id(43).is_none());
    }

    fn pair() -> (RoadGraph, NodeIndex, NodeIndex) {
        let mut graph = RoadGraph::new();
        let a = graph.add_node(1, Point::new(2.173_4, 41.385_1));
        let b = graph.add_node(2, Point::new(2.174_5, 41.385_1));
        (graph, a, b)
    }

    #[test]
    fn opposing_one_way_edges_are_both_kept() {
        let (mut graph, a, b) = pair();
        let forward = graph.add_edge(a, b, RoadType::Residential, false).unwrap();
        let backward = graph.add_edge(b, a, RoadType::Residential, false).unwrap();
        assert_ne!(forward, backward);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.neighbors(a).map(|(n, _, _)| n).collect::<Vec<_>>(), vec![b]);
        assert_eq!(graph.neighbors(b).map(|(n, _, _)| n).collect::<Vec<_>>(), vec![a]);
        assert!(graph.add_edge(a, b, RoadType::Residential, false).is_none());
        assert!(graph.add_edge(a, b, RoadType::Residential, true).is_none());
    }

    #[test]
    fn bidirectional_edge_upgrades_existing_one_way() {
        for reversed in [false, true] {
            let (mut graph, a, b) = pair();
            let one_way = graph.add_edge(a, b, RoadType::Tertiary, false).unwrap();
            let (from, to) = if reversed { (b, a) } else { (a, b) };
            assert_eq!(graph.add_edge(from, to, RoadType::Tertiary, true), Some(one_way));

            assert_eq!(graph.edge_count(), 1);
            assert!(graph.edge(one_way).unwrap().bidirectional);
            assert_eq!(graph.neighbors(a).count(), 1);
            assert_eq!(graph.neighbors(b).count(), 1);
            assert!(graph.add_edge(b, a, RoadType::Tertiary, false).is_none());
        }
    }

    #[test]
    fn duplicate_ids_keep_first_node() {
        let mut graph = RoadGraph::new();
        let a = graph.add_node(1, Point::new(0.1, 0.1));
        let b = graph.add_node(1, Point::new(5.0, 5.0));
        assert_eq!(a, b);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(a).unwrap().geometry, Point::new(0.1, 0.1));
    }

    #[test]
    fn bidirectional_edge_is_one_record_two_traversals() {
        let (graph, nodes) = line_graph();
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.neighbors(nodes[1]).count(), 2);
        let (_, id_forward, _) = graph.neighbors(nodes[0]).next().unwrap();
        let (_, id_back, _) = graph
            .neighbors(nodes[1])
            .find(|&(n, _, _)| n == nodes[0])
            .unwrap();
        assert_eq!(id_forward, id_back);
    }

    #[test]
    fn directed_edge_only_traverses_forward() {
        let mut graph = RoadGraph::new();
        let a = graph.add_node(1, Point::new(0.001, 0.001));
        let b = graph.add_node(2, Point::new(0.002, 0.001));
        graph.add_edge(a, b, RoadType::Primary, false);
        assert_eq!(graph.neighbors(a).count(), 1);
        assert_eq!(graph.neighbors(b).count(), 0);
        assert_eq!(graph.predecessors(b).count(), 1);
    }

    #[test]
    fn self_loops_and_duplicates_are_ignored() {
        let (mut graph, nodes) = line_graph();
        assert!(graph.add_edge(nodes[0], nodes[0], RoadType::Service, true).is_none());
        assert!(graph.add_edge(nodes[1], nodes[0], RoadType::Service, true).is_none());
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn reset_clears_search_state_but_keeps_topology() {
        let (mut graph, nodes) = line_graph();
        {
            let node = graph.search_node_mut(nodes[2]);
            node.visited = true;
            node.distance_from_start = 12.0;
            node.distance_to_end = 3.0;
            node.referer = Some(nodes[1]);
        }
        assert!(graph.mark_edge_visited(1));
        assert!(!graph.mark_edge_visited(1));

        graph.reset_nodes();

        let node = graph.node(nodes[2]).unwrap();
        assert!(!node.visited);
        assert!(node.referer.is_none());
        assert!(node.distance_from_start.is_infinite());
        assert_eq!(node.distance_to_end, 0.0);
        assert!(!graph.edge(1).unwrap().visited);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn nearest_node_uses_full_precision() {
        let (graph, nodes) = line_graph();
        let query = Point::new(-0.127_5 + 0.001_1 * 2.0 + 0.000_2, 51.507_4);
        assert_eq!(graph.find_nearest_node(query), Some(nodes[2]));
        assert!(RoadGraph::new().find_nearest_node(query).is_none());
    }

    #[test]
    fn radius_query_uses_metres() {
        let (graph, nodes) = line_graph();
        let center = graph.node(nodes[0]).unwrap().geometry;
        assert_eq!(graph.nodes_within(center, 100.0), vec![nodes[0], nodes[1]]);
        assert_eq!(graph.nodes_within(center, 1.0), vec![nodes[0]]);
    }

    #[test]
    fn trace_referers_builds_start_to_end_order() {
        let (mut graph, nodes) = line_graph();
        for pair in nodes.windows(2) {
            graph.search_node_mut(pair[1]).referer = Some(pair[0]);
        }
        assert_eq!(graph.trace_referers(nodes[3]), nodes);
    }

    #[test]
    fn path_cost_matches_edge_costs() {
        let (graph, nodes) = line_graph();
        let cost = graph.path_cost(&nodes).unwrap();
        let distance = graph.path_distance(&nodes);
        assert!((cost - distance).abs() < 1e-9);
        assert!(graph.path_cost(&[nodes[0], nodes[2]]).is_none());
    }

    #[test]
    fn stats_report_bounding_box() {
        let (graph, _) = line_graph();
        let stats = graph.stats();
        assert_eq!(stats.node_count, 4);
        assert!((stats.average_degree - 1.5).abs() < 1e-12);
        let (min_x, _, max_x, _) = stats.bounding_box.unwrap();
        assert!(min_x < max_x);
    }
}
