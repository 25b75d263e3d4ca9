/// Implements [`SearchAlgorithm`](crate::SearchAlgorithm) for a wrapper
/// around [`BestFirst`](crate::routing::common::BestFirst).
macro_rules! best_first_algorithm {
    ($ty:ty, $kind:expr) => {
        impl $crate::routing::SearchAlgorithm for $ty {
            fn kind(&self) -> $crate::routing::AlgorithmKind {
                $kind
            }

            fn start(
                &mut self,
                graph: &mut $crate::RoadGraph,
                start: petgraph::graph::NodeIndex,
                end: petgraph::graph::NodeIndex,
            ) -> Result<(), $crate::Error> {
                self.search.start(graph, start, end)
            }

            fn next_step(&mut self, graph: &mut $crate::RoadGraph) -> $crate::routing::Step {
                self.search.next_step(graph)
            }

            fn is_finished(&self) -> bool {
                self.search.is_finished()
            }

            fn found_path(&self) -> bool {
                self.search.found_path()
            }

            fn path(&self, graph: &$crate::RoadGraph) -> Vec<petgraph::graph::NodeIndex> {
                self.search.path(graph)
            }

            fn reset(&mut self) {
                self.search.reset();
            }

            fn stats(&self) -> $crate::routing::SearchStats {
                self.search.stats()
            }
        }
    };
}

pub(crate) use best_first_algorithm;

mod astar;
mod bidirectional;
mod dijkstra;
mod greedy;

pub use astar::AStar;
pub use bidirectional::BidirectionalSearch;
pub use dijkstra::Dijkstra;
pub use greedy::GreedyBestFirst;

#[cfg(test)]
pub(crate) mod fixtures {
    use geo::Point;
    use petgraph::graph::NodeIndex;

    use crate::{RoadGraph, RoadType, SearchAlgorithm, Step};

    /// A-B-C-D on a line with unit edge costs
    pub(crate) fn unit_line() -> (RoadGraph, Vec<NodeIndex>) {
        let mut graph = RoadGraph::new();
        let nodes: Vec<_> = (0..4_i32)
            .map(|i| {
                graph.add_node(
                    i64::from(i),
                    Point::new(-0.127_6 + f64::from(i) * 0.000_011, 51.507_3),
                )
            })
            .collect();
        for pair in nodes.windows(2) {
            graph.add_edge_with_cost(pair[0], pair[1], RoadType::Residential, true, 1.0);
        }
        (graph, nodes)
    }

    /// Two separate edges: 0-1 and 2-3
    pub(crate) fn disconnected() -> (RoadGraph, Vec<NodeIndex>) {
        let mut graph = RoadGraph::new();
        let nodes: Vec<_> = (0..4_i32)
            .map(|i| {
                graph.add_node(
                    i64::from(i),
                    Point::new(2.352_2 + f64::from(i) * 0.001_3, 48.856_6),
                )
            })
            .collect();
        graph.add_edge(nodes[0], nodes[1], RoadType::Service, true);
        graph.add_edge(nodes[2], nodes[3], RoadType::Service, true);
        (graph, nodes)
    }

    /// Square grid of `size`x`size` nodes, 100 m apart east-west and 145 m
    /// north-south
    pub(crate) fn grid(size: i32) -> (RoadGraph, Vec<NodeIndex>) {
        let mut graph = RoadGraph::new();
        let mut nodes = Vec::new();
        for row in 0..size {
            for col in 0..size {
                let point = Point::new(
                    13.404_954 + f64::from(col) * 0.001_47,
                    52.520_008 + f64::from(row) * 0.001_3,
                );
                nodes.push(graph.add_node(i64::from(row * size + col), point));
            }
        }
        let at = |row: i32, col: i32| nodes[usize::try_from(row * size + col).unwrap()];
        for row in 0..size {
            for col in 0..size {
                if col + 1 < size {
                    graph.add_edge(at(row, col), at(row, col + 1), RoadType::Residential, true);
                }
                if row + 1 < size {
                    graph.add_edge(at(row, col), at(row + 1, col), RoadType::Residential, true);
                }
            }
        }
        (graph, nodes)
    }

    /// Steps until done; returns (path, steps).
    pub(crate) fn run_to_end(
        algorithm: &mut dyn SearchAlgorithm,
        graph: &mut RoadGraph,
        start: NodeIndex,
        end: NodeIndex,
    ) -> (Vec<NodeIndex>, usize) {
        algorithm.start(graph, start, end).unwrap();
        let mut steps = 0;
        loop {
            steps += 1;
            assert!(steps < 100_000, "search did not terminate");
            if let Step::Done { path, .. } = algorithm.next_step(graph) {
                return (path, steps);
            }
        }
    }
}
