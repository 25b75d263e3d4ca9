//! Stepwise single-pair search over a [`RoadGraph`].
//!
//! Every algorithm advances one node expansion per [`SearchAlgorithm::next_step`]
//! call so a driver can animate the exploration. Per-run state lives on the
//! graph nodes (`distance_from_start`, `referer`, ...) and is cleared by
//! [`SearchAlgorithm::start`].

pub mod algorithms;
mod common;
pub mod compare;
mod runner;
mod state;

use std::{fmt, str::FromStr, time::Duration};

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

pub use algorithms::{AStar, BidirectionalSearch, Dijkstra, GreedyBestFirst};
pub use compare::{AlgorithmComparison, compare_algorithms};
pub use runner::run_to_completion;

use crate::{Error, OsmNodeId, RoadGraph};

/// Result of one [`SearchAlgorithm::next_step`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Search goes on; carries the nodes whose cost or ownership changed
    Continue(Vec<NodeIndex>),
    /// Search is over. An empty path means the end node is unreachable.
    Done {
        updated: Vec<NodeIndex>,
        path: Vec<NodeIndex>,
    },
}

impl Step {
    pub fn updated(&self) -> &[NodeIndex] {
        match self {
            Step::Continue(updated) | Step::Done { updated, .. } => updated,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Step::Done { .. })
    }
}

/// Counters describing a search in progress or finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub open_nodes: usize,
    pub closed_nodes: usize,
    pub nodes_explored: usize,
    pub edges_explored: usize,
}

/// Shared protocol of the four search strategies
pub trait SearchAlgorithm: Send {
    fn kind(&self) -> AlgorithmKind;

    /// Clears the graph's run state and primes the frontier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNodeIndex`] when either index is not in `graph`.
    fn start(&mut self, graph: &mut RoadGraph, start: NodeIndex, end: NodeIndex)
    -> Result<(), Error>;

    /// Expands one node. Calling it after the search finished returns an
    /// empty [`Step::Done`] with the final path.
    fn next_step(&mut self, graph: &mut RoadGraph) -> Step;

    fn is_finished(&self) -> bool;

    /// True once finished with a route from start to end
    fn found_path(&self) -> bool;

    /// Start-to-end path read from the `referer` chain. Empty until the
    /// search has finished successfully.
    fn path(&self, graph: &RoadGraph) -> Vec<NodeIndex>;

    /// Forgets all algorithm-side state. Graph state is cleared on the next
    /// [`SearchAlgorithm::start`].
    fn reset(&mut self);

    fn stats(&self) -> SearchStats;

    fn nodes_explored(&self) -> usize {
        self.stats().nodes_explored
    }

    /// Node an exploration segment toward `node` should be drawn from.
    fn referer_of(&self, graph: &RoadGraph, node: NodeIndex) -> Option<NodeIndex> {
        graph.node(node).and_then(|n| n.referer)
    }
}

/// Available search strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmKind {
    #[serde(alias = "a*", alias = "a_star")]
    AStar,
    Dijkstra,
    #[serde(alias = "greedy_best_first")]
    Greedy,
    Bidirectional,
}

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 4] = [
        AlgorithmKind::AStar,
        AlgorithmKind::Dijkstra,
        AlgorithmKind::Greedy,
        AlgorithmKind::Bidirectional,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmKind::AStar => "astar",
            AlgorithmKind::Dijkstra => "dijkstra",
            AlgorithmKind::Greedy => "greedy",
            AlgorithmKind::Bidirectional => "bidirectional",
        }
    }

    /// Human readable name for logs and UIs
    pub fn display_name(self) -> &'static str {
        match self {
            AlgorithmKind::AStar => "A*",
            AlgorithmKind::Dijkstra => "Dijkstra",
            AlgorithmKind::Greedy => "Greedy Best-First",
            AlgorithmKind::Bidirectional => "Bidirectional",
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "astar" | "a*" | "a_star" | "a-star" => Ok(AlgorithmKind::AStar),
            "dijkstra" => Ok(AlgorithmKind::Dijkstra),
            "greedy" | "greedy_best_first" | "greedy-best-first" => Ok(AlgorithmKind::Greedy),
            "bidirectional" => Ok(AlgorithmKind::Bidirectional),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Creates a fresh algorithm instance of the given kind.
pub fn create_algorithm(kind: AlgorithmKind) -> Box<dyn SearchAlgorithm> {
    match kind {
        AlgorithmKind::AStar => Box::new(AStar::new()),
        AlgorithmKind::Dijkstra => Box::new(Dijkstra::new()),
        AlgorithmKind::Greedy => Box::new(GreedyBestFirst::new()),
        AlgorithmKind::Bidirectional => Box::new(BidirectionalSearch::new()),
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    Found,
    NoPath,
    StepLimit,
    Cancelled,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmRunResult {
    pub kind: AlgorithmKind,
    pub start: NodeIndex,
    pub end: NodeIndex,
    /// Start-to-end node sequence, empty when no route was found
    pub path: Vec<NodeIndex>,
    pub steps: usize,
    pub nodes_explored: usize,
    pub elapsed: Duration,
    /// Geographic route length in metres
    pub distance_m: f64,
    pub outcome: SearchOutcome,
    pub success: bool,
}

impl AlgorithmRunResult {
    /// External ids of the path nodes
    pub fn path_ids(&self, graph: &RoadGraph) -> Vec<OsmNodeId> {
        self.path
            .iter()
            .filter_map(|&index| graph.node(index).map(|node| node.id))
            .collect()
    }
}
