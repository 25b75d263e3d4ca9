// Graph construction
pub use crate::loading::{BuildReport, LoaderConfig, MapElement, build_road_graph, parse_elements};
pub use crate::model::{RoadEdge, RoadGraph, RoadNode, RoadType};

// Searching
pub use crate::routing::{
    AlgorithmKind, AlgorithmRunResult, SearchAlgorithm, SearchOutcome, Step, compare_algorithms,
    create_algorithm,
};

// Recording and playback
pub use crate::replay::{
    BackgroundRunner, ExecutionObserver, ExecutorConfig, ExecutorState, PrecomputedReplay,
    SegmentKind, StartMode, StepExecutor, Timeline, TimelinePlayer,
};

// Scoring
pub use crate::scoring::{ScoreResult, ScoringConfig, ScoringEngine, Waypoint};

pub use crate::Error;
pub use crate::OsmNodeId;
pub use petgraph::graph::NodeIndex;
