//! Road-network search engine with replayable exploration timelines.
//!
//! A [`RoadGraph`] is built once per play area from raw map elements
//! ([`loading`]), searched step by step by one of four interchangeable
//! [`SearchAlgorithm`]s ([`routing`]), and the search is recorded into a
//! [`Timeline`] by the [`StepExecutor`] so a renderer can replay or scrub it
//! ([`replay`]). [`scoring`] rates a hand-drawn route against the optimal one.

pub mod error;
pub mod loading;
pub mod model;
pub mod prelude;
pub mod replay;
pub mod routing;
pub mod scoring;

pub use error::Error;
pub use loading::{BuildReport, LoaderConfig, MapElement, build_road_graph, parse_elements};
pub use model::{EdgeId, RoadEdge, RoadGraph, RoadNode, RoadType};
pub use replay::{
    BackgroundRunner, ExecutionObserver, ExecutorConfig, ExecutorState, PrecomputedReplay,
    Segment, SegmentKind, StartMode, StepExecutor, Timeline, TimelinePlayer,
};
pub use routing::{
    AlgorithmKind, AlgorithmRunResult, SearchAlgorithm, SearchOutcome, Step, create_algorithm,
};
pub use scoring::{ScoreResult, ScoringConfig, ScoringEngine, Waypoint};

/// External map identifier of a node (OSM id).
pub type OsmNodeId = i64;

/// Travel cost along an edge, in metres unless overridden.
pub type Cost = f64;
