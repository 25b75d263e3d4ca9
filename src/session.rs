use std::time::Duration;

use geo::Point;
use log::{debug, info, warn};
use pathfindr_core::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Core(#[from] pathfindr_core::Error),
    #[error("Start and end markers must both be placed")]
    MarkersNotPlaced,
    #[error("No finished run to score against")]
    RunNotFinished,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub loader: LoaderConfig,
    pub executor: ExecutorConfig,
    pub scoring: ScoringConfig,
}

/// Marker and run overview for a status panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub algorithm: AlgorithmKind,
    pub start: Option<OsmNodeId>,
    pub end: Option<OsmNodeId>,
    pub state: ExecutorState,
    pub outcome: Option<SearchOutcome>,
    pub steps: usize,
    pub route_nodes: usize,
    pub background_ready: bool,
    pub waypoints: usize,
}

/// One play area: a road graph, its markers and the runs over it.
pub struct Session {
    graph: RoadGraph,
    report: BuildReport,
    algorithm: AlgorithmKind,
    executor: StepExecutor,
    background: BackgroundRunner,
    scoring: ScoringEngine,
    waypoints: Vec<Waypoint>,
    player_trail: Timeline,
}

impl Session {
    /// Builds the road graph from raw map elements.
    ///
    /// # Errors
    ///
    /// Returns [`pathfindr_core::Error::NoRoadData`] when no road survives
    /// construction, or the loader's error on precision loss.
    pub fn from_elements(elements: &[MapElement], config: SessionConfig) -> Result<Self, SessionError> {
        let (graph, report) = build_road_graph(elements, &config.loader)?;
        if graph.is_empty() || graph.edge_count() == 0 {
            return Err(pathfindr_core::Error::NoRoadData.into());
        }
        info!(
            "Session ready with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(Self {
            graph,
            report,
            algorithm: AlgorithmKind::AStar,
            executor: StepExecutor::new(config.executor),
            background: BackgroundRunner::new(config.executor),
            scoring: ScoringEngine::new(config.scoring),
            waypoints: Vec::new(),
            player_trail: Timeline::new(&config.executor),
        })
    }

    /// Same as [`Session::from_elements`] from an Overpass JSON document.
    pub fn from_json(json: &str, config: SessionConfig) -> Result<Self, SessionError> {
        let elements = parse_elements(json)?;
        Self::from_elements(&elements, config)
    }

    pub fn graph(&self) -> &RoadGraph {
        &self.graph
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn algorithm(&self) -> AlgorithmKind {
        self.algorithm
    }

    /// Snaps the start marker to the road node nearest `point`.
    pub fn place_start(&mut self, point: Point<f64>) -> Result<NodeIndex, SessionError> {
        let index = self.snap(point)?;
        self.graph.set_start_node(Some(index));
        self.markers_changed();
        Ok(index)
    }

    /// Snaps the end marker to the road node nearest `point`.
    pub fn place_end(&mut self, point: Point<f64>) -> Result<NodeIndex, SessionError> {
        let index = self.snap(point)?;
        self.graph.set_end_node(Some(index));
        self.markers_changed();
        Ok(index)
    }

    pub fn clear_markers(&mut self) {
        self.graph.set_start_node(None);
        self.graph.set_end_node(None);
        self.background.cancel();
        self.executor.stop();
    }

    pub fn markers(&self) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.start_node().zip(self.graph.end_node())
    }

    fn snap(&self, point: Point<f64>) -> Result<NodeIndex, SessionError> {
        self.graph
            .find_nearest_node(point)
            .ok_or(SessionError::Core(pathfindr_core::Error::NoPointsFound))
    }

    fn markers_changed(&mut self) {
        if let Some((start, end)) = self.markers() {
            self.background
                .start(self.algorithm, &self.graph, start, end);
        }
    }

    /// Switches algorithm. A precompute for the old one is cancelled and
    /// restarted for the new one.
    pub fn set_algorithm(&mut self, kind: AlgorithmKind) {
        if kind == self.algorithm {
            return;
        }
        debug!("Algorithm changed from {} to {kind}", self.algorithm);
        self.algorithm = kind;
        self.background.cancel();
        self.markers_changed();
    }

    pub fn background(&self) -> &BackgroundRunner {
        &self.background
    }

    /// Blocks up to `timeout` for the background precompute.
    pub fn wait_for_background(&mut self, timeout: Duration) -> bool {
        self.background.wait(timeout)
    }

    /// Starts visualizing the current query, replaying the precomputed run
    /// when it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MarkersNotPlaced`] until both markers are set.
    pub fn start_visualization(&mut self) -> Result<StartMode, SessionError> {
        let (start, end) = self.markers().ok_or(SessionError::MarkersNotPlaced)?;
        let mode = self.executor.start_or_replay(
            self.algorithm,
            &mut self.graph,
            start,
            end,
            &mut self.background,
        )?;
        info!("Visualizing {} ({mode:?})", self.algorithm);
        Ok(mode)
    }

    pub fn tick(&mut self) -> ExecutorState {
        self.executor.tick(&mut self.graph)
    }

    pub fn run_to_end(&mut self) -> ExecutorState {
        self.executor.run_to_end(&mut self.graph)
    }

    pub fn stop(&mut self) {
        self.executor.stop();
    }

    pub fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    pub fn timeline(&self) -> &Timeline {
        self.executor.timeline()
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        self.executor.timeline_mut()
    }

    /// Records a point of the player's hand-drawn route.
    pub fn add_waypoint(&mut self, waypoint: Waypoint) {
        if let Some(previous) = self.waypoints.last() {
            // Repeated clicks on the same spot only count once in the trail
            if self
                .player_trail
                .add_segment(previous.point(), waypoint.point(), SegmentKind::Player, 1.0)
                .is_err()
            {
                warn!("Ignoring repeated waypoint at ({}, {})", waypoint.lat, waypoint.lon);
                return;
            }
        }
        self.waypoints.push(waypoint);
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Player-drawn segments, timed like exploration segments
    pub fn player_trail(&self) -> &Timeline {
        &self.player_trail
    }

    pub fn clear_waypoints(&mut self) {
        self.waypoints.clear();
        self.player_trail.clear();
    }

    /// Scores the waypoints against the route of the finished run.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RunNotFinished`] while no run has finished.
    pub fn score(&self) -> Result<ScoreResult, SessionError> {
        if self.executor.state() != ExecutorState::Finished {
            return Err(SessionError::RunNotFinished);
        }
        Ok(self
            .scoring
            .score_path(&self.graph, &self.waypoints, self.executor.path()))
    }

    pub fn summary(&self) -> SessionSummary {
        let id_of = |index: Option<NodeIndex>| {
            index.and_then(|index| self.graph.node(index)).map(|node| node.id)
        };
        SessionSummary {
            algorithm: self.algorithm,
            start: id_of(self.graph.start_node()),
            end: id_of(self.graph.end_node()),
            state: self.executor.state(),
            outcome: self.executor.outcome(),
            steps: self.executor.steps(),
            route_nodes: self.executor.path().len(),
            background_ready: self.background.is_ready(),
            waypoints: self.waypoints.len(),
        }
    }
}
