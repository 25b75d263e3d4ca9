use std::time::Duration;

use log::{debug, info, warn};
use petgraph::graph::NodeIndex;
use serde::Serialize;

use super::{BackgroundRunner, ExecutorConfig, SegmentKind, Timeline};
use crate::{
    Error, RoadGraph,
    routing::{
        AlgorithmKind, AlgorithmRunResult, SearchAlgorithm, SearchOutcome, Step, create_algorithm,
        run_to_completion,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    #[default]
    Idle,
    Executing,
    RouteTracing,
    Finished,
}

/// How [`StepExecutor::start_or_replay`] satisfied the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    /// A finished background run was replayed
    Precomputed,
    /// A new search was started and will advance on each tick
    Live,
}

/// Receives progress notifications from a [`StepExecutor`]
pub trait ExecutionObserver: Send {
    fn on_step(&mut self, _step: usize, _updated: &[NodeIndex]) {}

    fn on_search_finished(&mut self, _outcome: SearchOutcome, _path: &[NodeIndex]) {}

    fn on_route_traced(&mut self, _path: &[NodeIndex]) {}
}

/// Drives a search one step per [`tick`](StepExecutor::tick) and records the
/// exploration, then the traced route, into a [`Timeline`].
pub struct StepExecutor {
    config: ExecutorConfig,
    algorithm: Option<Box<dyn SearchAlgorithm>>,
    timeline: Timeline,
    state: ExecutorState,
    steps: usize,
    outcome: Option<SearchOutcome>,
    endpoints: Option<(NodeIndex, NodeIndex)>,
    path: Vec<NodeIndex>,
    trace_cursor: Option<NodeIndex>,
    trace_hops: usize,
    degenerate_segments: usize,
    observers: Vec<Box<dyn ExecutionObserver>>,
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl StepExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            algorithm: None,
            timeline: Timeline::new(&config),
            state: ExecutorState::Idle,
            steps: 0,
            outcome: None,
            endpoints: None,
            path: Vec::new(),
            trace_cursor: None,
            trace_hops: 0,
            degenerate_segments: 0,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn ExecutionObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Starts a visualized run, clearing the previous timeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRoadData`] for an empty graph and
    /// [`Error::InvalidNodeIndex`] for endpoints outside it.
    pub fn start(
        &mut self,
        mut algorithm: Box<dyn SearchAlgorithm>,
        graph: &mut RoadGraph,
        start: NodeIndex,
        end: NodeIndex,
    ) -> Result<(), Error> {
        if graph.is_empty() {
            return Err(Error::NoRoadData);
        }
        algorithm.start(graph, start, end)?;
        graph.set_start_node(Some(start));
        graph.set_end_node(Some(end));

        self.clear_run();
        info!(
            "Starting {} from {:?} to {:?}",
            algorithm.kind(),
            start,
            end
        );
        self.algorithm = Some(algorithm);
        self.endpoints = Some((start, end));
        self.state = ExecutorState::Executing;
        Ok(())
    }

    /// Replays a matching background result when one is ready, otherwise
    /// starts a live run of `kind`.
    ///
    /// # Errors
    ///
    /// Same as [`StepExecutor::start`] when falling back to a live run.
    pub fn start_or_replay(
        &mut self,
        kind: AlgorithmKind,
        graph: &mut RoadGraph,
        start: NodeIndex,
        end: NodeIndex,
        background: &mut BackgroundRunner,
    ) -> Result<StartMode, Error> {
        background.poll();
        if let Some(replay) = background.ready_for(kind, start, end) {
            self.clear_run();
            self.timeline = replay.timeline.clone();
            self.degenerate_segments = replay.degenerate_segments;
            self.path.clone_from(&replay.result.path);
            self.steps = replay.result.steps;
            self.outcome = Some(replay.result.outcome);
            self.endpoints = Some((start, end));
            self.state = ExecutorState::Finished;
            graph.set_start_node(Some(start));
            graph.set_end_node(Some(end));
            info!(
                "Replaying precomputed {} run ({} segments)",
                kind,
                self.timeline.len()
            );
            let outcome = replay.result.outcome;
            for observer in &mut self.observers {
                observer.on_search_finished(outcome, &self.path);
                observer.on_route_traced(&self.path);
            }
            return Ok(StartMode::Precomputed);
        }

        self.start(create_algorithm(kind), graph, start, end)?;
        Ok(StartMode::Live)
    }

    /// Advances by one search step or one route hop.
    pub fn tick(&mut self, graph: &mut RoadGraph) -> ExecutorState {
        match self.state {
            ExecutorState::Executing => self.search_tick(graph),
            ExecutorState::RouteTracing => self.trace_tick(graph),
            ExecutorState::Idle | ExecutorState::Finished => {}
        }
        self.state
    }

    /// Ticks until the run is finished.
    pub fn run_to_end(&mut self, graph: &mut RoadGraph) -> ExecutorState {
        while matches!(
            self.state,
            ExecutorState::Executing | ExecutorState::RouteTracing
        ) {
            self.tick(graph);
        }
        self.state
    }

    fn search_tick(&mut self, graph: &mut RoadGraph) {
        let Some(algorithm) = self.algorithm.as_mut() else {
            self.state = ExecutorState::Finished;
            return;
        };

        if self.steps >= self.config.max_steps {
            warn!(
                "{} reached the step limit of {} without finishing",
                algorithm.kind(),
                self.config.max_steps
            );
            self.finish_search(SearchOutcome::StepLimit, Vec::new());
            self.state = ExecutorState::Finished;
            return;
        }

        self.steps += 1;
        let step = algorithm.next_step(graph);
        for &node in step.updated() {
            let Some(parent) = algorithm.referer_of(graph, node) else {
                continue;
            };
            if let (Some(from), Some(to)) = (graph.node(parent), graph.node(node)) {
                let result = self.timeline.add_node_segment(
                    from,
                    to,
                    SegmentKind::Exploration,
                    self.config.exploration_speed_multiplier,
                );
                if result.is_err() {
                    self.degenerate_segments += 1;
                }
            }
        }
        let steps = self.steps;
        for observer in &mut self.observers {
            observer.on_step(steps, step.updated());
        }

        if let Step::Done { path, .. } = step {
            if path.is_empty() {
                debug!("Search finished after {steps} steps without a route");
                self.finish_search(SearchOutcome::NoPath, path);
                self.state = ExecutorState::Finished;
            } else {
                debug!("Route found after {steps} steps, tracing {} nodes", path.len());
                self.trace_cursor = self.endpoints.map(|(_, end)| end);
                self.trace_hops = 0;
                self.finish_search(SearchOutcome::Found, path);
                self.state = ExecutorState::RouteTracing;
            }
        }
    }

    fn trace_tick(&mut self, graph: &RoadGraph) {
        let next = self.trace_cursor.and_then(|cursor| {
            let parent = graph.node(cursor)?.referer?;
            Some((cursor, parent))
        });

        match next {
            Some((cursor, parent)) if self.trace_hops < graph.node_count() => {
                if let (Some(from), Some(to)) = (graph.node(parent), graph.node(cursor)) {
                    let result = self.timeline.add_node_segment(
                        from,
                        to,
                        SegmentKind::Route,
                        self.config.route_speed_multiplier,
                    );
                    if result.is_err() {
                        self.degenerate_segments += 1;
                    }
                }
                self.trace_cursor = Some(parent);
                self.trace_hops += 1;
            }
            _ => {
                debug!("Route traced in {} hops", self.trace_hops);
                self.trace_cursor = None;
                self.state = ExecutorState::Finished;
                for observer in &mut self.observers {
                    observer.on_route_traced(&self.path);
                }
            }
        }
    }

    fn finish_search(&mut self, outcome: SearchOutcome, path: Vec<NodeIndex>) {
        self.outcome = Some(outcome);
        self.path = path;
        for observer in &mut self.observers {
            observer.on_search_finished(outcome, &self.path);
        }
    }

    fn clear_run(&mut self) {
        self.timeline.clear();
        self.algorithm = None;
        self.state = ExecutorState::Idle;
        self.steps = 0;
        self.outcome = None;
        self.endpoints = None;
        self.path.clear();
        self.trace_cursor = None;
        self.trace_hops = 0;
        self.degenerate_segments = 0;
    }

    /// Cancels the current run. Segments already recorded are kept.
    pub fn stop(&mut self) {
        if matches!(
            self.state,
            ExecutorState::Executing | ExecutorState::RouteTracing
        ) {
            if self.outcome.is_none() {
                self.outcome = Some(SearchOutcome::Cancelled);
            }
            self.trace_cursor = None;
            self.state = ExecutorState::Finished;
        }
    }

    /// Runs a search to completion without touching the timeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRoadData`] for an empty graph and
    /// [`Error::InvalidNodeIndex`] for endpoints outside it.
    pub fn execute_instant(
        &self,
        algorithm: &mut dyn SearchAlgorithm,
        graph: &mut RoadGraph,
        start: NodeIndex,
        end: NodeIndex,
    ) -> Result<AlgorithmRunResult, Error> {
        if graph.is_empty() {
            return Err(Error::NoRoadData);
        }
        run_to_completion(
            algorithm,
            graph,
            start,
            end,
            self.config.instant_max_steps,
            None,
        )
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.state,
            ExecutorState::Executing | ExecutorState::RouteTracing
        )
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    pub fn outcome(&self) -> Option<SearchOutcome> {
        self.outcome
    }

    /// Route of the last finished search, start to end
    pub fn path(&self) -> &[NodeIndex] {
        &self.path
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn algorithm(&self) -> Option<&dyn SearchAlgorithm> {
        self.algorithm.as_deref()
    }

    /// Zero-length segments skipped during the current run
    pub fn degenerate_segments(&self) -> usize {
        self.degenerate_segments
    }

    /// Delay before the next tick: the step interval while searching, the
    /// hop interval while tracing the route.
    pub fn next_tick_delay(&self) -> Result<Duration, Error> {
        match self.state {
            ExecutorState::RouteTracing => self.config.trace_interval(),
            _ => self.config.tick_interval(),
        }
    }
}
