use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, TryRecvError},
    },
    thread,
    time::Duration,
};

use log::{debug, info, warn};
use petgraph::graph::NodeIndex;

use super::{ExecutorConfig, SegmentKind, Timeline};
use crate::{
    Error, RoadGraph,
    routing::{AlgorithmKind, AlgorithmRunResult, SearchOutcome, create_algorithm, run_to_completion},
};

/// Finished background run ready for instant playback
#[derive(Debug, Clone)]
pub struct PrecomputedReplay {
    pub result: AlgorithmRunResult,
    /// Route segments only, in start-to-end order
    pub timeline: Timeline,
    /// Zero-length route hops left out of the timeline
    pub degenerate_segments: usize,
}

impl PrecomputedReplay {
    pub fn matches(&self, kind: AlgorithmKind, start: NodeIndex, end: NodeIndex) -> bool {
        self.result.kind == kind && self.result.start == start && self.result.end == end
    }
}

type WorkerMessage = Result<PrecomputedReplay, Error>;

/// Runs a search silently on a worker thread with its own graph copy.
///
/// Each [`start`](BackgroundRunner::start) opens a fresh channel, so a result
/// from a cancelled run can never be mistaken for the current one.
pub struct BackgroundRunner {
    config: ExecutorConfig,
    receiver: Option<Receiver<WorkerMessage>>,
    cancel: Option<Arc<AtomicBool>>,
    request: Option<(AlgorithmKind, NodeIndex, NodeIndex)>,
    ready: Option<PrecomputedReplay>,
    last_error: Option<String>,
}

impl Default for BackgroundRunner {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl BackgroundRunner {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            receiver: None,
            cancel: None,
            request: None,
            ready: None,
            last_error: None,
        }
    }

    /// Cancels any in-flight run and starts `kind` on a copy of `graph`.
    pub fn start(
        &mut self,
        kind: AlgorithmKind,
        graph: &RoadGraph,
        start: NodeIndex,
        end: NodeIndex,
    ) {
        self.cancel();

        let (sender, receiver) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let mut local_graph = graph.clone();
        let config = self.config;

        debug!("Starting background {kind} run from {start:?} to {end:?}");
        thread::spawn(move || {
            let message = precompute(kind, &mut local_graph, start, end, &config, &worker_cancel);
            if worker_cancel.load(Ordering::Relaxed) {
                return;
            }
            // Receiver gone means the run was superseded
            let _ = sender.send(message);
        });

        self.receiver = Some(receiver);
        self.cancel = Some(cancel);
        self.request = Some((kind, start, end));
    }

    /// Collects a finished result if one arrived. Never blocks.
    ///
    /// Returns `true` when a result is ready.
    pub fn poll(&mut self) -> bool {
        if let Some(receiver) = &self.receiver {
            match receiver.try_recv() {
                Ok(message) => self.accept(message),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    warn!("Background worker exited without a result");
                    self.receiver = None;
                }
            }
        }
        self.ready.is_some()
    }

    /// Blocks up to `timeout` for the current run. Returns `true` when a
    /// result is ready.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if let Some(receiver) = &self.receiver {
            match receiver.recv_timeout(timeout) {
                Ok(message) => self.accept(message),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.receiver = None,
            }
        }
        self.ready.is_some()
    }

    fn accept(&mut self, message: WorkerMessage) {
        self.receiver = None;
        self.cancel = None;
        match message {
            Ok(replay) => {
                info!(
                    "Background {} run ready: {:?}, {} route segments",
                    replay.result.kind,
                    replay.result.outcome,
                    replay.timeline.len()
                );
                self.ready = Some(replay);
            }
            Err(err) => {
                warn!("Background run failed: {err}");
                self.last_error = Some(err.to_string());
            }
        }
    }

    /// Stops the in-flight run, if any, and forgets the ready result.
    pub fn cancel(&mut self) {
        if let Some(flag) = self.cancel.take() {
            flag.store(true, Ordering::Relaxed);
        }
        self.receiver = None;
        self.request = None;
        self.ready = None;
        self.last_error = None;
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    pub fn ready(&self) -> Option<&PrecomputedReplay> {
        self.ready.as_ref()
    }

    /// Ready result for exactly this query
    pub fn ready_for(
        &self,
        kind: AlgorithmKind,
        start: NodeIndex,
        end: NodeIndex,
    ) -> Option<&PrecomputedReplay> {
        self.ready
            .as_ref()
            .filter(|replay| replay.matches(kind, start, end))
    }

    pub fn take_ready(&mut self) -> Option<PrecomputedReplay> {
        self.ready.take()
    }

    /// Query of the current or last run
    pub fn request(&self) -> Option<(AlgorithmKind, NodeIndex, NodeIndex)> {
        self.request
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for BackgroundRunner {
    fn drop(&mut self) {
        if let Some(flag) = &self.cancel {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

/// Runs the search and lays the found route out as a route-only timeline.
fn precompute(
    kind: AlgorithmKind,
    graph: &mut RoadGraph,
    start: NodeIndex,
    end: NodeIndex,
    config: &ExecutorConfig,
    cancel: &AtomicBool,
) -> Result<PrecomputedReplay, Error> {
    if graph.is_empty() {
        return Err(Error::NoRoadData);
    }
    let mut algorithm = create_algorithm(kind);
    let result = run_to_completion(
        algorithm.as_mut(),
        graph,
        start,
        end,
        config.instant_max_steps,
        Some(cancel),
    )?;
    if result.outcome == SearchOutcome::Cancelled {
        return Err(Error::BackgroundWorker("cancelled".to_string()));
    }

    let mut timeline = Timeline::new(config);
    let mut degenerate_segments = 0;
    for pair in result.path.windows(2) {
        if let (Some(from), Some(to)) = (graph.node(pair[0]), graph.node(pair[1])) {
            if let Err(Error::DegenerateSegment { .. }) =
                timeline.add_node_segment(from, to, SegmentKind::Route, config.route_speed_multiplier)
            {
                degenerate_segments += 1;
            }
        }
    }
    if degenerate_segments > 0 {
        warn!("{degenerate_segments} zero-length route hops left out of the {kind} replay");
    }
    Ok(PrecomputedReplay {
        result,
        timeline,
        degenerate_segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::algorithms::fixtures;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn background_run_produces_route_only_timeline() {
        let (graph, nodes) = fixtures::grid(6);
        let mut runner = BackgroundRunner::default();
        runner.start(AlgorithmKind::AStar, &graph, nodes[0], nodes[35]);
        assert!(runner.is_running() || runner.is_ready());
        assert!(runner.wait(TIMEOUT));

        let replay = runner.ready_for(AlgorithmKind::AStar, nodes[0], nodes[35]).unwrap();
        assert!(replay.result.success);
        assert_eq!(replay.timeline.len(), replay.result.path.len() - 1);
        assert_eq!(replay.timeline.len(), replay.timeline.count(SegmentKind::Route));
        assert!(runner.ready_for(AlgorithmKind::Dijkstra, nodes[0], nodes[35]).is_none());
        assert!(!runner.is_running());
    }

    #[test]
    fn caller_graph_is_left_untouched() {
        let (graph, nodes) = fixtures::grid(4);
        let mut runner = BackgroundRunner::default();
        runner.start(AlgorithmKind::Dijkstra, &graph, nodes[0], nodes[15]);
        assert!(runner.wait(TIMEOUT));
        assert!(graph.nodes().all(|(_, node)| !node.visited && node.referer.is_none()));
    }

    #[test]
    fn restart_replaces_previous_request() {
        let (graph, nodes) = fixtures::grid(5);
        let mut runner = BackgroundRunner::default();
        runner.start(AlgorithmKind::Greedy, &graph, nodes[0], nodes[24]);
        runner.start(AlgorithmKind::Bidirectional, &graph, nodes[0], nodes[24]);
        assert_eq!(
            runner.request(),
            Some((AlgorithmKind::Bidirectional, nodes[0], nodes[24]))
        );
        assert!(runner.wait(TIMEOUT));
        assert_eq!(runner.ready().unwrap().result.kind, AlgorithmKind::Bidirectional);
    }

    #[test]
    fn cancel_clears_ready_result() {
        let (graph, nodes) = fixtures::grid(3);
        let mut runner = BackgroundRunner::default();
        runner.start(AlgorithmKind::AStar, &graph, nodes[0], nodes[8]);
        assert!(runner.wait(TIMEOUT));
        runner.cancel();
        assert!(!runner.is_ready());
        assert!(!runner.poll());
    }

    #[test]
    fn zero_length_route_hops_are_counted() {
        let mut graph = RoadGraph::new();
        let a = graph.add_node(1, geo::Point::new(4.899_431, 52.379_189));
        let b = graph.add_node(2, geo::Point::new(4.899_431, 52.379_189));
        let c = graph.add_node(3, geo::Point::new(4.901_2, 52.379_189));
        graph.add_edge_with_cost(a, b, crate::RoadType::Service, true, 1.0);
        graph.add_edge(b, c, crate::RoadType::Service, true);

        let mut runner = BackgroundRunner::default();
        runner.start(AlgorithmKind::Dijkstra, &graph, a, c);
        assert!(runner.wait(TIMEOUT));
        let replay = runner.take_ready().unwrap();
        assert_eq!(replay.result.path, vec![a, b, c]);
        assert_eq!(replay.degenerate_segments, 1);
        assert_eq!(replay.timeline.rejected_segments(), 1);
        assert_eq!(replay.timeline.len(), 1);
    }

    #[test]
    fn no_route_is_still_a_ready_result() {
        let (graph, nodes) = fixtures::disconnected();
        let mut runner = BackgroundRunner::default();
        runner.start(AlgorithmKind::AStar, &graph, nodes[0], nodes[3]);
        assert!(runner.wait(TIMEOUT));
        let replay = runner.take_ready().unwrap();
        assert_eq!(replay.result.outcome, SearchOutcome::NoPath);
        assert!(replay.timeline.is_empty());
    }
}
