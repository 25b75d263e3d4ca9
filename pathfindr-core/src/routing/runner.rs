use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use log::{debug, warn};
use petgraph::graph::NodeIndex;

use super::{AlgorithmRunResult, SearchAlgorithm, SearchOutcome, Step};
use crate::{Error, RoadGraph};

/// Runs `algorithm` from `start` to `end` without recording anything.
///
/// Stops after `max_steps` steps with [`SearchOutcome::StepLimit`], or with
/// [`SearchOutcome::Cancelled`] as soon as `cancel` is raised between steps.
///
/// # Errors
///
/// Returns [`Error::InvalidNodeIndex`] when either endpoint is not in `graph`.
pub fn run_to_completion(
    algorithm: &mut dyn SearchAlgorithm,
    graph: &mut RoadGraph,
    start: NodeIndex,
    end: NodeIndex,
    max_steps: usize,
    cancel: Option<&AtomicBool>,
) -> Result<AlgorithmRunResult, Error> {
    let started = Instant::now();
    algorithm.start(graph, start, end)?;

    let mut steps = 0;
    let (outcome, path) = loop {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            break (SearchOutcome::Cancelled, Vec::new());
        }
        if steps >= max_steps {
            warn!(
                "{} stopped at the step limit ({max_steps}) before finishing",
                algorithm.kind()
            );
            break (SearchOutcome::StepLimit, Vec::new());
        }
        steps += 1;
        if let Step::Done { path, .. } = algorithm.next_step(graph) {
            let outcome = if path.is_empty() {
                SearchOutcome::NoPath
            } else {
                SearchOutcome::Found
            };
            break (outcome, path);
        }
    };

    let result = AlgorithmRunResult {
        kind: algorithm.kind(),
        start,
        end,
        distance_m: graph.path_distance(&path),
        success: outcome == SearchOutcome::Found,
        path,
        steps,
        nodes_explored: algorithm.nodes_explored(),
        elapsed: started.elapsed(),
        outcome,
    };
    debug!(
        "{} finished in {:?}: {:?} after {} steps, {} nodes explored",
        result.kind, result.elapsed, result.outcome, result.steps, result.nodes_explored
    );
    Ok(result)
}
