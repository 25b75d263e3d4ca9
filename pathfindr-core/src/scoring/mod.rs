//! Rates a hand-drawn route by how much of the optimal route it covers.

use geo::Point;
use itertools::Itertools;
use log::{debug, warn};
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{
    RoadGraph,
    model::{geo_distance, planar_distance},
};

/// Player-placed point along their intended route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
}

impl Waypoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn point(self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

impl From<Point<f64>> for Waypoint {
    fn from(point: Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// A waypoint hits an optimal node within this many degrees (about 100 m)
    pub hit_threshold_deg: f64,
    pub max_granularity_bonus: f64,
    /// Hop cap when walking the optimal route back from the end node
    pub max_path_steps: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hit_threshold_deg: 0.001,
            max_granularity_bonus: 10.0,
            max_path_steps: 1_000,
        }
    }
}

/// Why a score was not computed from coverage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNote {
    MissingWaypoints,
    PathNotFound,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub efficiency: f64,
    pub coverage_efficiency: f64,
    pub granularity_bonus: f64,
    pub nodes_hit: usize,
    pub optimal_nodes: usize,
    pub waypoints: usize,
    pub optimal_distance_m: f64,
    pub note: Option<ScoreNote>,
}

impl ScoreResult {
    fn empty(note: ScoreNote) -> Self {
        Self {
            efficiency: 0.0,
            coverage_efficiency: 0.0,
            granularity_bonus: 0.0,
            nodes_hit: 0,
            optimal_nodes: 0,
            waypoints: 0,
            optimal_distance_m: 0.0,
            note: Some(note),
        }
    }

    /// Letter grade: S from 90, then A, B, C, D in steps of ten, F below 50
    pub fn grade(&self) -> &'static str {
        match self.efficiency {
            e if e >= 90.0 => "S",
            e if e >= 80.0 => "A",
            e if e >= 70.0 => "B",
            e if e >= 60.0 => "C",
            e if e >= 50.0 => "D",
            _ => "F",
        }
    }

    /// True when every percentage lies in its allowed range
    pub fn is_valid(&self, config: &ScoringConfig) -> bool {
        (0.0..=100.0).contains(&self.efficiency)
            && (0.0..=100.0).contains(&self.coverage_efficiency)
            && (0.0..=config.max_granularity_bonus).contains(&self.granularity_bonus)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Scores `waypoints` against the route ending at `end`, read from the
    /// `referer` chain left by a finished search.
    pub fn calculate_score(
        &self,
        graph: &RoadGraph,
        waypoints: &[Waypoint],
        end: NodeIndex,
    ) -> ScoreResult {
        if waypoints.is_empty() {
            return ScoreResult::empty(ScoreNote::MissingWaypoints);
        }
        let path = self.optimal_path(graph, end);
        self.score_path(graph, waypoints, &path)
    }

    /// Scores `waypoints` against an explicit route.
    pub fn score_path(
        &self,
        graph: &RoadGraph,
        waypoints: &[Waypoint],
        path: &[NodeIndex],
    ) -> ScoreResult {
        if waypoints.is_empty() {
            return ScoreResult::empty(ScoreNote::MissingWaypoints);
        }
        let points: Vec<Point<f64>> = path
            .iter()
            .filter_map(|&index| graph.node(index).map(|node| node.geometry))
            .collect();
        if points.len() < 2 {
            return ScoreResult {
                efficiency: 100.0,
                coverage_efficiency: 100.0,
                waypoints: waypoints.len(),
                optimal_nodes: points.len(),
                note: Some(ScoreNote::PathNotFound),
                ..ScoreResult::empty(ScoreNote::PathNotFound)
            };
        }

        let nodes_hit = points
            .iter()
            .filter(|&&node| {
                waypoints
                    .iter()
                    .any(|w| planar_distance(node, w.point()) <= self.config.hit_threshold_deg)
            })
            .count();

        #[allow(clippy::cast_precision_loss)]
        let (coverage_efficiency, granularity_bonus) = (
            nodes_hit as f64 / points.len() as f64 * 100.0,
            (waypoints.len() as f64 / 2.0).min(self.config.max_granularity_bonus),
        );
        let efficiency = (coverage_efficiency + granularity_bonus).min(100.0);
        let optimal_distance_m: f64 = points
            .iter()
            .tuple_windows()
            .map(|(&a, &b)| geo_distance(a, b))
            .sum();

        debug!(
            "Score: {nodes_hit}/{} nodes hit, coverage {coverage_efficiency:.1}%, \
             bonus {granularity_bonus:.1}%, efficiency {efficiency:.1}%",
            points.len()
        );

        ScoreResult {
            efficiency,
            coverage_efficiency,
            granularity_bonus,
            nodes_hit,
            optimal_nodes: points.len(),
            waypoints: waypoints.len(),
            optimal_distance_m,
            note: None,
        }
    }

    /// Walks `referer` back from `end` for at most `max_path_steps` hops.
    /// A chain cut by the cap is returned as far as it was walked.
    fn optimal_path(&self, graph: &RoadGraph, end: NodeIndex) -> Vec<NodeIndex> {
        let Some(mut current) = graph.node(end) else {
            return Vec::new();
        };
        let mut path = vec![end];
        while let Some(parent) = current.referer {
            if path.len() > self.config.max_path_steps {
                warn!(
                    "Optimal route walk stopped after {} hops; scoring the partial route",
                    self.config.max_path_steps
                );
                break;
            }
            let Some(node) = graph.node(parent) else {
                break;
            };
            path.push(parent);
            current = node;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{AStar, algorithms::fixtures};

    fn solved_grid() -> (RoadGraph, Vec<NodeIndex>, Vec<NodeIndex>) {
        let (mut graph, nodes) = fixtures::grid(5);
        let mut astar = AStar::new();
        let (path, _) = fixtures::run_to_end(&mut astar, &mut graph, nodes[0], nodes[24]);
        (graph, nodes, path)
    }

    fn waypoints_on(graph: &RoadGraph, path: &[NodeIndex]) -> Vec<Waypoint> {
        path.iter()
            .map(|&index| Waypoint::from(graph.node(index).unwrap().geometry))
            .collect()
    }

    #[test]
    fn waypoints_on_the_route_score_full_marks() {
        let (graph, nodes, path) = solved_grid();
        let waypoints = waypoints_on(&graph, &path);
        let score = ScoringEngine::default().calculate_score(&graph, &waypoints, nodes[24]);
        assert_eq!(score.coverage_efficiency, 100.0);
        assert_eq!(score.efficiency, 100.0);
        assert_eq!(score.nodes_hit, path.len());
        assert_eq!(score.optimal_nodes, path.len());
        assert!(score.optimal_distance_m > 0.0);
        assert_eq!(score.note, None);
        assert_eq!(score.grade(), "S");
    }

    #[test]
    fn no_waypoints_scores_zero() {
        let (graph, nodes, _) = solved_grid();
        let score = ScoringEngine::default().calculate_score(&graph, &[], nodes[24]);
        assert_eq!(score.efficiency, 0.0);
        assert_eq!(score.coverage_efficiency, 0.0);
        assert_eq!(score.granularity_bonus, 0.0);
        assert_eq!(score.note, Some(ScoreNote::MissingWaypoints));
        assert_eq!(score.grade(), "F");
    }

    #[test]
    fn missing_route_scores_full_with_note() {
        let (graph, nodes) = fixtures::grid(3);
        let waypoints = [Waypoint::new(52.520_1, 13.405_1)];
        let score = ScoringEngine::default().calculate_score(&graph, &waypoints, nodes[8]);
        assert_eq!(score.efficiency, 100.0);
        assert_eq!(score.note, Some(ScoreNote::PathNotFound));
        assert_eq!(score.waypoints, 1);
    }

    #[test]
    fn partial_coverage_adds_granularity_bonus() {
        let (graph, nodes, path) = solved_grid();
        let mut waypoints = waypoints_on(&graph, &path[..3]);
        waypoints.push(Waypoint::new(0.0, 0.0));
        let score = ScoringEngine::default().calculate_score(&graph, &waypoints, nodes[24]);

        let expected_coverage = 3.0 / path.len() as f64 * 100.0;
        assert!((score.coverage_efficiency - expected_coverage).abs() < 1e-9);
        assert_eq!(score.granularity_bonus, 2.0);
        assert!((score.efficiency - (expected_coverage + 2.0).min(100.0)).abs() < 1e-9);
        assert!(score.is_valid(ScoringEngine::default().config()));
    }

    #[test]
    fn granularity_bonus_is_capped() {
        let (graph, nodes, path) = solved_grid();
        let mut waypoints = vec![Waypoint::new(0.0, 0.0); 40];
        waypoints.extend(waypoints_on(&graph, &path[..1]));
        let score = ScoringEngine::default().calculate_score(&graph, &waypoints, nodes[24]);
        assert_eq!(score.granularity_bonus, 10.0);
        assert!(score.efficiency <= 100.0);
    }

    #[test]
    fn capped_route_walk_scores_the_partial_route() {
        let (graph, nodes, path) = solved_grid();
        assert_eq!(path.len(), 9);
        let engine = ScoringEngine::new(ScoringConfig {
            max_path_steps: 3,
            ..ScoringConfig::default()
        });
        let waypoints = waypoints_on(&graph, &path);
        let score = engine.calculate_score(&graph, &waypoints, nodes[24]);

        assert_eq!(score.note, None);
        assert_eq!(score.optimal_nodes, 4);
        assert_eq!(score.nodes_hit, 4);
        assert_eq!(score.coverage_efficiency, 100.0);
        assert!(score.optimal_distance_m > 0.0);
    }

    #[test]
    fn grades_follow_thresholds() {
        let mut score = ScoreResult::empty(ScoreNote::MissingWaypoints);
        for (efficiency, grade) in [(95.0, "S"), (85.0, "A"), (70.0, "B"), (65.0, "C"), (50.0, "D"), (10.0, "F")] {
            score.efficiency = efficiency;
            assert_eq!(score.grade(), grade);
        }
    }
}
