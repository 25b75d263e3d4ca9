use geo::Point;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::{LoaderConfig, MapElement};
use crate::{
    Error, RoadGraph, RoadType,
    model::looks_rounded,
};

/// What happened while turning raw elements into a graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub nodes: usize,
    pub edges: usize,
    pub ways_used: usize,
    /// Ways without a recognized road type or with fewer than two members
    pub ways_skipped: usize,
    /// Consecutive way members where at least one node was never defined
    pub dangling_references: usize,
    /// Node coordinates carrying two decimals or fewer
    pub rounded_coordinates: usize,
}

impl BuildReport {
    /// True when every node looks truncated, the signature of a lossy upstream
    /// conversion rather than of real map data.
    pub fn has_precision_loss(&self) -> bool {
        self.nodes > 0 && self.rounded_coordinates == self.nodes
    }
}

/// Two-pass graph construction: every point becomes a node, then every road
/// way connects its consecutive members.
///
/// An empty or road-less element list yields an empty graph; callers should
/// check [`RoadGraph::is_empty`] before searching.
///
/// # Errors
///
/// Returns [`Error::PrecisionLoss`] when `config.reject_rounded_coordinates`
/// is set and every coordinate looks rounded.
pub fn build_road_graph(
    elements: &[MapElement],
    config: &LoaderConfig,
) -> Result<(RoadGraph, BuildReport), Error> {
    let mut graph = RoadGraph::new();
    let mut report = BuildReport::default();

    for element in elements {
        if let MapElement::Node { id, lat, lon, .. } = element {
            let point = Point::new(*lon, *lat);
            if looks_rounded(point) {
                report.rounded_coordinates += 1;
            }
            graph.add_node(*id, point);
        }
    }
    report.nodes = graph.node_count();
    debug!("Created {} nodes from {} elements", report.nodes, elements.len());

    if report.has_precision_loss() {
        error!(
            "All {} node coordinates are rounded to two decimals or fewer; \
             the map data has lost precision",
            report.nodes
        );
        if config.reject_rounded_coordinates {
            return Err(Error::PrecisionLoss {
                rounded: report.rounded_coordinates,
                total: report.nodes,
            });
        }
    }

    for element in elements {
        let MapElement::Way { nodes, tags, .. } = element else {
            continue;
        };
        let road_type = tags
            .get("highway")
            .and_then(|highway| highway.parse::<RoadType>().ok());
        let Some(road_type) = road_type.filter(|_| nodes.len() >= 2) else {
            report.ways_skipped += 1;
            continue;
        };
        report.ways_used += 1;

        let bidirectional = !(config.respect_oneway
            && tags.get("oneway").is_some_and(|value| value == "yes"));

        for pair in nodes.windows(2) {
            let (Some(a), Some(b)) = (graph.index_of(pair[0]), graph.index_of(pair[1])) else {
                report.dangling_references += 1;
                continue;
            };
            graph.add_edge(a, b, road_type, bidirectional);
        }
    }
    report.edges = graph.edge_count();

    if report.dangling_references > 0 {
        warn!(
            "{} way segments reference nodes missing from the element list",
            report.dangling_references
        );
    }
    info!(
        "Road graph built: {} nodes, {} edges ({} ways used, {} skipped)",
        report.nodes, report.edges, report.ways_used, report.ways_skipped
    );

    Ok((graph, report))
}
