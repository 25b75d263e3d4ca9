//! Road network components - nodes, edges, and road classes

use std::fmt;
use std::str::FromStr;

use geo::Point;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::{Cost, OsmNodeId};

/// Position of an edge in [`RoadGraph::edges`](super::RoadGraph::edges).
pub type EdgeId = usize;

/// Road graph node together with its per-run search state
#[derive(Debug, Clone)]
pub struct RoadNode {
    /// OSM ID of the node
    pub id: OsmNodeId,
    /// Node coordinates (x = longitude, y = latitude), never rounded
    pub geometry: Point<f64>,
    /// Accumulated cost from the start node (g), infinite when unreached
    pub distance_from_start: Cost,
    /// Heuristic estimate of the remaining cost (h)
    pub distance_to_end: Cost,
    pub visited: bool,
    /// Predecessor on the best-known path
    pub referer: Option<NodeIndex>,
    pub(crate) touched: bool,
}

impl RoadNode {
    pub fn new(id: OsmNodeId, geometry: Point<f64>) -> Self {
        Self {
            id,
            geometry,
            distance_from_start: Cost::INFINITY,
            distance_to_end: 0.0,
            visited: false,
            referer: None,
            touched: false,
        }
    }

    /// f-cost: g + h
    pub fn total_distance(&self) -> Cost {
        self.distance_from_start + self.distance_to_end
    }

    pub fn lon(&self) -> f64 {
        self.geometry.x()
    }

    pub fn lat(&self) -> f64 {
        self.geometry.y()
    }

    pub(crate) fn clear_search_state(&mut self) {
        self.distance_from_start = Cost::INFINITY;
        self.distance_to_end = 0.0;
        self.visited = false;
        self.referer = None;
        self.touched = false;
    }
}

/// Road segment between two nodes.
///
/// A bidirectional edge is stored once and traversed in both directions with
/// the same cost.
#[derive(Debug, Clone)]
pub struct RoadEdge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub cost: Cost,
    pub road_type: RoadType,
    pub bidirectional: bool,
    pub visited: bool,
}

impl RoadEdge {
    /// The endpoint opposite to `node`, if `node` is an endpoint at all.
    pub fn other_end(&self, node: NodeIndex) -> Option<NodeIndex> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }
}

/// Directed traversal stored in the petgraph adjacency, pointing at the
/// shared [`RoadEdge`] record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traversal {
    pub edge: EdgeId,
}

/// Road classes accepted when building a graph from map ways
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadType {
    Motorway,
    MotorwayLink,
    Trunk,
    TrunkLink,
    Primary,
    PrimaryLink,
    Secondary,
    SecondaryLink,
    Tertiary,
    TertiaryLink,
    Unclassified,
    Residential,
    LivingStreet,
    Service,
    /// Edges added programmatically without a map tag
    Unknown,
}

impl RoadType {
    pub fn as_str(self) -> &'static str {
        match self {
            RoadType::Motorway => "motorway",
            RoadType::MotorwayLink => "motorway_link",
            RoadType::Trunk => "trunk",
            RoadType::TrunkLink => "trunk_link",
            RoadType::Primary => "primary",
            RoadType::PrimaryLink => "primary_link",
            RoadType::Secondary => "secondary",
            RoadType::SecondaryLink => "secondary_link",
            RoadType::Tertiary => "tertiary",
            RoadType::TertiaryLink => "tertiary_link",
            RoadType::Unclassified => "unclassified",
            RoadType::Residential => "residential",
            RoadType::LivingStreet => "living_street",
            RoadType::Service => "service",
            RoadType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoadType {
    type Err = ();

    /// Parses an OSM `highway` value. Footways, tracks and other non-road
    /// classes are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let road_type = match s {
            "motorway" => RoadType::Motorway,
            "motorway_link" => RoadType::MotorwayLink,
            "trunk" => RoadType::Trunk,
            "trunk_link" => RoadType::TrunkLink,
            "primary" => RoadType::Primary,
            "primary_link" => RoadType::PrimaryLink,
            "secondary" => RoadType::Secondary,
            "secondary_link" => RoadType::SecondaryLink,
            "tertiary" => RoadType::Tertiary,
            "tertiary_link" => RoadType::TertiaryLink,
            "unclassified" => RoadType::Unclassified,
            "residential" => RoadType::Residential,
            "living_street" => RoadType::LivingStreet,
            "service" => RoadType::Service,
            _ => return Err(()),
        };
        Ok(road_type)
    }
}
