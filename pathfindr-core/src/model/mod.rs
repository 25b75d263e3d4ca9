//! Data model for road-network searches
//!
//! Contains the road graph, its nodes and edges, and geographic helpers.

pub mod geometry;
pub mod streets;

pub use geometry::{geo_distance, looks_rounded, planar_distance};
pub use streets::{EdgeId, GraphStats, RoadEdge, RoadGraph, RoadNode, RoadType, Traversal};
