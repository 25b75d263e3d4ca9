//! Builds a [`RoadGraph`](crate::RoadGraph) from raw map elements.
//!
//! Elements follow the Overpass JSON shape: points (`node`) carry an id and a
//! coordinate, lines (`way`) carry an ordered list of node ids and tags.

mod builder;
mod config;
mod elements;

pub use builder::{BuildReport, build_road_graph};
pub use config::LoaderConfig;
pub use elements::{MapElement, parse_elements};
