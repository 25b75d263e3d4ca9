//! Road network model

pub mod components;
pub mod network;

pub use components::{EdgeId, RoadEdge, RoadNode, RoadType, Traversal};
pub use network::{GraphStats, RoadGraph};
