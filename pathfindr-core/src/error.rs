use thiserror::Error;

use crate::OsmNodeId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No road data: the graph has no nodes")]
    NoRoadData,
    #[error("Node {0} not found in the road graph")]
    NodeNotFound(OsmNodeId),
    #[error("Invalid node index")]
    InvalidNodeIndex,
    #[error("No nearby points found for snapping")]
    NoPointsFound,
    #[error("Zero-length segment at ({lon:.8}, {lat:.8}), coordinate precision may be lost")]
    DegenerateSegment { lon: f64, lat: f64 },
    #[error("{rounded} of {total} node coordinates are rounded to 2 decimals or fewer")]
    PrecisionLoss { rounded: usize, total: usize },
    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("Background worker error: {0}")]
    BackgroundWorker(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
