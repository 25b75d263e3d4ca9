use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{Error, OsmNodeId};

/// Raw map element as produced by an Overpass query
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MapElement {
    Node {
        id: OsmNodeId,
        lat: f64,
        lon: f64,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: i64,
        #[serde(default)]
        nodes: Vec<OsmNodeId>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    /// Relations, areas and anything else the graph does not use
    #[serde(other)]
    Other,
}

impl MapElement {
    pub fn node(id: OsmNodeId, lat: f64, lon: f64) -> Self {
        MapElement::Node {
            id,
            lat,
            lon,
            tags: BTreeMap::new(),
        }
    }

    /// Way tagged with `highway=<highway>`
    pub fn way(id: i64, nodes: Vec<OsmNodeId>, highway: &str) -> Self {
        MapElement::Way {
            id,
            nodes,
            tags: BTreeMap::from([("highway".to_string(), highway.to_string())]),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ElementsDocument {
    Envelope { elements: Vec<MapElement> },
    Bare(Vec<MapElement>),
}

/// Parses either a full Overpass response (`{"elements": [...]}`) or a bare
/// element array.
///
/// # Errors
///
/// Returns [`Error::Json`] when the input is not valid JSON of either shape.
pub fn parse_elements(json: &str) -> Result<Vec<MapElement>, Error> {
    let document: ElementsDocument = serde_json::from_str(json)?;
    Ok(match document {
        ElementsDocument::Envelope { elements } | ElementsDocument::Bare(elements) => elements,
    })
}
