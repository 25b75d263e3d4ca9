#![allow(dead_code)]

use pathfindr_core::prelude::*;

/// Overpass-shaped grid of `size`x`size` nodes joined by residential ways,
/// one way per row and one per column.
pub fn grid_elements(size: i64) -> Vec<MapElement> {
    let mut elements = Vec::new();
    for row in 0..size {
        for col in 0..size {
            #[allow(clippy::cast_precision_loss)]
            elements.push(MapElement::node(
                row * size + col + 1,
                40.712_776 + row as f64 * 0.001_3,
                -74.005_974 + col as f64 * 0.001_7,
            ));
        }
    }
    let mut way_id = 1_000;
    for row in 0..size {
        way_id += 1;
        let ids = (0..size).map(|col| row * size + col + 1).collect();
        elements.push(MapElement::way(way_id, ids, "residential"));
    }
    for col in 0..size {
        way_id += 1;
        let ids = (0..size).map(|row| row * size + col + 1).collect();
        elements.push(MapElement::way(way_id, ids, "tertiary"));
    }
    elements
}

pub fn grid_graph(size: i64) -> RoadGraph {
    let (graph, _) = build_road_graph(&grid_elements(size), &LoaderConfig::default())
        .expect("grid builds");
    graph
}

/// Index of the node with external id `id`
pub fn idx(graph: &RoadGraph, id: OsmNodeId) -> NodeIndex {
    graph.index_of(id).expect("node exists")
}
