use geo::{Coord, LineString};
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use petgraph::graph::NodeIndex;
use serde_json::json;

use super::{Segment, Timeline};
use crate::{Error, RoadGraph};

impl Timeline {
    /// Exports every segment as a `LineString` feature carrying its kind and
    /// time window.
    pub fn to_geojson(&self) -> Result<FeatureCollection, Error> {
        let features = self
            .segments()
            .iter()
            .enumerate()
            .map(|(index, segment)| segment_feature(index, segment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureCollection {
            features,
            bbox: None,
            foreign_members: None,
        })
    }

    pub fn to_geojson_string(&self) -> Result<String, Error> {
        serde_json::to_string(&self.to_geojson()?).map_err(|e| Error::GeoJsonError(e.to_string()))
    }
}

fn segment_feature(index: usize, segment: &Segment) -> Result<Feature, Error> {
    let line = LineString::new(vec![segment.from.into(), segment.to.into()]);
    let geometry = Geometry::new(GeoJsonValue::from(&line));

    let value = json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "index": index,
            "kind": segment.kind.as_str(),
            "start_time": segment.start_time,
            "end_time": segment.end_time,
            "from_id": segment.from_id,
            "to_id": segment.to_id,
        }
    });

    Feature::from_json_value(value).map_err(|e| Error::GeoJsonError(e.to_string()))
}

/// Single `LineString` feature following `path` through the graph
pub fn path_to_geojson(graph: &RoadGraph, path: &[NodeIndex]) -> Result<Feature, Error> {
    let coords = path
        .iter()
        .map(|&index| graph.try_node(index).map(|node| Coord::from(node.geometry)))
        .collect::<Result<Vec<_>, _>>()?;
    let geometry = Geometry::new(GeoJsonValue::from(&LineString::new(coords)));

    let value = json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {
            "nodes": path.len(),
            "distance_m": graph.path_distance(path),
        }
    });

    Feature::from_json_value(value).map_err(|e| Error::GeoJsonError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        replay::{ExecutorConfig, StepExecutor},
        routing::{AlgorithmKind, algorithms::fixtures, create_algorithm},
    };

    #[test]
    fn timeline_exports_one_feature_per_segment() {
        let (mut graph, nodes) = fixtures::grid(3);
        let mut executor = StepExecutor::new(ExecutorConfig::default());
        executor
            .start(create_algorithm(AlgorithmKind::AStar), &mut graph, nodes[0], nodes[8])
            .unwrap();
        executor.run_to_end(&mut graph);

        let collection = executor.timeline().to_geojson().unwrap();
        assert_eq!(collection.features.len(), executor.timeline().len());
        let last = collection.features.last().unwrap();
        assert_eq!(
            last.property("kind").and_then(|v| v.as_str()),
            Some("route")
        );
        assert!(executor.timeline().to_geojson_string().unwrap().contains("FeatureCollection"));
    }

    #[test]
    fn path_feature_has_all_nodes() {
        let (graph, nodes) = fixtures::grid(3);
        let path = vec![nodes[0], nodes[1], nodes[2]];
        let feature = path_to_geojson(&graph, &path).unwrap();
        match feature.geometry.map(|g| g.value) {
            Some(GeoJsonValue::LineString(coords)) => assert_eq!(coords.len(), 3),
            other => panic!("unexpected geometry {other:?}"),
        }
        assert!(path_to_geojson(&graph, &[NodeIndex::new(50)]).is_err());
    }
}
