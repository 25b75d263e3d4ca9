//! HTTP handlers over the search core.
//!
//! The loaded graph is shared read-only; every search works on its own clone
//! inside a blocking task.

use std::{
    sync::{Arc, RwLock},
    time::Instant,
};

use axum::{
    BoxError, Json, Router,
    error_handling::HandleErrorLayer,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use geo::Point;
use pathfindr_core::{
    model::GraphStats,
    prelude::*,
    replay::path_to_geojson,
    routing::{AlgorithmComparison, run_to_completion},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::ServerConfig;

pub struct AppState {
    config: ServerConfig,
    graph: RwLock<Option<LoadedGraph>>,
}

#[derive(Clone)]
struct LoadedGraph {
    graph: Arc<RoadGraph>,
    report: BuildReport,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            graph: RwLock::new(None),
        }
    }

    /// Replaces the served graph.
    ///
    /// # Errors
    ///
    /// Returns [`pathfindr_core::Error::NoRoadData`] when the elements hold no
    /// usable road.
    pub fn load_elements(&self, elements: &[MapElement]) -> Result<BuildReport, ApiError> {
        let (graph, report) = build_road_graph(elements, &self.config.loader)?;
        if graph.is_empty() || graph.edge_count() == 0 {
            return Err(pathfindr_core::Error::NoRoadData.into());
        }
        let loaded = LoadedGraph {
            graph: Arc::new(graph),
            report,
        };
        *self.graph.write().map_err(|_| ApiError::Poisoned)? = Some(loaded);
        Ok(report)
    }

    fn loaded(&self) -> Result<LoadedGraph, ApiError> {
        self.graph
            .read()
            .map_err(|_| ApiError::Poisoned)?
            .clone()
            .ok_or(ApiError::NoGraph)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No road graph loaded")]
    NoGraph,
    #[error(transparent)]
    Core(#[from] pathfindr_core::Error),
    #[error("Graph lock poisoned")]
    Poisoned,
    #[error("Search task failed: {0}")]
    Worker(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        use pathfindr_core::Error as Core;
        match self {
            ApiError::NoGraph => StatusCode::NOT_FOUND,
            ApiError::Core(Core::NodeNotFound(_) | Core::InvalidNodeIndex | Core::NoPointsFound) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Core(
                Core::NoRoadData
                | Core::PrecisionLoss { .. }
                | Core::InvalidData(_)
                | Core::Json(_)
                | Core::UnknownAlgorithm(_),
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Core(_) | ApiError::Poisoned | ApiError::Worker(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {self}");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let timeout = state.config.http.request_timeout();
    let concurrency = state.config.http.max_concurrent_requests.max(1);

    Router::new()
        .route("/health", get(health))
        .route("/graph", get(graph_info).post(load_graph))
        .route("/search", post(search))
        .route("/compare", post(compare))
        .route("/score", post(score))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_layer_error))
                .timeout(timeout)
                .concurrency_limit(concurrency),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn handle_layer_error(err: BoxError) -> (StatusCode, Json<ErrorResponse>) {
    let status = if err.is::<tower::timeout::error::Elapsed>() {
        StatusCode::REQUEST_TIMEOUT
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ErrorResponse { error: err.to_string() }))
}

/// Runs CPU-bound work off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))?
}

// ============ Graph ============

#[derive(Debug, Serialize)]
pub struct GraphResponse {
    pub stats: GraphStats,
    pub report: BuildReport,
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn graph_info(State(state): State<Arc<AppState>>) -> Result<Json<GraphResponse>, ApiError> {
    let loaded = state.loaded()?;
    Ok(Json(GraphResponse {
        stats: loaded.graph.stats(),
        report: loaded.report,
    }))
}

async fn load_graph(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<GraphResponse>, ApiError> {
    let worker_state = Arc::clone(&state);
    blocking(move || {
        let elements = parse_elements(&body)?;
        worker_state.load_elements(&elements)
    })
    .await?;

    let loaded = state.loaded()?;
    info!(
        "Loaded road graph with {} nodes and {} edges",
        loaded.graph.node_count(),
        loaded.graph.edge_count()
    );
    Ok(Json(GraphResponse {
        stats: loaded.graph.stats(),
        report: loaded.report,
    }))
}

// ============ Search ============

/// Query endpoint, either a node id or a coordinate snapped to the nearest node
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Node { id: OsmNodeId },
    Coordinate { lat: f64, lon: f64 },
}

impl Endpoint {
    fn resolve(self, graph: &RoadGraph) -> Result<NodeIndex, ApiError> {
        let index = match self {
            Endpoint::Node { id } => graph
                .index_of(id)
                .ok_or(pathfindr_core::Error::NodeNotFound(id))?,
            Endpoint::Coordinate { lat, lon } => graph
                .find_nearest_node(Point::new(lon, lat))
                .ok_or(pathfindr_core::Error::NoPointsFound)?,
        };
        Ok(index)
    }
}

fn default_algorithm() -> AlgorithmKind {
    AlgorithmKind::AStar
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default = "default_algorithm")]
    pub algorithm: AlgorithmKind,
    pub start: Endpoint,
    pub end: Endpoint,
    /// Record the exploration and route as a timeline
    #[serde(default)]
    pub replay: bool,
    /// Attach GeoJSON for the route and, with `replay`, every segment
    #[serde(default)]
    pub geojson: bool,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub algorithm: AlgorithmKind,
    pub outcome: SearchOutcome,
    pub success: bool,
    pub steps: usize,
    pub nodes_explored: usize,
    pub distance_m: f64,
    pub elapsed_ms: f64,
    pub path: Vec<OsmNodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_geojson: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ReplayResponse {
    pub total_duration: f64,
    pub rejected_segments: usize,
    pub segments: Vec<SegmentDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geojson: Option<Value>,
}

/// Timeline segment with `[lon, lat]` endpoints
#[derive(Debug, Serialize)]
pub struct SegmentDto {
    pub kind: SegmentKind,
    pub from: [f64; 2],
    pub to: [f64; 2],
    pub start_time: f64,
    pub end_time: f64,
    pub from_id: Option<OsmNodeId>,
    pub to_id: Option<OsmNodeId>,
}

impl ReplayResponse {
    fn from_timeline(timeline: &Timeline, geojson: bool) -> Result<Self, ApiError> {
        let segments = timeline
            .segments()
            .iter()
            .map(|s| SegmentDto {
                kind: s.kind,
                from: [s.from.x(), s.from.y()],
                to: [s.to.x(), s.to.y()],
                start_time: s.start_time,
                end_time: s.end_time,
                from_id: s.from_id,
                to_id: s.to_id,
            })
            .collect();
        let geojson = if geojson {
            Some(to_json_value(&timeline.to_geojson()?)?)
        } else {
            None
        };
        Ok(Self {
            total_duration: timeline.total_duration(),
            rejected_segments: timeline.rejected_segments(),
            segments,
            geojson,
        })
    }
}

fn to_json_value<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| pathfindr_core::Error::from(e).into())
}

fn elapsed_ms(result: &AlgorithmRunResult) -> f64 {
    result.elapsed.as_secs_f64() * 1_000.0
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let loaded = state.loaded()?;
    let config = state.config.executor;

    let response = blocking(move || {
        let mut graph = RoadGraph::clone(&loaded.graph);
        let start = request.start.resolve(&graph)?;
        let end = request.end.resolve(&graph)?;
        let mut executor = StepExecutor::new(config);

        let (result, replay) = if request.replay {
            let started = Instant::now();
            executor.start(create_algorithm(request.algorithm), &mut graph, start, end)?;
            executor.run_to_end(&mut graph);
            let outcome = executor.outcome().unwrap_or(SearchOutcome::Cancelled);
            let path = executor.path().to_vec();
            let result = AlgorithmRunResult {
                kind: request.algorithm,
                start,
                end,
                distance_m: graph.path_distance(&path),
                success: outcome == SearchOutcome::Found,
                nodes_explored: executor
                    .algorithm()
                    .map_or(0, |algorithm| algorithm.nodes_explored()),
                steps: executor.steps(),
                elapsed: started.elapsed(),
                path,
                outcome,
            };
            let replay = ReplayResponse::from_timeline(executor.timeline(), request.geojson)?;
            (result, Some(replay))
        } else {
            let mut algorithm = create_algorithm(request.algorithm);
            let result = executor.execute_instant(algorithm.as_mut(), &mut graph, start, end)?;
            (result, None)
        };

        let route_geojson = if request.geojson && result.success {
            Some(to_json_value(&path_to_geojson(&graph, &result.path)?)?)
        } else {
            None
        };

        Ok(SearchResponse {
            algorithm: result.kind,
            outcome: result.outcome,
            success: result.success,
            steps: result.steps,
            nodes_explored: result.nodes_explored,
            distance_m: result.distance_m,
            elapsed_ms: elapsed_ms(&result),
            path: result.path_ids(&graph),
            replay,
            route_geojson,
        })
    })
    .await?;

    Ok(Json(response))
}

// ============ Compare ============

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub start: Endpoint,
    pub end: Endpoint,
}

#[derive(Debug, Serialize)]
pub struct ComparisonDto {
    pub algorithm: AlgorithmKind,
    pub outcome: SearchOutcome,
    pub steps: usize,
    pub nodes_explored: usize,
    pub distance_m: f64,
    pub path_cost: Option<f64>,
    pub relative_cost: Option<f64>,
    pub elapsed_ms: f64,
}

impl From<&AlgorithmComparison> for ComparisonDto {
    fn from(comparison: &AlgorithmComparison) -> Self {
        let result = &comparison.result;
        Self {
            algorithm: result.kind,
            outcome: result.outcome,
            steps: result.steps,
            nodes_explored: result.nodes_explored,
            distance_m: result.distance_m,
            path_cost: comparison.path_cost,
            relative_cost: comparison.relative_cost,
            elapsed_ms: elapsed_ms(result),
        }
    }
}

async fn compare(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<Vec<ComparisonDto>>, ApiError> {
    let loaded = state.loaded()?;
    let max_steps = state.config.executor.instant_max_steps;

    let comparisons = blocking(move || {
        let start = request.start.resolve(&loaded.graph)?;
        let end = request.end.resolve(&loaded.graph)?;
        let comparisons = compare_algorithms(&loaded.graph, start, end, max_steps)?;
        Ok(comparisons.iter().map(ComparisonDto::from).collect::<Vec<_>>())
    })
    .await?;

    Ok(Json(comparisons))
}

// ============ Score ============

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(default = "default_algorithm")]
    pub algorithm: AlgorithmKind,
    pub start: Endpoint,
    pub end: Endpoint,
    pub waypoints: Vec<Waypoint>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    #[serde(flatten)]
    pub score: ScoreResult,
    pub grade: &'static str,
    pub optimal_path: Vec<OsmNodeId>,
}

async fn score(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let loaded = state.loaded()?;
    let executor = state.config.executor;
    let engine = ScoringEngine::new(state.config.scoring);

    let response = blocking(move || {
        let mut graph = RoadGraph::clone(&loaded.graph);
        let start = request.start.resolve(&graph)?;
        let end = request.end.resolve(&graph)?;
        let mut algorithm = create_algorithm(request.algorithm);
        let result = run_to_completion(
            algorithm.as_mut(),
            &mut graph,
            start,
            end,
            executor.instant_max_steps,
            None,
        )?;

        let score = engine.score_path(&graph, &request.waypoints, &result.path);
        Ok(ScoreResponse {
            grade: score.grade(),
            score,
            optimal_path: result.path_ids(&graph),
        })
    })
    .await?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    const LAT: f64 = 41.387_917;
    const LON: f64 = 2.169_919;
    const STEP: f64 = 0.001_2;

    fn grid_document(size: i64) -> Value {
        let mut elements = Vec::new();
        for row in 0..size {
            for col in 0..size {
                #[allow(clippy::cast_precision_loss)]
                elements.push(json!({
                    "type": "node",
                    "id": row * size + col + 1,
                    "lat": LAT + row as f64 * STEP,
                    "lon": LON + col as f64 * STEP,
                }));
            }
            let ids: Vec<i64> = (0..size).map(|col| row * size + col + 1).collect();
            elements.push(json!({"type": "way", "id": 500 + row, "nodes": ids, "tags": {"highway": "residential"}}));
        }
        for col in 0..size {
            let ids: Vec<i64> = (0..size).map(|row| row * size + col + 1).collect();
            elements.push(json!({"type": "way", "id": 600 + col, "nodes": ids, "tags": {"highway": "secondary"}}));
        }
        json!({ "version": 0.6, "elements": elements })
    }

    fn loaded_state() -> Arc<AppState> {
        let state = AppState::new(ServerConfig::default());
        let elements = parse_elements(&grid_document(4).to_string()).unwrap();
        state.load_elements(&elements).unwrap();
        Arc::new(state)
    }

    async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let router = build_router(Arc::new(AppState::new(ServerConfig::default())));
        let (status, body) = send(router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn graph_is_missing_until_loaded() {
        let state = Arc::new(AppState::new(ServerConfig::default()));
        let (status, body) = send(build_router(Arc::clone(&state)), "GET", "/graph", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No road graph loaded");

        let (status, body) =
            send(build_router(Arc::clone(&state)), "POST", "/graph", Some(grid_document(3))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["node_count"], 9);
        assert_eq!(body["report"]["ways_used"], 6);

        let (status, body) = send(build_router(state), "GET", "/graph", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["edge_count"], 12);
    }

    #[tokio::test]
    async fn roadless_document_is_rejected() {
        let router = build_router(Arc::new(AppState::new(ServerConfig::default())));
        let document = json!({"elements": [{"type": "node", "id": 1, "lat": LAT, "lon": LON}]});
        let (status, _) = send(router, "POST", "/graph", Some(document)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn instant_search_by_node_ids() {
        let router = build_router(loaded_state());
        let request = json!({"algorithm": "dijkstra", "start": {"id": 1}, "end": {"id": 16}});
        let (status, body) = send(router, "POST", "/search", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "found");
        assert_eq!(body["success"], true);
        assert_eq!(body["path"].as_array().unwrap().len(), 7);
        assert_eq!(body["path"][0], 1);
        assert_eq!(body["path"][6], 16);
        assert!(body.get("replay").is_none());
    }

    #[tokio::test]
    async fn replay_search_by_coordinates() {
        let router = build_router(loaded_state());
        let request = json!({
            "algorithm": "bidirectional",
            "start": {"lat": LAT + 0.000_1, "lon": LON - 0.000_1},
            "end": {"lat": LAT + 3.0 * STEP, "lon": LON + 3.0 * STEP},
            "replay": true,
            "geojson": true,
        });
        let (status, body) = send(router, "POST", "/search", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["algorithm"], "bidirectional");
        assert!(body["elapsed_ms"].as_f64().unwrap() > 0.0);

        let segments = body["replay"]["segments"].as_array().unwrap();
        let routes = segments.iter().filter(|s| s["kind"] == "route").count();
        let path = body["path"].as_array().unwrap();
        assert!(path.len() >= 7);
        assert_eq!(routes, path.len() - 1);
        assert_eq!(path[0], 1);
        assert_eq!(path[path.len() - 1], 16);
        assert!(body["replay"]["total_duration"].as_f64().unwrap() > 0.0);
        assert_eq!(body["replay"]["geojson"]["type"], "FeatureCollection");
        assert_eq!(body["route_geojson"]["geometry"]["type"], "LineString");
    }

    #[tokio::test]
    async fn unknown_node_is_not_found() {
        let router = build_router(loaded_state());
        let request = json!({"start": {"id": 1}, "end": {"id": 999}});
        let (status, body) = send(router, "POST", "/search", Some(request)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("999"));
    }

    #[tokio::test]
    async fn compare_returns_every_algorithm() {
        let router = build_router(loaded_state());
        let request = json!({"start": {"id": 4}, "end": {"id": 13}});
        let (status, body) = send(router, "POST", "/compare", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|row| row["outcome"] == "found"));
        assert!(rows.iter().all(|row| row["relative_cost"].as_f64().unwrap() >= 1.0 - 1e-9));
    }

    #[tokio::test]
    async fn waypoints_on_the_route_score_full_marks() {
        let state = loaded_state();
        let search = json!({"algorithm": "astar", "start": {"id": 1}, "end": {"id": 16}});
        let (_, found) = send(build_router(Arc::clone(&state)), "POST", "/search", Some(search)).await;

        let waypoints: Vec<Value> = found["path"]
            .as_array()
            .unwrap()
            .iter()
            .map(|id| {
                let id = id.as_i64().unwrap() - 1;
                #[allow(clippy::cast_precision_loss)]
                let (row, col) = ((id / 4) as f64, (id % 4) as f64);
                json!({"lat": LAT + row * STEP, "lon": LON + col * STEP})
            })
            .collect();
        let request = json!({"start": {"id": 1}, "end": {"id": 16}, "waypoints": waypoints});
        let (status, body) = send(build_router(state), "POST", "/score", Some(request)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["efficiency"], 100.0);
        assert_eq!(body["grade"], "S");
        assert_eq!(body["optimal_path"].as_array().unwrap().len(), 7);
    }
}
