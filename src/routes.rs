use axum::{
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::{engine::PhishingEngine, error::AppError, types::*};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PhishingEngine>,
    pub prometheus: PrometheusHandle,
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .route("/feedback", post(feedback))
        .route("/models/info", get(models_info))
        .route("/metrics", get(metrics))
        .layer(cors)
        .with_state(state)
}

/// `*` anywhere in the list allows every origin. Unparseable origins are
/// skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {:?}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "PhishSense API is running" }))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        models_loaded: state.engine.models().models_loaded(),
    })
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, AppError> {
    metrics::counter!("analyze_requests_total").increment(1);
    info!("Received analysis request for {}", request.url);

    let response = state.engine.analyze(request).await?;
    Ok(Json(response))
}

async fn feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Json<FeedbackResponse> {
    info!(
        "Received feedback for {}: user says {}, system said {}",
        request.url, request.user_classification, request.system_classification
    );
    state.engine.submit_feedback(request);

    Json(FeedbackResponse {
        status: "success".to_string(),
        message: "Feedback received and will be processed".to_string(),
    })
}

async fn models_info(State(state): State<AppState>) -> Json<ModelsInfoResponse> {
    let models = state.engine.models();
    Json(ModelsInfoResponse {
        models: models.model_info(),
        last_updated: models.last_updated(),
    })
}

async fn metrics(State(state): State<AppState>) -> String {
    state.prometheus.render()
}
