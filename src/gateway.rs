use crate::cache::ModuleCache;
use crate::generator::ModuleGenerator;
use crate::model::QueryParams;
use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

pub const DEFAULT_MODEL: &str = "gpt-4";
const MODULE_CACHE_CONTROL: &str = "public, max-age=31536000";

const INDEX_HTML: &str = include_str!("../static/index.html");
const LLMS_TXT: &str = include_str!("../static/llms.txt");

pub struct AppState {
    pub cache: ModuleCache,
    pub generator: Arc<ModuleGenerator>,
}

/// Builds params from raw query pairs. Only the first value of a repeated
/// key counts, and an empty value counts as absent.
pub fn params_from_query(pairs: &[(String, String)]) -> QueryParams {
    let first = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };
    let model = first("model").unwrap_or_else(|| DEFAULT_MODEL.to_string());
    QueryParams::new(model, first("seed"))
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/llms.txt", get(handle_llms_txt))
        .route("/health", get(handle_health))
        .route("/esm/:prompt", get(handle_esm))
        .with_state(state)
}

/// `axum` has already percent-decoded the segment; a literal or encoded
/// `.js` suffix is dropped either way.
pub fn prompt_from_segment(segment: &str) -> &str {
    segment.strip_suffix(".js").unwrap_or(segment)
}

pub async fn handle_esm(
    State(state): State<Arc<AppState>>,
    segment: Result<Path<String>, PathRejection>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let start = Instant::now();
    let segment = match segment {
        Ok(Path(segment)) => segment,
        Err(e) => {
            error!(error = %e, "Undecodable module prompt");
            return generation_failed();
        }
    };
    let prompt = prompt_from_segment(&segment);
    let params = params_from_query(&query);

    // 1. Cache lookup
    if let Some(cached) = state.cache.get(prompt, &params).await {
        info!(model = %params.model, "Cache hit for module");
        return module_response(cached);
    }

    // 2. Generation
    let result = match state.generator.generate(prompt, &params).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, model = %params.model, "Module generation failed");
            return generation_failed();
        }
    };

    // 3. Cache write, outcome only logged
    state.cache.set(prompt, &params, &result.content).await;

    info!(
        "Module generated in {:?} Provider: {}",
        start.elapsed(),
        result.provider
    );
    module_response(result.content)
}

fn generation_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "Failed to generate module" })),
    )
        .into_response()
}

fn module_response(source: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, MODULE_CACHE_CONTROL),
        ],
        source,
    )
        .into_response()
}

pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn handle_llms_txt() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        LLMS_TXT,
    )
}
