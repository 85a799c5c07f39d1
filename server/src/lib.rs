use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use docsearch_core::{EngineConfig, EngineStats, IndexMetadata, SearchEngine, SearchOptions, SearchResponse};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub user: Option<String>,
    pub k: Option<usize>,
    #[serde(default = "default_true")]
    pub personalized: bool,
    #[serde(default = "default_true")]
    pub recommend: bool,
}
fn default_true() -> bool { true }

#[derive(Deserialize)]
pub struct SuggestParams {
    pub q: String,
}

#[derive(Serialize)]
pub struct TimedSearch {
    pub took_s: f64,
    #[serde(flatten)]
    pub response: SearchResponse,
}

type ApiError = (StatusCode, String);

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

/// The engine assumes one caller at a time; every handler takes this lock on the blocking pool.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<SearchEngine>>,
    pub admin_token: Option<String>,
}

pub fn build_app(config: EngineConfig) -> Result<Router> {
    let engine = SearchEngine::from_config(config)?;
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { engine: Arc::new(Mutex::new(engine)), admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/stats", get(stats_handler))
        .route("/suggest", get(suggest_handler))
        .route("/rebuild", post(rebuild_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run `f` against the locked engine on the blocking pool so rebuilds and file
/// reads never stall the async workers.
async fn with_engine<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut SearchEngine) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let joined = tokio::task::spawn_blocking(move || {
        let mut guard = engine.lock();
        f(&mut *guard)
    })
    .await;
    joined.map_err(|err| internal(err.into()))?.map_err(internal)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<TimedSearch>, ApiError> {
    let start = std::time::Instant::now();
    let opts = SearchOptions {
        user_id: params.user.filter(|u| !u.trim().is_empty()),
        limit: params.k.map(|k| k.clamp(1, 100)),
        personalized: params.personalized,
        include_recommendations: params.recommend,
    };
    let response = with_engine(&state, move |engine| engine.search(&params.q, &opts)).await?;
    Ok(Json(TimedSearch { took_s: start.elapsed().as_secs_f64(), response }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<EngineStats>, ApiError> {
    with_engine(&state, |engine| engine.stats()).await.map(Json)
}

pub async fn suggest_handler(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<Vec<String>>, ApiError> {
    with_engine(&state, move |engine| engine.suggest(&params.q)).await.map(Json)
}

async fn rebuild_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<IndexMetadata>, ApiError> {
    check_admin(state.admin_token.as_deref(), &headers)?;
    let meta = with_engine(&state, |engine| Ok(engine.rebuild()?.metadata.clone())).await?;
    tracing::info!(num_docs = meta.total_docs, "rebuilt via api");
    Ok(Json(meta))
}

/// Rebuilds are refused outright when no admin token is configured.
fn check_admin(expected: Option<&str>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        return Err((StatusCode::UNAUTHORIZED, "rebuild disabled: ADMIN_TOKEN not set".into()));
    };
    match headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()) {
        Some(token) if token == expected => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "invalid admin token".into())),
    }
}
