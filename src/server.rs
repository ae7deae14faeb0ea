//! HTTP Server - serves the dashboard page and its render API
//!
//! Endpoints:
//! - GET  /api/controls → Control registry (ids, domains, defaults)
//! - GET  /api/render   → Render of the default snapshot
//! - POST /api/render   → Render of the posted snapshot
//! - GET  /api/dataset  → Dataset summary
//! - GET  /healthz      → Liveness

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::controls::ControlSnapshot;
use crate::pipeline::Render;
use crate::state::AppState;

/// Build the router; split out so tests can drive it directly
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/controls", get(get_controls))
        .route("/render", get(get_default_render).post(post_render))
        .route("/dataset", get(get_dataset))
        .with_state(state.clone());

    let static_files = ServeDir::new(&state.config.web_dir);
    tracing::debug!("Static file serving from {:?}", state.config.web_dir);

    Router::new()
        .nest("/api", api)
        .route("/healthz", get(healthz))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the HTTP server
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    tracing::info!("Initializing HTTP server on port {}", port);
    let entities = state.dataset.entities().len();
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("Starting server on http://localhost:{}", port);
    tracing::info!("  API: http://localhost:{}/api/controls", port);
    tracing::info!("  Dashboard: http://localhost:{}/", port);
    tracing::info!("  Entities available: {}", entities);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server bound to {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /api/controls
async fn get_controls(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("GET /api/controls");
    Json((*state.registry).clone())
}

/// GET /api/dataset
async fn get_dataset(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("GET /api/dataset");
    Json(state.dataset.summary())
}

/// GET /api/render - initial page load
async fn get_default_render(State(state): State<AppState>) -> Response {
    tracing::info!("GET /api/render (defaults)");
    let snapshot = state.registry.default_snapshot();
    render_response(&state, snapshot).await
}

/// POST /api/render - one control change
async fn post_render(
    State(state): State<AppState>,
    payload: Result<Json<ControlSnapshot>, JsonRejection>,
) -> Response {
    let snapshot = match payload {
        Ok(Json(snapshot)) => snapshot,
        Err(rejection) => {
            tracing::warn!("Malformed snapshot rejected: {}", rejection.body_text());
            return reject(&state, rejection.body_text()).await;
        }
    };
    tracing::info!(
        "POST /api/render year={} energy={:?} countries={:?} sectors={:?} scale={:?} projection={:?}",
        snapshot.year,
        snapshot.energy_type,
        snapshot.countries,
        snapshot.sectors,
        snapshot.scale,
        snapshot.projection
    );
    render_response(&state, snapshot).await
}

#[derive(Serialize)]
struct RejectedSnapshot {
    error: String,
    last_valid: Option<Render>,
}

async fn render_response(state: &AppState, snapshot: ControlSnapshot) -> Response {
    match state.render(&snapshot).await {
        Ok(render) => {
            for warning in &render.warnings {
                tracing::debug!("Render warning: {}", warning);
            }
            Json(render).into_response()
        }
        Err(e) => {
            tracing::warn!("Snapshot rejected: {}", e);
            reject(state, e.to_string()).await
        }
    }
}

/// 422 carrying the error and the charts the page should keep showing
async fn reject(state: &AppState, error: String) -> Response {
    let body = RejectedSnapshot { error, last_valid: state.last_valid().await };
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}
