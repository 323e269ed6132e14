//! HTTP endpoint of the seed function.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::client::Backend;
use crate::config::SuperAdminSeed;
use crate::error::AppError;
use crate::seed::{self, SeedOutcome};

#[derive(Clone)]
pub struct SeedState {
    pub backend: Backend,
    pub seed: Arc<SuperAdminSeed>,
}

impl SeedState {
    /// Seeds the account described by the backend's own configuration.
    pub fn new(backend: Backend) -> Self {
        let seed = Arc::new(backend.config().super_admin.clone());
        Self { backend, seed }
    }
}

struct SeedError(AppError);

impl IntoResponse for SeedError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "seed-super-admin failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.user_message() })),
        )
            .into_response()
    }
}

async fn seed_super_admin(State(state): State<SeedState>) -> Result<Json<SeedOutcome>, SeedError> {
    seed::seed_super_admin(&state.backend, &state.seed)
        .await
        .map(Json)
        .map_err(SeedError)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
}

pub fn router(state: SeedState) -> Router {
    Router::new()
        .route(&format!("/{}", seed::SEED_FUNCTION), post(seed_super_admin))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: SeedState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Seed function listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}
