use std::sync::Arc;

use axum::{http::Method, routing::get, Router};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};

use crate::lifecycle::orchestrator::Orchestrator;
use crate::scope::ScopeRegistry;

pub mod error;
pub mod models;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub orchestrator: Arc<Orchestrator>,
    pub scopes: Arc<ScopeRegistry>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(
    db: Arc<DatabaseConnection>,
    orchestrator: Arc<Orchestrator>,
    scopes: Arc<ScopeRegistry>,
) -> Router {
    let app_state = Arc::new(AppState {
        db,
        orchestrator,
        scopes,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .nest("/api/hosts", routes::host_routes::host_router())
        .nest("/api/itservices", routes::itservice_routes::itservice_router())
        .merge(routes::catalog_routes::catalog_router())
        .merge(routes::stats_routes::stats_router())
        .merge(routes::settings_routes::settings_router())
        .with_state(app_state)
        .layer(cors)
}
