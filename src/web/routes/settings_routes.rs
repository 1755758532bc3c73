use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use sea_orm::EntityTrait;

use crate::backend::backend_for_settings;
use crate::db::entities::prelude::*;
use crate::web::{AppError, AppState};

pub fn settings_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/settings/{id}/sync", post(sync_settings_handler))
}

/// Manual catalog pull for one monitoring server, outside the schedule.
async fn sync_settings_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let settings = Settings::find_by_id(id)
        .one(app_state.db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Settings {id} not found")))?;

    let backend = backend_for_settings(app_state.db.clone(), &settings);
    backend.sync().await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "status": "synced" })),
    ))
}
