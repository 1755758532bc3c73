use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::services::host_service::{self, NewHost};
use crate::scope::visible_name_from_scope;
use crate::web::models::{CreateHostRequest, HostResponse};
use crate::web::{AppError, AppState};

pub fn host_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", axum::routing::post(create_host_handler))
        .route(
            "/{id}",
            get(get_host_handler).delete(delete_host_handler),
        )
        .route("/{id}/items/stats", get(super::stats_routes::host_item_stats_handler))
}

/// Register a host and kick off remote provisioning. The visible name is
/// taken from the payload when given, derived from the scope otherwise;
/// a request carrying neither is rejected before anything is written.
async fn create_host_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateHostRequest>,
) -> Result<(StatusCode, Json<HostResponse>), AppError> {
    let visible_name = match (&payload.visible_name, &payload.scope) {
        (Some(name), _) => name.clone(),
        (None, Some(scope)) => {
            let info = app_state.scopes.resolve(scope).await?;
            visible_name_from_scope(&info)
        }
        (None, None) => {
            return Err(AppError::InvalidInput(
                "Visible name or scope should be defined".to_string(),
            ));
        }
    };

    let new_host = NewHost {
        settings_id: payload.settings_id,
        name: payload.name,
        scope_type: payload.scope.as_ref().map(|s| s.kind.clone()),
        scope_id: payload.scope.as_ref().map(|s| s.id.clone()),
        host_group_name: payload.host_group_name,
        interface_parameters: payload.interface_parameters,
        template_ids: payload.template_ids,
    };
    let host = host_service::create_host(app_state.db.as_ref(), new_host, visible_name).await?;
    app_state.orchestrator.schedule_host_provisioning(host.id);

    Ok((StatusCode::ACCEPTED, Json(host.into())))
}

async fn get_host_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<HostResponse>, AppError> {
    let host = host_service::get_host(app_state.db.as_ref(), id).await?;
    Ok(Json(host.into()))
}

#[derive(Deserialize)]
struct DeleteHostQuery {
    #[serde(default)]
    force: bool,
}

async fn delete_host_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<DeleteHostQuery>,
) -> Result<StatusCode, AppError> {
    if query.force {
        app_state.orchestrator.force_destroy_host(id).await?;
        return Ok(StatusCode::NO_CONTENT);
    }
    app_state.orchestrator.destroy_host(id).await?;
    Ok(StatusCode::ACCEPTED)
}
