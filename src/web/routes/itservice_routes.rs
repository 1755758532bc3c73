use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::aggregator::SlaPeriod;
use crate::db::enums::SlaAlgorithm;
use crate::db::services::itservice_service::{self, NewItservice};
use crate::db::services::sla_service;
use crate::web::models::{
    CreateItserviceRequest, ItserviceResponse, SlaEventResponse, SlaEventsResponse,
};
use crate::web::{AppError, AppState};

pub fn itservice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_itservice_handler))
        .route(
            "/{id}",
            get(get_itservice_handler).delete(delete_itservice_handler),
        )
        .route("/{id}/events", get(itservice_events_handler))
}

async fn create_itservice_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateItserviceRequest>,
) -> Result<(StatusCode, Json<ItserviceResponse>), AppError> {
    let algorithm = match payload.algorithm {
        Some(code) => SlaAlgorithm::from_code(code).ok_or_else(|| {
            AppError::InvalidInput(format!("Unknown SLA algorithm code {code}"))
        })?,
        None => SlaAlgorithm::SkipCalculation,
    };

    let new = NewItservice {
        settings_id: payload.settings_id,
        host_id: payload.host_id,
        name: payload.name,
        algorithm,
        sort_order: payload.sort_order.unwrap_or(1),
        agreed_sla: payload.agreed_sla,
        trigger_id: payload.trigger_id,
        is_main: payload.is_main,
    };
    let itservice = itservice_service::create_itservice(app_state.db.as_ref(), new).await?;
    app_state
        .orchestrator
        .schedule_itservice_provisioning(itservice.id);

    Ok((StatusCode::ACCEPTED, Json(itservice.into())))
}

async fn get_itservice_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ItserviceResponse>, AppError> {
    let itservice = itservice_service::get_itservice(app_state.db.as_ref(), id).await?;
    Ok(Json(itservice.into()))
}

async fn delete_itservice_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<DeleteItserviceQuery>,
) -> Result<StatusCode, AppError> {
    if query.force {
        app_state.orchestrator.force_destroy_itservice(id).await?;
        return Ok(StatusCode::NO_CONTENT);
    }
    app_state.orchestrator.destroy_itservice(id).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Deserialize)]
struct DeleteItserviceQuery {
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct EventsQuery {
    /// "YYYY-MM" or "YYYY"; the current month when absent.
    period: Option<String>,
}

/// Stored SLA value and up/down transitions for one period. Data comes
/// from the aggregated history tables, never live from the remote server.
async fn itservice_events_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<SlaEventsResponse>, AppError> {
    let itservice = itservice_service::get_itservice(app_state.db.as_ref(), id).await?;
    let period = query
        .period
        .unwrap_or_else(|| SlaPeriod::Monthly.key(Utc::now()));

    let history = sla_service::find_sla_history(app_state.db.as_ref(), itservice.id, &period).await?;
    let (sla, events) = match history {
        Some(history) => {
            let events = sla_service::events_for_history(app_state.db.as_ref(), history.id)
                .await?
                .into_iter()
                .map(|e| SlaEventResponse {
                    timestamp: e.timestamp,
                    state: e.state,
                })
                .collect();
            (history.value, events)
        }
        None => (None, Vec::new()),
    };

    Ok(Json(SlaEventsResponse {
        period,
        sla,
        agreed_sla: itservice.agreed_sla,
        events,
    }))
}
