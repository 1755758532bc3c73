use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::post,
    Json, Router,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::backend::backend_for_settings;
use crate::db::entities::prelude::*;
use crate::db::services::host_service;
use crate::web::models::{AggregateStatsRequest, StatsQuery, StatsResponse};
use crate::web::{AppError, AppState};

pub fn stats_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/stats/aggregate", post(aggregate_stats_handler))
}

/// Expand a stats query into the concrete sampling instants: an explicit
/// comma-separated list wins, otherwise a range is split into evenly
/// spaced points.
pub(crate) fn resolve_points(query: &StatsQuery) -> Result<Vec<i64>, AppError> {
    if let Some(raw) = &query.points {
        let points = raw
            .split(',')
            .map(|p| p.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                AppError::InvalidInput("points must be comma-separated unix timestamps".to_string())
            })?;
        if points.is_empty() {
            return Err(AppError::InvalidInput("points must not be empty".to_string()));
        }
        ensure_ascending(&points)?;
        return Ok(points);
    }

    let (Some(start), Some(end), Some(datapoints)) = (query.start, query.end, query.datapoints)
    else {
        return Err(AppError::InvalidInput(
            "either points or start, end and datapoints are required".to_string(),
        ));
    };
    if end <= start || datapoints < 2 {
        return Err(AppError::InvalidInput(
            "range must be non-empty and datapoints at least 2".to_string(),
        ));
    }
    let step = (end - start) as f64 / (datapoints - 1) as f64;
    Ok((0..datapoints)
        .map(|i| start + (i as f64 * step).round() as i64)
        .collect())
}

/// The sampler walks history newest-first against the requested instants,
/// so the instants must arrive strictly increasing.
pub(crate) fn ensure_ascending(points: &[i64]) -> Result<(), AppError> {
    if points.windows(2).any(|w| w[0] >= w[1]) {
        return Err(AppError::InvalidInput(
            "points must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

async fn stats_for_host(
    db: &Arc<DatabaseConnection>,
    host_id: i32,
    item_key: &str,
    points: &[i64],
) -> Result<Vec<Option<f64>>, AppError> {
    let host = host_service::get_host(db.as_ref(), host_id).await?;
    let backend_id = host
        .backend_id
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput(format!("Host {host_id} is not provisioned yet")))?;

    // The item must come from one of the host's own templates.
    let template_ids: Vec<i32> = host_service::host_templates(db.as_ref(), &host)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    let item = Item::find()
        .filter(ItemColumn::Key.eq(item_key))
        .filter(ItemColumn::TemplateId.is_in(template_ids))
        .one(db.as_ref())
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Item \"{item_key}\" is not linked to host {host_id}"))
        })?;

    let settings = Settings::find_by_id(host.settings_id)
        .one(db.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Settings {} not found", host.settings_id)))?;
    let backend = backend_for_settings(db.clone(), &settings);
    Ok(backend.get_item_stats(backend_id, &item, points).await?)
}

/// Per-host time series sampled at the requested instants.
pub async fn host_item_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let points = resolve_points(&query)?;
    let values = stats_for_host(&app_state.db, id, &query.item_key, &points).await?;
    Ok(Json(StatsResponse {
        item_key: query.item_key,
        points,
        values,
    }))
}

/// Sum one item over several hosts, point by point. A point where every
/// host lacks data stays None; hosts missing only that point contribute 0.
async fn aggregate_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<AggregateStatsRequest>,
) -> Result<Json<StatsResponse>, AppError> {
    if payload.points.is_empty() {
        return Err(AppError::InvalidInput("points must not be empty".to_string()));
    }
    ensure_ascending(&payload.points)?;
    let mut totals: Vec<Option<f64>> = vec![None; payload.points.len()];
    for host_id in &payload.host_ids {
        let values =
            stats_for_host(&app_state.db, *host_id, &payload.item_key, &payload.points).await?;
        for (total, value) in totals.iter_mut().zip(values) {
            if let Some(v) = value {
                *total = Some(total.unwrap_or(0.0) + v);
            }
        }
    }
    Ok(Json(StatsResponse {
        item_key: payload.item_key,
        points: payload.points,
        values: totals,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(points: Option<&str>, range: Option<(i64, i64, u32)>) -> StatsQuery {
        StatsQuery {
            item_key: "cpu_util".to_string(),
            points: points.map(|p| p.to_string()),
            start: range.map(|r| r.0),
            end: range.map(|r| r.1),
            datapoints: range.map(|r| r.2),
        }
    }

    #[test]
    fn test_explicit_points_parsed() {
        let points = resolve_points(&query(Some("100, 200,300"), None)).unwrap();
        assert_eq!(points, vec![100, 200, 300]);
    }

    #[test]
    fn test_range_split_evenly() {
        let points = resolve_points(&query(None, Some((0, 100, 5)))).unwrap();
        assert_eq!(points, vec![0, 25, 50, 75, 100]);
    }

    #[test]
    fn test_range_endpoints_included() {
        let points = resolve_points(&query(None, Some((1000, 1003, 2)))).unwrap();
        assert_eq!(points, vec![1000, 1003]);
    }

    #[test]
    fn test_unordered_points_rejected() {
        assert!(resolve_points(&query(Some("300,100,200"), None)).is_err());
        assert!(ensure_ascending(&[100, 100]).is_err());
        assert!(ensure_ascending(&[100, 200, 300]).is_ok());
    }

    #[test]
    fn test_invalid_queries_rejected() {
        assert!(resolve_points(&query(Some("abc"), None)).is_err());
        assert!(resolve_points(&query(None, None)).is_err());
        assert!(resolve_points(&query(None, Some((100, 100, 5)))).is_err());
        assert!(resolve_points(&query(None, Some((0, 100, 1)))).is_err());
    }
}
