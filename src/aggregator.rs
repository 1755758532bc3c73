//! Periodic SLA aggregation.
//!
//! For every active IT service the current period's availability is pulled
//! from the monitoring server and upserted into the local history, trigger
//! problem events are folded into the event log, and services flagged as
//! the main service of a host propagate their numbers onto the owning
//! scope. Each pass recomputes the current period from scratch, so rows
//! converge even after a missed run.

use std::sync::Arc;

use chrono::{Datelike, TimeZone, Utc};
use sea_orm::{DatabaseConnection, EntityTrait};
use tracing::{info, warn};

use crate::backend::backend_for_settings;
use crate::db::entities::prelude::*;
use crate::db::enums::EventState;
use crate::db::services::{itservice_service, sla_service};
use crate::web::error::AppError;

/// Aggregation granularity. Monthly periods are keyed "YYYY-MM", yearly
/// periods "YYYY".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaPeriod {
    Monthly,
    Yearly,
}

impl SlaPeriod {
    /// Period key for the instant `now` falls in.
    pub fn key(&self, now: chrono::DateTime<Utc>) -> String {
        match self {
            SlaPeriod::Monthly => format!("{:04}-{:02}", now.year(), now.month()),
            SlaPeriod::Yearly => format!("{:04}", now.year()),
        }
    }

    /// Unix timestamp of the period start containing `now`.
    pub fn start_timestamp(&self, now: chrono::DateTime<Utc>) -> i64 {
        let start = match self {
            SlaPeriod::Monthly => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single(),
            SlaPeriod::Yearly => Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0).single(),
        };
        start.map(|dt| dt.timestamp()).unwrap_or(0)
    }
}

/// One aggregation pass over every active IT service. A failure on one
/// service is logged and the batch continues; the pass reports how many
/// services were updated.
pub async fn aggregate_sla(
    db: &Arc<DatabaseConnection>,
    period: SlaPeriod,
) -> Result<usize, AppError> {
    let now = Utc::now();
    let period_key = period.key(now);
    let from = period.start_timestamp(now);
    let to = now.timestamp();

    let mut updated = 0;
    for itservice in itservice_service::active_itservices(db.as_ref()).await? {
        match aggregate_one(db, &itservice, &period_key, from, to).await {
            Ok(()) => updated += 1,
            Err(e) => {
                warn!(itservice = %itservice.name, period = %period_key, error = %e,
                    "SLA aggregation failed for service");
            }
        }
    }
    info!(period = %period_key, updated, "SLA aggregation pass finished");
    Ok(updated)
}

async fn aggregate_one(
    db: &Arc<DatabaseConnection>,
    itservice: &ItserviceModel,
    period_key: &str,
    from: i64,
    to: i64,
) -> Result<(), AppError> {
    let backend_id = itservice
        .backend_id
        .as_deref()
        .ok_or_else(|| AppError::InvalidInput("IT service has no remote id".to_string()))?;

    let settings = Settings::find_by_id(itservice.settings_id)
        .one(db.as_ref())
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Settings {} not found", itservice.settings_id))
        })?;
    let backend = backend_for_settings(db.clone(), &settings);

    let sla = backend.get_sla(backend_id, from, to).await?;
    let history =
        sla_service::upsert_sla_history(db.as_ref(), itservice.id, period_key, sla).await?;

    if let Some(trigger_backend_id) = itservice.backend_trigger_id.as_deref() {
        for event in backend
            .get_trigger_events(trigger_backend_id, from, to)
            .await?
        {
            let state = EventState::from_trigger_value(event.value);
            sla_service::get_or_create_event(db.as_ref(), history.id, event.timestamp, state)
                .await?;
        }
    }

    if itservice.is_main {
        propagate_to_scope(db.as_ref(), itservice, &history, period_key, sla).await?;
    }
    Ok(())
}

/// Copy the main service's numbers onto the scope the backing host
/// monitors, so consumers can query availability without knowing about
/// hosts or IT services.
async fn propagate_to_scope(
    db: &DatabaseConnection,
    itservice: &ItserviceModel,
    history: &SlaHistoryModel,
    period_key: &str,
    sla: f64,
) -> Result<(), AppError> {
    let Some(host_id) = itservice.host_id else {
        return Ok(());
    };
    let host = Host::find_by_id(host_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Host {host_id} not found")))?;
    let Some(scope) = host.scope() else {
        return Ok(());
    };

    sla_service::upsert_scope_sla(db, &scope, period_key, sla, itservice.agreed_sla).await?;
    for event in sla_service::events_for_history(db, history.id).await? {
        sla_service::get_or_create_scope_state_event(
            db,
            &scope,
            period_key,
            event.timestamp,
            event.state == EventState::Up,
        )
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_period_key() {
        let now = Utc.with_ymd_and_hms(2015, 9, 21, 10, 30, 0).unwrap();
        assert_eq!(SlaPeriod::Monthly.key(now), "2015-09");
        assert_eq!(SlaPeriod::Yearly.key(now), "2015");
    }

    #[test]
    fn test_period_key_pads_month() {
        let now = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(SlaPeriod::Monthly.key(now), "2021-01");
    }

    #[test]
    fn test_period_start() {
        let now = Utc.with_ymd_and_hms(2015, 9, 21, 10, 30, 0).unwrap();
        assert_eq!(
            SlaPeriod::Monthly.start_timestamp(now),
            Utc.with_ymd_and_hms(2015, 9, 1, 0, 0, 0).unwrap().timestamp()
        );
        assert_eq!(
            SlaPeriod::Yearly.start_timestamp(now),
            Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_period_start_is_before_now() {
        let now = Utc::now();
        assert!(SlaPeriod::Monthly.start_timestamp(now) <= now.timestamp());
        assert!(SlaPeriod::Yearly.start_timestamp(now) <= now.timestamp());
    }
}
