//! Persistence for SLA history and the per-scope monitoring summary.
//!
//! All writes are idempotent: history rows are keyed by (itservice, period)
//! and overwritten, events are get-or-create on their full identity.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::db::entities::{prelude::*, scope_sla, scope_state_event, sla_history, sla_history_event};
use crate::db::enums::EventState;
use crate::scope::ScopeRef;

/// Round to the 4 decimal places the SLA columns carry.
pub fn round_sla(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Upsert the SLA value for (itservice, period), overwriting on every run.
pub async fn upsert_sla_history<C: ConnectionTrait>(
    db: &C,
    itservice_id: i32,
    period: &str,
    value: f64,
) -> Result<SlaHistoryModel, sea_orm::DbErr> {
    let value = round_sla(value);
    let existing = SlaHistory::find()
        .filter(SlaHistoryColumn::ItserviceId.eq(itservice_id))
        .filter(SlaHistoryColumn::Period.eq(period))
        .one(db)
        .await?;

    match existing {
        Some(row) if row.value == Some(value) => Ok(row),
        Some(row) => {
            let mut active: sla_history::ActiveModel = row.into();
            active.value = Set(Some(value));
            active.update(db).await
        }
        None => {
            sla_history::ActiveModel {
                itservice_id: Set(itservice_id),
                period: Set(period.to_string()),
                value: Set(Some(value)),
                ..Default::default()
            }
            .insert(db)
            .await
        }
    }
}

pub async fn find_sla_history<C: ConnectionTrait>(
    db: &C,
    itservice_id: i32,
    period: &str,
) -> Result<Option<SlaHistoryModel>, sea_orm::DbErr> {
    SlaHistory::find()
        .filter(SlaHistoryColumn::ItserviceId.eq(itservice_id))
        .filter(SlaHistoryColumn::Period.eq(period))
        .one(db)
        .await
}

/// Idempotent event insert; duplicate (timestamp, state) pairs are never
/// double-inserted.
pub async fn get_or_create_event<C: ConnectionTrait>(
    db: &C,
    history_id: i32,
    timestamp: i64,
    state: EventState,
) -> Result<SlaHistoryEventModel, sea_orm::DbErr> {
    let existing = SlaHistoryEvent::find()
        .filter(SlaHistoryEventColumn::HistoryId.eq(history_id))
        .filter(SlaHistoryEventColumn::Timestamp.eq(timestamp))
        .filter(SlaHistoryEventColumn::State.eq(state))
        .one(db)
        .await?;
    if let Some(event) = existing {
        return Ok(event);
    }
    sla_history_event::ActiveModel {
        history_id: Set(history_id),
        timestamp: Set(timestamp),
        state: Set(state),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn events_for_history<C: ConnectionTrait>(
    db: &C,
    history_id: i32,
) -> Result<Vec<SlaHistoryEventModel>, sea_orm::DbErr> {
    SlaHistoryEvent::find()
        .filter(SlaHistoryEventColumn::HistoryId.eq(history_id))
        .order_by_asc(SlaHistoryEventColumn::Timestamp)
        .all(db)
        .await
}

/// Upsert the simplified per-scope SLA summary for main IT services.
pub async fn upsert_scope_sla<C: ConnectionTrait>(
    db: &C,
    scope: &ScopeRef,
    period: &str,
    value: f64,
    agreed_sla: Option<f64>,
) -> Result<(), sea_orm::DbErr> {
    let value = round_sla(value);
    let existing = ScopeSla::find()
        .filter(ScopeSlaColumn::ScopeType.eq(scope.kind.clone()))
        .filter(ScopeSlaColumn::ScopeId.eq(scope.id.clone()))
        .filter(ScopeSlaColumn::Period.eq(period))
        .one(db)
        .await?;

    match existing {
        Some(row) if row.value == Some(value) && row.agreed_sla == agreed_sla => {}
        Some(row) => {
            let mut active: scope_sla::ActiveModel = row.into();
            active.value = Set(Some(value));
            active.agreed_sla = Set(agreed_sla);
            active.update(db).await?;
        }
        None => {
            scope_sla::ActiveModel {
                scope_type: Set(scope.kind.clone()),
                scope_id: Set(scope.id.clone()),
                period: Set(period.to_string()),
                value: Set(Some(value)),
                agreed_sla: Set(agreed_sla),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

/// Idempotent per-scope availability transition record.
pub async fn get_or_create_scope_state_event<C: ConnectionTrait>(
    db: &C,
    scope: &ScopeRef,
    period: &str,
    timestamp: i64,
    is_up: bool,
) -> Result<(), sea_orm::DbErr> {
    let existing = ScopeStateEvent::find()
        .filter(ScopeStateEventColumn::ScopeType.eq(scope.kind.clone()))
        .filter(ScopeStateEventColumn::ScopeId.eq(scope.id.clone()))
        .filter(ScopeStateEventColumn::Period.eq(period))
        .filter(ScopeStateEventColumn::Timestamp.eq(timestamp))
        .filter(ScopeStateEventColumn::IsUp.eq(is_up))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }
    scope_state_event::ActiveModel {
        scope_type: Set(scope.kind.clone()),
        scope_id: Set(scope.id.clone()),
        period: Set(period.to_string()),
        timestamp: Set(timestamp),
        is_up: Set(is_up),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Latest harvested metric value for a scope, one row per (scope, item key).
pub async fn upsert_scope_monitoring_item<C: ConnectionTrait>(
    db: &C,
    scope: &ScopeRef,
    item_key: &str,
    value: f64,
) -> Result<(), sea_orm::DbErr> {
    use crate::db::entities::scope_monitoring_item;

    let existing = ScopeMonitoringItem::find()
        .filter(ScopeMonitoringItemColumn::ScopeType.eq(scope.kind.clone()))
        .filter(ScopeMonitoringItemColumn::ScopeId.eq(scope.id.clone()))
        .filter(ScopeMonitoringItemColumn::ItemKey.eq(item_key))
        .one(db)
        .await?;
    match existing {
        Some(row) => {
            let mut active: scope_monitoring_item::ActiveModel = row.into();
            active.value = Set(value);
            active.updated_at = Set(chrono::Utc::now());
            active.update(db).await?;
        }
        None => {
            scope_monitoring_item::ActiveModel {
                scope_type: Set(scope.kind.clone()),
                scope_id: Set(scope.id.clone()),
                item_key: Set(item_key.to_string()),
                value: Set(value),
                updated_at: Set(chrono::Utc::now()),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase};

    use super::*;

    #[test]
    fn test_round_sla_to_four_decimals() {
        assert_eq!(round_sla(99.987654), 99.9877);
        assert_eq!(round_sla(100.0), 100.0);
        assert_eq!(round_sla(0.00004), 0.0);
    }

    #[tokio::test]
    async fn test_get_or_create_event_returns_existing_without_insert() {
        let existing = SlaHistoryEventModel {
            id: 7,
            history_id: 3,
            timestamp: 1_454_702_400,
            state: EventState::Down,
        };
        // No exec results registered: an attempted insert would fail the test.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();

        let event = get_or_create_event(&db, 3, 1_454_702_400, EventState::Down)
            .await
            .unwrap();
        assert_eq!(event, existing);
    }
}
