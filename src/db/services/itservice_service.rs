//! CRUD and lifecycle persistence for IT service records.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set,
};

use crate::db::entities::{itservice, prelude::*};
use crate::db::enums::{ResourceState, SlaAlgorithm};
use crate::lifecycle::{self, LifecycleEvent, StateConflictError};
use crate::web::error::AppError;

#[derive(Debug, Clone)]
pub struct NewItservice {
    pub settings_id: i32,
    pub host_id: Option<i32>,
    pub name: String,
    pub algorithm: SlaAlgorithm,
    pub sort_order: i32,
    pub agreed_sla: Option<f64>,
    pub trigger_id: Option<i32>,
    pub is_main: bool,
}

/// Validate domain rules and insert the record in `CreationScheduled`:
/// the trigger must belong to one of the host's templates, and a host may
/// carry at most one main IT service.
pub async fn create_itservice<C: ConnectionTrait>(
    db: &C,
    new: NewItservice,
) -> Result<ItserviceModel, AppError> {
    let mut backend_trigger_id = None;

    if let Some(trigger_id) = new.trigger_id {
        let trigger = Trigger::find_by_id(trigger_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::InvalidInput(format!("Trigger {trigger_id} not found")))?;
        if trigger.settings_id != new.settings_id {
            return Err(AppError::InvalidInput(
                "Trigger belongs to a different monitoring service".to_string(),
            ));
        }
        if let Some(host_id) = new.host_id {
            let host = Host::find_by_id(host_id)
                .one(db)
                .await?
                .ok_or_else(|| AppError::InvalidInput(format!("Host {host_id} not found")))?;
            if host.settings_id != new.settings_id {
                return Err(AppError::InvalidInput(
                    "Host and IT service should belong to the same monitoring service".to_string(),
                ));
            }
            let host_template_ids: Vec<i32> = host
                .find_related(Template)
                .all(db)
                .await?
                .into_iter()
                .map(|t| t.id)
                .collect();
            if !host_template_ids.contains(&trigger.template_id) {
                return Err(AppError::InvalidInput(
                    "Host templates should contain the trigger's template".to_string(),
                ));
            }
        }
        backend_trigger_id = Some(trigger.backend_id);
    }

    if new.is_main {
        if let Some(host_id) = new.host_id {
            let existing_main = Itservice::find()
                .filter(ItserviceColumn::HostId.eq(host_id))
                .filter(ItserviceColumn::IsMain.eq(true))
                .one(db)
                .await?;
            if existing_main.is_some() {
                return Err(AppError::Conflict(format!(
                    "Host {host_id} already has a main IT service"
                )));
            }
        }
    }

    let now = Utc::now();
    let saved = itservice::ActiveModel {
        settings_id: Set(new.settings_id),
        host_id: Set(new.host_id),
        name: Set(new.name),
        algorithm: Set(new.algorithm),
        sort_order: Set(new.sort_order),
        agreed_sla: Set(new.agreed_sla),
        trigger_id: Set(new.trigger_id),
        backend_trigger_id: Set(backend_trigger_id),
        backend_id: Set(None),
        is_main: Set(new.is_main),
        state: Set(lifecycle::initial_state()),
        error_message: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(saved)
}

pub async fn get_itservice<C: ConnectionTrait>(
    db: &C,
    itservice_id: i32,
) -> Result<ItserviceModel, AppError> {
    Itservice::find_by_id(itservice_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("IT service {itservice_id} not found")))
}

/// IT services the SLA aggregator acts on: provisioned and stable.
pub async fn active_itservices<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<ItserviceModel>, sea_orm::DbErr> {
    Itservice::find()
        .filter(ItserviceColumn::BackendId.is_not_null())
        .filter(ItserviceColumn::State.eq(ResourceState::Ok))
        .all(db)
        .await
}

pub async fn itservices_for_host<C: ConnectionTrait>(
    db: &C,
    host_id: i32,
) -> Result<Vec<ItserviceModel>, sea_orm::DbErr> {
    Itservice::find()
        .filter(ItserviceColumn::HostId.eq(host_id))
        .all(db)
        .await
}

/// See `host_service::transition_host`; same conditional single-writer gate.
pub async fn transition_itservice<C: ConnectionTrait>(
    db: &C,
    itservice_id: i32,
    event: LifecycleEvent,
) -> Result<ItserviceModel, AppError> {
    let itservice = get_itservice(db, itservice_id).await?;
    let next = lifecycle::apply(itservice.state, event)?;
    let now = Utc::now();
    let updated = Itservice::update_many()
        .col_expr(ItserviceColumn::State, Expr::value(next))
        .col_expr(ItserviceColumn::UpdatedAt, Expr::value(now))
        .filter(ItserviceColumn::Id.eq(itservice_id))
        .filter(ItserviceColumn::State.eq(itservice.state))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AppError::StateConflict(StateConflictError {
            from: itservice.state,
            event,
        }));
    }
    Ok(ItserviceModel {
        state: next,
        updated_at: now,
        ..itservice
    })
}

pub async fn set_itservice_erred<C: ConnectionTrait>(
    db: &C,
    itservice_id: i32,
    message: &str,
) -> Result<(), AppError> {
    let itservice = get_itservice(db, itservice_id).await?;
    let next =
        lifecycle::apply(itservice.state, LifecycleEvent::SetErred).unwrap_or(ResourceState::Erred);
    let mut active: itservice::ActiveModel = itservice.into();
    active.state = Set(next);
    active.error_message = Set(message.to_string());
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}

pub async fn save_created<C: ConnectionTrait>(
    db: &C,
    itservice: ItserviceModel,
    backend_id: &str,
    backend_trigger_id: Option<String>,
) -> Result<ItserviceModel, sea_orm::DbErr> {
    let mut active: itservice::ActiveModel = itservice.into();
    active.backend_id = Set(Some(backend_id.to_string()));
    if backend_trigger_id.is_some() {
        active.backend_trigger_id = Set(backend_trigger_id);
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await
}

pub async fn delete_itservice_record<C: ConnectionTrait>(
    db: &C,
    itservice_id: i32,
) -> Result<(), sea_orm::DbErr> {
    Itservice::delete_by_id(itservice_id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;

    fn online_itservice() -> ItserviceModel {
        let now = Utc::now();
        ItserviceModel {
            id: 1,
            settings_id: 1,
            host_id: Some(1),
            name: "Web tier".to_string(),
            algorithm: SlaAlgorithm::ProblemIfAnyChild,
            sort_order: 1,
            agreed_sla: Some(99.9),
            trigger_id: None,
            backend_trigger_id: None,
            backend_id: Some("5".to_string()),
            is_main: true,
            state: ResourceState::Ok,
            error_message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_transition_rejected_when_state_moved_underneath() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![online_itservice()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let result = transition_itservice(&db, 1, LifecycleEvent::ScheduleDeletion).await;
        assert!(matches!(result, Err(AppError::StateConflict(_))));
    }
}
