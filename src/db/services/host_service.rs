//! CRUD and lifecycle persistence for host records.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, Set,
};

use crate::db::entities::{host, host_template, prelude::*};
use crate::db::enums::ResourceState;
use crate::lifecycle::{self, LifecycleEvent, StateConflictError};
use crate::web::error::AppError;

/// Parameters accepted when registering a new host.
#[derive(Debug, Clone)]
pub struct NewHost {
    pub settings_id: i32,
    /// Generated unique key if absent (the scope id is not guaranteed unique
    /// across kinds, so a fresh identifier is used).
    pub name: Option<String>,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    pub host_group_name: Option<String>,
    pub interface_parameters: Option<serde_json::Value>,
    pub template_ids: Vec<i32>,
}

/// Validate uniqueness within the settings instance and insert the record in
/// `CreationScheduled`. Raised before any remote mutation is attempted.
pub async fn create_host<C: ConnectionTrait>(
    db: &C,
    new_host: NewHost,
    visible_name: String,
) -> Result<HostModel, AppError> {
    let name = new_host
        .name
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    if name.len() > host::VISIBLE_NAME_MAX_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Host name \"{name}\" is longer than {} characters",
            host::VISIBLE_NAME_MAX_LENGTH
        )));
    }

    let name_taken = Host::find()
        .filter(HostColumn::SettingsId.eq(new_host.settings_id))
        .filter(HostColumn::Name.eq(name.clone()))
        .one(db)
        .await?
        .is_some();
    if name_taken {
        return Err(AppError::Conflict(format!(
            "Host with name \"{name}\" already exists at this service"
        )));
    }
    let visible_name_taken = Host::find()
        .filter(HostColumn::SettingsId.eq(new_host.settings_id))
        .filter(HostColumn::VisibleName.eq(visible_name.clone()))
        .one(db)
        .await?
        .is_some();
    if visible_name_taken {
        return Err(AppError::Conflict(format!(
            "Host with visible name \"{visible_name}\" already exists at this service"
        )));
    }

    let now = Utc::now();
    let saved = host::ActiveModel {
        settings_id: Set(new_host.settings_id),
        name: Set(name),
        visible_name: Set(visible_name),
        backend_id: Set(None),
        host_group_name: Set(new_host.host_group_name.unwrap_or_default()),
        interface_parameters: Set(new_host.interface_parameters),
        scope_type: Set(new_host.scope_type),
        scope_id: Set(new_host.scope_id),
        state: Set(lifecycle::initial_state()),
        error_message: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    for template_id in new_host.template_ids {
        host_template::ActiveModel {
            host_id: Set(saved.id),
            template_id: Set(template_id),
        }
        .insert(db)
        .await?;
    }

    Ok(saved)
}

pub async fn get_host<C: ConnectionTrait>(
    db: &C,
    host_id: i32,
) -> Result<HostModel, AppError> {
    Host::find_by_id(host_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Host {host_id} not found")))
}

pub async fn host_templates<C: ConnectionTrait>(
    db: &C,
    host: &HostModel,
) -> Result<Vec<TemplateModel>, sea_orm::DbErr> {
    host.find_related(Template).all(db).await
}

pub async fn hosts_for_scope<C: ConnectionTrait>(
    db: &C,
    scope_type: &str,
    scope_id: &str,
) -> Result<Vec<HostModel>, sea_orm::DbErr> {
    Host::find()
        .filter(HostColumn::ScopeType.eq(scope_type))
        .filter(HostColumn::ScopeId.eq(scope_id))
        .all(db)
        .await
}

/// Hosts the schedulers act on: provisioned and not mid-transition.
pub async fn active_hosts<C: ConnectionTrait>(db: &C) -> Result<Vec<HostModel>, sea_orm::DbErr> {
    Host::find()
        .filter(HostColumn::BackendId.is_not_null())
        .filter(HostColumn::State.eq(ResourceState::Ok))
        .all(db)
        .await
}

/// Apply a lifecycle event and persist the resulting state in one step.
/// The state column is the single-writer gate: the FSM rejects the event if
/// the stored state is not a legal source, and the write itself is
/// conditional on that state, so a concurrent transition that slipped in
/// between the read and the write loses the race instead of being
/// overwritten.
pub async fn transition_host<C: ConnectionTrait>(
    db: &C,
    host_id: i32,
    event: LifecycleEvent,
) -> Result<HostModel, AppError> {
    let host = get_host(db, host_id).await?;
    let next = lifecycle::apply(host.state, event)?;
    let now = Utc::now();
    let updated = Host::update_many()
        .col_expr(HostColumn::State, Expr::value(next))
        .col_expr(HostColumn::UpdatedAt, Expr::value(now))
        .filter(HostColumn::Id.eq(host_id))
        .filter(HostColumn::State.eq(host.state))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AppError::StateConflict(StateConflictError {
            from: host.state,
            event,
        }));
    }
    Ok(HostModel {
        state: next,
        updated_at: now,
        ..host
    })
}

/// Transition to Erred and persist the failure for operator visibility.
pub async fn set_host_erred<C: ConnectionTrait>(
    db: &C,
    host_id: i32,
    message: &str,
) -> Result<(), AppError> {
    let host = get_host(db, host_id).await?;
    let next = lifecycle::apply(host.state, LifecycleEvent::SetErred).unwrap_or(ResourceState::Erred);
    let mut active: host::ActiveModel = host.into();
    active.state = Set(next);
    active.error_message = Set(message.to_string());
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    Ok(())
}

/// Store the identifiers the remote server assigned during provisioning.
pub async fn save_provisioned<C: ConnectionTrait>(
    db: &C,
    host: HostModel,
    backend_id: &str,
    interface_parameters: serde_json::Value,
    host_group_name: &str,
) -> Result<HostModel, sea_orm::DbErr> {
    let mut active: host::ActiveModel = host.into();
    active.backend_id = Set(Some(backend_id.to_string()));
    active.interface_parameters = Set(Some(interface_parameters));
    active.host_group_name = Set(host_group_name.to_string());
    active.updated_at = Set(Utc::now());
    active.update(db).await
}

pub async fn save_visible_name<C: ConnectionTrait>(
    db: &C,
    host: HostModel,
    visible_name: &str,
) -> Result<HostModel, sea_orm::DbErr> {
    let mut active: host::ActiveModel = host.into();
    active.visible_name = Set(visible_name.to_string());
    active.updated_at = Set(Utc::now());
    active.update(db).await
}

pub async fn delete_host_record<C: ConnectionTrait>(
    db: &C,
    host_id: i32,
) -> Result<(), sea_orm::DbErr> {
    Host::delete_by_id(host_id).exec(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;

    fn existing_host() -> HostModel {
        let now = Utc::now();
        HostModel {
            id: 1,
            settings_id: 1,
            name: "web-1".to_string(),
            visible_name: "abc123-web-1".to_string(),
            backend_id: None,
            host_group_name: String::new(),
            interface_parameters: None,
            scope_type: None,
            scope_id: None,
            state: ResourceState::Ok,
            error_message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_host_rejects_duplicate_name() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing_host()]])
            .into_connection();

        let result = create_host(
            &db,
            NewHost {
                settings_id: 1,
                name: Some("web-1".to_string()),
                scope_type: None,
                scope_id: None,
                host_group_name: None,
                interface_parameters: None,
                template_ids: vec![],
            },
            "another".to_string(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_host_rejects_overlong_name() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let result = create_host(
            &db,
            NewHost {
                settings_id: 1,
                name: Some("x".repeat(65)),
                scope_type: None,
                scope_id: None,
                host_group_name: None,
                interface_parameters: None,
                template_ids: vec![],
            },
            "visible".to_string(),
        )
        .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_transition_applies_when_gate_holds() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing_host()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let host = transition_host(&db, 1, LifecycleEvent::ScheduleDeletion)
            .await
            .unwrap();
        assert_eq!(host.state, ResourceState::DeletionScheduled);
    }

    #[tokio::test]
    async fn test_transition_rejected_when_state_moved_underneath() {
        // The read sees Ok, but by write time another transition already
        // claimed the row, so the conditional update matches nothing.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing_host()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let result = transition_host(&db, 1, LifecycleEvent::ScheduleDeletion).await;
        assert!(matches!(result, Err(AppError::StateConflict(_))));
    }

    #[tokio::test]
    async fn test_set_host_erred_persists_failure_message() {
        let mut deleting = existing_host();
        deleting.state = ResourceState::Deleting;
        let mut erred = existing_host();
        erred.state = ResourceState::Erred;
        erred.error_message = "remote delete refused".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![deleting], vec![erred]])
            .into_connection();

        set_host_erred(&db, 1, "remote delete refused").await.unwrap();

        let log = db.into_transaction_log();
        let update = format!("{:?}", log[1]);
        assert!(update.contains("ERRED"));
        assert!(update.contains("remote delete refused"));
    }
}
