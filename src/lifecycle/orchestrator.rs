//! Asynchronous provisioning, update and destruction of hosts and IT
//! services.
//!
//! Every operation is a short task chain: a primary task whose typed result
//! selects exactly one continuation, success or failure, never both. Chains
//! run on the shared runtime via `tokio::spawn`; the caller never blocks on
//! a remote round trip. Within one resource's chain steps run strictly in
//! order; across resources there is no ordering guarantee.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::backend::{backend_for_settings, MonitoringBackend};
use crate::db::entities::prelude::*;
use crate::db::services::{host_service, itservice_service, sla_service};
use crate::lifecycle::LifecycleEvent;
use crate::scope::{visible_name_from_scope, ScopeRegistry};
use crate::web::error::AppError;

/// Post-provisioning poll: bounded retry, not infinite.
const ITEM_POLL_MAX_ATTEMPTS: u32 = 60;
const ITEM_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn a primary task with disjoint success and failure continuations.
pub fn spawn_chain<T, Task, Success, Failure, SuccessFut, FailureFut>(
    task: Task,
    on_success: Success,
    on_failure: Failure,
) where
    T: Send + 'static,
    Task: Future<Output = Result<T, AppError>> + Send + 'static,
    Success: FnOnce(T) -> SuccessFut + Send + 'static,
    Failure: FnOnce(AppError) -> FailureFut + Send + 'static,
    SuccessFut: Future<Output = ()> + Send + 'static,
    FailureFut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        match task.await {
            Ok(value) => on_success(value).await,
            Err(e) => on_failure(e).await,
        }
    });
}

/// Whether a destroy request needs a remote call at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyPlan {
    /// Never provisioned remotely; delete the local record directly.
    LocalOnly,
    /// Deprovision remotely first, delete locally only on success.
    Remote,
}

pub fn destroy_plan(backend_id: Option<&str>) -> DestroyPlan {
    match backend_id {
        Some(id) if !id.is_empty() => DestroyPlan::Remote,
        _ => DestroyPlan::LocalOnly,
    }
}

/// How the orchestrator obtains an adapter for a settings record. The
/// default is `backend_for_settings`; tests substitute failing adapters.
pub type BackendFactory =
    Arc<dyn Fn(Arc<DatabaseConnection>, &SettingsModel) -> Arc<dyn MonitoringBackend> + Send + Sync>;

#[derive(Clone)]
pub struct Orchestrator {
    db: Arc<DatabaseConnection>,
    scopes: Arc<ScopeRegistry>,
    backend_factory: BackendFactory,
}

impl Orchestrator {
    pub fn new(db: Arc<DatabaseConnection>, scopes: Arc<ScopeRegistry>) -> Self {
        Self::with_backend_factory(db, scopes, Arc::new(backend_for_settings))
    }

    pub fn with_backend_factory(
        db: Arc<DatabaseConnection>,
        scopes: Arc<ScopeRegistry>,
        backend_factory: BackendFactory,
    ) -> Self {
        Self {
            db,
            scopes,
            backend_factory,
        }
    }

    async fn backend_for(&self, settings_id: i32) -> Result<Arc<dyn MonitoringBackend>, AppError> {
        let settings = Settings::find_by_id(settings_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Settings {settings_id} not found")))?;
        Ok((self.backend_factory)(self.db.clone(), &settings))
    }

    // --- hosts ---

    /// Begin-creating, create remotely, store the assigned identifiers.
    async fn provision_host_task(&self, host_id: i32) -> Result<(), AppError> {
        let host = host_service::transition_host(self.db.as_ref(), host_id, LifecycleEvent::BeginCreating)
            .await?;
        let backend = self.backend_for(host.settings_id).await?;
        let provisioned = backend.provision_host(&host).await?;
        host_service::save_provisioned(
            self.db.as_ref(),
            host,
            &provisioned.backend_id,
            provisioned.interface_parameters,
            &provisioned.host_group_name,
        )
        .await?;
        Ok(())
    }

    /// Schedule the full provisioning chain for a host already in
    /// `CreationScheduled`.
    pub fn schedule_host_provisioning(&self, host_id: i32) {
        let this = self.clone();
        let on_success = {
            let this = self.clone();
            move |_| async move {
                match host_service::transition_host(this.db.as_ref(), host_id, LifecycleEvent::SetOk).await {
                    Ok(host) => {
                        info!(host = %host.name, "host provisioned");
                        this.spawn_item_poll(host_id);
                    }
                    Err(e) => error!(host_id, error = %e, "cannot set host online"),
                }
            }
        };
        let on_failure = {
            let this = self.clone();
            move |e: AppError| async move {
                warn!(host_id, error = %e, "host provisioning failed");
                if let Err(persist) =
                    host_service::set_host_erred(this.db.as_ref(), host_id, &e.to_string()).await
                {
                    error!(host_id, error = %persist, "cannot record host failure");
                }
            }
        };
        spawn_chain(
            async move { this.provision_host_task(host_id).await },
            on_success,
            on_failure,
        );
    }

    /// Begin-deleting, deprovision remotely, drop the local record.
    async fn destroy_host_task(&self, host_id: i32) -> Result<(), AppError> {
        let host = host_service::transition_host(self.db.as_ref(), host_id, LifecycleEvent::BeginDeleting)
            .await?;
        let backend = self.backend_for(host.settings_id).await?;
        backend.destroy_host(&host).await?;
        host_service::delete_host_record(self.db.as_ref(), host_id).await?;
        Ok(())
    }

    /// Destroy a host. A host that never received a remote id is deleted
    /// locally with no remote call; otherwise the remote object is removed
    /// first and an adapter failure leaves the record in Erred, not deleted.
    pub async fn destroy_host(&self, host_id: i32) -> Result<(), AppError> {
        let host = host_service::get_host(self.db.as_ref(), host_id).await?;
        match destroy_plan(host.backend_id.as_deref()) {
            DestroyPlan::LocalOnly => {
                host_service::delete_host_record(self.db.as_ref(), host_id).await?;
                info!(host = %host.name, "host deleted locally, never provisioned");
                Ok(())
            }
            DestroyPlan::Remote => {
                host_service::transition_host(self.db.as_ref(), host_id, LifecycleEvent::ScheduleDeletion)
                    .await?;
                let this = self.clone();
                let on_failure = {
                    let this = self.clone();
                    move |e: AppError| async move {
                        warn!(host_id, error = %e, "host deprovisioning failed, keeping record");
                        if let Err(persist) =
                            host_service::set_host_erred(this.db.as_ref(), host_id, &e.to_string()).await
                        {
                            error!(host_id, error = %persist, "cannot record host failure");
                        }
                    }
                };
                spawn_chain(
                    async move { this.destroy_host_task(host_id).await },
                    move |_| async move { info!(host_id, "host deprovisioned and deleted") },
                    on_failure,
                );
                Ok(())
            }
        }
    }

    /// Bypass the state machine and remove the local record, marking a
    /// non-terminal resource Erred first for traceability. Used when the
    /// owning scope is already gone or the resource is stuck.
    pub async fn force_destroy_host(&self, host_id: i32) -> Result<(), AppError> {
        let host = host_service::get_host(self.db.as_ref(), host_id).await?;
        if !host.state.is_stable() {
            warn!(host = %host.name, state = %host.state, "force-deleting host mid-transition");
            host_service::set_host_erred(self.db.as_ref(), host_id, "Force-deleted while mid-transition")
                .await?;
        }
        host_service::delete_host_record(self.db.as_ref(), host_id).await?;
        Ok(())
    }

    /// Recompute the visible name from the scope; when it changed, rename
    /// remotely and save locally through an update chain.
    pub async fn update_host_visible_name(&self, host_id: i32) -> Result<(), AppError> {
        let host = host_service::get_host(self.db.as_ref(), host_id).await?;
        let Some(scope) = host.scope() else {
            return Ok(());
        };
        let info = self.scopes.resolve(&scope).await?;
        let new_visible_name = visible_name_from_scope(&info);
        if new_visible_name == host.visible_name {
            return Ok(());
        }

        host_service::transition_host(self.db.as_ref(), host_id, LifecycleEvent::ScheduleUpdate).await?;
        let this = self.clone();
        let task = async move {
            let host =
                host_service::transition_host(this.db.as_ref(), host_id, LifecycleEvent::BeginUpdating)
                    .await?;
            if let Some(backend_id) = host.backend_id.as_deref() {
                let backend = this.backend_for(host.settings_id).await?;
                backend.rename_host(backend_id, &new_visible_name).await?;
            }
            host_service::save_visible_name(this.db.as_ref(), host, &new_visible_name).await?;
            host_service::transition_host(this.db.as_ref(), host_id, LifecycleEvent::SetOk).await?;
            Ok(())
        };
        let on_failure = {
            let this = self.clone();
            move |e: AppError| async move {
                warn!(host_id, error = %e, "visible name update failed");
                if let Err(persist) =
                    host_service::set_host_erred(this.db.as_ref(), host_id, &e.to_string()).await
                {
                    error!(host_id, error = %persist, "cannot record host failure");
                }
            }
        };
        spawn_chain(
            task,
            move |_| async move { info!(host_id, "host visible name updated") },
            on_failure,
        );
        Ok(())
    }

    // --- monitoring item harvest ---

    /// One harvest pass: sample every numeric item of the host's templates
    /// at the current instant and store values on the owning scope.
    /// Returns the number of values stored.
    pub async fn harvest_monitoring_items(&self, host_id: i32) -> Result<usize, AppError> {
        let host = host_service::get_host(self.db.as_ref(), host_id).await?;
        let Some(backend_id) = host.backend_id.clone() else {
            return Ok(0);
        };
        let Some(scope) = host.scope() else {
            return Ok(0);
        };
        let backend = self.backend_for(host.settings_id).await?;

        let now = Utc::now().timestamp();
        let mut stored = 0;
        for template in host_service::host_templates(self.db.as_ref(), &host).await? {
            let items = Item::find()
                .filter(ItemColumn::TemplateId.eq(template.id))
                .all(self.db.as_ref())
                .await?;
            for item in items.iter().filter(|i| i.value_type.is_numeric()) {
                match backend.get_item_stats(&backend_id, item, &[now]).await {
                    Ok(values) => {
                        if let Some(Some(value)) = values.first() {
                            sla_service::upsert_scope_monitoring_item(
                                self.db.as_ref(), &scope, &item.key, *value,
                            )
                            .await?;
                            stored += 1;
                        }
                    }
                    Err(e) => {
                        warn!(host = %host.name, item = %item.key, error = %e, "item harvest failed");
                    }
                }
            }
        }
        Ok(stored)
    }

    /// After provisioning, the monitoring server takes a while to produce
    /// the first samples. Poll on a fixed interval until a value appears or
    /// the retry budget is exhausted.
    fn spawn_item_poll(&self, host_id: i32) {
        let this = self.clone();
        tokio::spawn(async move {
            for attempt in 1..=ITEM_POLL_MAX_ATTEMPTS {
                sleep(ITEM_POLL_INTERVAL).await;
                match this.harvest_monitoring_items(host_id).await {
                    Ok(stored) if stored > 0 => {
                        info!(host_id, attempt, stored, "first monitoring values harvested");
                        return;
                    }
                    Ok(_) => {}
                    Err(AppError::NotFound(_)) => return,
                    Err(e) => warn!(host_id, attempt, error = %e, "item poll failed"),
                }
            }
            warn!(host_id, "no monitoring values after {} attempts", ITEM_POLL_MAX_ATTEMPTS);
        });
    }

    // --- IT services ---

    async fn provision_itservice_task(&self, itservice_id: i32) -> Result<(), AppError> {
        let itservice = itservice_service::transition_itservice(
            self.db.as_ref(),
            itservice_id,
            LifecycleEvent::BeginCreating,
        )
        .await?;
        let backend = self.backend_for(itservice.settings_id).await?;
        let created = backend.create_itservice(&itservice).await?;
        itservice_service::save_created(
            self.db.as_ref(),
            itservice,
            &created.backend_id,
            created.backend_trigger_id,
        )
        .await?;
        Ok(())
    }

    pub fn schedule_itservice_provisioning(&self, itservice_id: i32) {
        let this = self.clone();
        let on_success = {
            let this = self.clone();
            move |_| async move {
                match itservice_service::transition_itservice(
                    this.db.as_ref(),
                    itservice_id,
                    LifecycleEvent::SetOk,
                )
                .await
                {
                    Ok(itservice) => info!(itservice = %itservice.name, "IT service created"),
                    Err(e) => error!(itservice_id, error = %e, "cannot set IT service online"),
                }
            }
        };
        let on_failure = {
            let this = self.clone();
            move |e: AppError| async move {
                warn!(itservice_id, error = %e, "IT service creation failed");
                if let Err(persist) =
                    itservice_service::set_itservice_erred(this.db.as_ref(), itservice_id, &e.to_string())
                        .await
                {
                    error!(itservice_id, error = %persist, "cannot record IT service failure");
                }
            }
        };
        spawn_chain(
            async move { this.provision_itservice_task(itservice_id).await },
            on_success,
            on_failure,
        );
    }

    async fn destroy_itservice_task(&self, itservice_id: i32) -> Result<(), AppError> {
        let itservice = itservice_service::transition_itservice(
            self.db.as_ref(),
            itservice_id,
            LifecycleEvent::BeginDeleting,
        )
        .await?;
        if let Some(backend_id) = itservice.backend_id.as_deref() {
            let backend = self.backend_for(itservice.settings_id).await?;
            backend.delete_itservice(backend_id).await?;
        }
        itservice_service::delete_itservice_record(self.db.as_ref(), itservice_id).await?;
        Ok(())
    }

    pub async fn destroy_itservice(&self, itservice_id: i32) -> Result<(), AppError> {
        let itservice = itservice_service::get_itservice(self.db.as_ref(), itservice_id).await?;
        match destroy_plan(itservice.backend_id.as_deref()) {
            DestroyPlan::LocalOnly => {
                itservice_service::delete_itservice_record(self.db.as_ref(), itservice_id).await?;
                Ok(())
            }
            DestroyPlan::Remote => {
                itservice_service::transition_itservice(
                    self.db.as_ref(),
                    itservice_id,
                    LifecycleEvent::ScheduleDeletion,
                )
                .await?;
                let this = self.clone();
                let on_failure = {
                    let this = self.clone();
                    move |e: AppError| async move {
                        warn!(itservice_id, error = %e, "IT service deletion failed");
                        if let Err(persist) = itservice_service::set_itservice_erred(
                            this.db.as_ref(),
                            itservice_id,
                            &e.to_string(),
                        )
                        .await
                        {
                            error!(itservice_id, error = %persist, "cannot record IT service failure");
                        }
                    }
                };
                spawn_chain(
                    async move { this.destroy_itservice_task(itservice_id).await },
                    move |_| async move { info!(itservice_id, "IT service deleted") },
                    on_failure,
                );
                Ok(())
            }
        }
    }

    pub async fn force_destroy_itservice(&self, itservice_id: i32) -> Result<(), AppError> {
        let itservice = itservice_service::get_itservice(self.db.as_ref(), itservice_id).await?;
        if !itservice.state.is_stable() {
            warn!(itservice = %itservice.name, state = %itservice.state, "force-deleting IT service mid-transition");
            itservice_service::set_itservice_erred(
                self.db.as_ref(),
                itservice_id,
                "Force-deleted while mid-transition",
            )
            .await?;
        }
        itservice_service::delete_itservice_record(self.db.as_ref(), itservice_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use crate::backend::{BackendError, CreatedService, ProvisionedHost, TriggerEvent};
    use crate::db::enums::ResourceState;

    /// Adapter whose remote mutations always fail.
    struct UnreachableBackend;

    #[async_trait]
    impl MonitoringBackend for UnreachableBackend {
        async fn sync(&self) -> Result<(), BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }

        async fn provision_host(&self, _: &HostModel) -> Result<ProvisionedHost, BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }

        async fn destroy_host(&self, _: &HostModel) -> Result<(), BackendError> {
            Err(BackendError::Validation("remote delete refused".to_string()))
        }

        async fn rename_host(&self, _: &str, _: &str) -> Result<(), BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }

        async fn create_itservice(
            &self,
            _: &ItserviceModel,
        ) -> Result<CreatedService, BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }

        async fn delete_itservice(&self, _: &str) -> Result<(), BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }

        async fn get_sla(&self, _: &str, _: i64, _: i64) -> Result<f64, BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }

        async fn get_trigger_events(
            &self,
            _: &str,
            _: i64,
            _: i64,
        ) -> Result<Vec<TriggerEvent>, BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }

        async fn get_item_stats(
            &self,
            _: &str,
            _: &ItemModel,
            _: &[i64],
        ) -> Result<Vec<Option<f64>>, BackendError> {
            Err(BackendError::Validation("unreachable".to_string()))
        }
    }

    fn unreachable_factory(
        _: Arc<DatabaseConnection>,
        _: &SettingsModel,
    ) -> Arc<dyn MonitoringBackend> {
        Arc::new(UnreachableBackend)
    }

    fn provisioned_host(state: ResourceState) -> HostModel {
        HostModel {
            id: 1,
            settings_id: 1,
            name: "host-7".to_string(),
            visible_name: "7-db01".to_string(),
            backend_id: Some("10105".to_string()),
            host_group_name: "monitor-bridge".to_string(),
            interface_parameters: None,
            scope_type: Some("vps".to_string()),
            scope_id: Some("7".to_string()),
            state,
            error_message: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn settings_row() -> SettingsModel {
        SettingsModel {
            id: 1,
            name: "test".to_string(),
            backend_url: "https://monitoring.example.com/api_jsonrpc.php".to_string(),
            username: "admin".to_string(),
            password: "zabbix".to_string(),
            options: None,
            dummy: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_destroy_plan_requires_backend_id() {
        assert_eq!(destroy_plan(None), DestroyPlan::LocalOnly);
        assert_eq!(destroy_plan(Some("")), DestroyPlan::LocalOnly);
        assert_eq!(destroy_plan(Some("10105")), DestroyPlan::Remote);
    }

    #[tokio::test]
    async fn test_spawn_chain_runs_exactly_one_continuation() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let success_runs = Arc::new(AtomicU32::new(0));
        let failure_runs = Arc::new(AtomicU32::new(0));

        let (s, f) = (success_runs.clone(), failure_runs.clone());
        spawn_chain(
            async { Ok::<_, AppError>(42) },
            move |v| async move {
                assert_eq!(v, 42);
                s.fetch_add(1, Ordering::SeqCst);
            },
            move |_| async move {
                f.fetch_add(1, Ordering::SeqCst);
            },
        );

        let (s, f) = (success_runs.clone(), failure_runs.clone());
        spawn_chain(
            async { Err::<u32, _>(AppError::InvalidInput("boom".to_string())) },
            move |_| async move {
                s.fetch_add(1, Ordering::SeqCst);
            },
            move |_| async move {
                f.fetch_add(1, Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(success_runs.load(Ordering::SeqCst), 1);
        assert_eq!(failure_runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_delete_failure_keeps_local_record() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![provisioned_host(ResourceState::DeletionScheduled)]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .append_query_results([vec![settings_row()]])
                .into_connection(),
        );
        let orchestrator = Orchestrator::with_backend_factory(
            db.clone(),
            Arc::new(ScopeRegistry::new()),
            Arc::new(unreachable_factory),
        );

        let err = orchestrator.destroy_host_task(1).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));

        // The local row must survive an adapter failure: the chain moved the
        // host to Deleting and errored before any local DELETE was issued.
        drop(orchestrator);
        let log = Arc::try_unwrap(db)
            .unwrap_or_else(|_| panic!("connection still shared"))
            .into_transaction_log();
        assert!(log
            .iter()
            .all(|statement| !format!("{statement:?}").contains("DELETE")));
    }
}
