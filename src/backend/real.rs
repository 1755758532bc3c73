//! The real monitoring backend: JSON-RPC mutations, catalog
//! reconciliation and time-series sampling against one settings instance.

use std::sync::Arc;

use chrono::{Duration, Utc};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use super::api::RpcClient;
use super::history::{self, SeriesTable, HISTORY_DELAY_SECONDS, TREND_DELAY_SECONDS};
use super::{
    BackendError, BackendOptions, CreatedService, MonitoringBackend, ProvisionedHost, TriggerEvent,
};
use crate::db::entities::prelude::*;
use crate::db::enums::ValueType;
use crate::db::services::{catalog_service, host_service, itservice_service};

pub struct RealBackend {
    db: Arc<DatabaseConnection>,
    settings: SettingsModel,
    options: BackendOptions,
    api: OnceCell<RpcClient>,
}

impl RealBackend {
    pub fn new(db: Arc<DatabaseConnection>, settings: SettingsModel) -> Self {
        let options = BackendOptions::from_settings(&settings);
        Self {
            db,
            settings,
            options,
            api: OnceCell::new(),
        }
    }

    /// The RPC client is constructed lazily and cached for the backend's
    /// lifetime; login happens on first authenticated call.
    async fn api(&self) -> Result<&RpcClient, BackendError> {
        self.api
            .get_or_try_init(|| async {
                RpcClient::new(
                    &self.settings.backend_url,
                    &self.settings.username,
                    &self.settings.password,
                    self.options.verify_tls,
                )
            })
            .await
    }

    async fn pull_templates(&self) -> Result<(), BackendError> {
        debug!(settings = %self.settings.name, "pulling templates from monitoring server");
        let remote = self.api().await?.list_templates().await?;
        let writes = catalog_service::sync_templates(self.db.as_ref(), self.settings.id, &remote).await?;
        info!(settings = %self.settings.name, writes, "pulled {} templates", remote.len());
        Ok(())
    }

    /// Items and triggers per template. Individual template failures are
    /// logged and the remaining templates still sync; any failure surfaces
    /// as one aggregated error at the end.
    async fn pull_template_children(&self) -> Result<(), BackendError> {
        let templates = Template::find()
            .filter(TemplateColumn::SettingsId.eq(self.settings.id))
            .all(self.db.as_ref())
            .await?;

        let mut failures = 0;
        for template in &templates {
            if let Err(e) = self.pull_items(template).await {
                error!(template = %template.name, error = %e, "cannot pull items");
                failures += 1;
            }
            if let Err(e) = self.pull_triggers(template).await {
                error!(template = %template.name, error = %e, "cannot pull triggers");
                failures += 1;
            }
        }
        if failures > 0 {
            return Err(BackendError::SyncIncomplete(failures));
        }
        Ok(())
    }

    async fn pull_items(&self, template: &TemplateModel) -> Result<(), BackendError> {
        let remote = self.api().await?.list_items(&template.backend_id).await?;
        catalog_service::sync_items(self.db.as_ref(), template.id, &remote).await?;
        debug!(template = %template.name, "pulled {} items", remote.len());
        Ok(())
    }

    async fn pull_triggers(&self, template: &TemplateModel) -> Result<(), BackendError> {
        let remote = self.api().await?.list_triggers(&template.backend_id).await?;
        catalog_service::sync_triggers(self.db.as_ref(), self.settings.id, template.id, &remote).await?;
        debug!(template = %template.name, "pulled {} triggers", remote.len());
        Ok(())
    }

    async fn pull_itservices(&self) -> Result<(), BackendError> {
        let remote = self.api().await?.list_services().await?;
        let writes = catalog_service::sync_itservices(self.db.as_ref(), self.settings.id, &remote).await?;
        debug!(settings = %self.settings.name, writes, "pulled {} IT services", remote.len());
        Ok(())
    }

    /// The configured template names must exist locally after a pull, and
    /// the default host interface must be usable.
    async fn validate_configuration(&self) -> Result<(), BackendError> {
        for name in &self.options.templates_names {
            let found = Template::find()
                .filter(TemplateColumn::SettingsId.eq(self.settings.id))
                .filter(TemplateColumn::Name.eq(name.clone()))
                .one(self.db.as_ref())
                .await?;
            if found.is_none() {
                return Err(BackendError::Validation(format!(
                    "Cannot find template with name \"{name}\""
                )));
            }
        }
        let interface_empty = self
            .options
            .interface_parameters
            .as_object()
            .map(|o| o.is_empty())
            .unwrap_or(true);
        if interface_empty {
            return Err(BackendError::Validation(
                "Interface parameters should not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MonitoringBackend for RealBackend {
    async fn sync(&self) -> Result<(), BackendError> {
        self.api()
            .await?
            .get_or_create_group(&self.options.host_group_name)
            .await?;
        self.pull_templates().await?;
        self.pull_template_children().await?;
        self.pull_itservices().await?;
        self.validate_configuration().await?;
        info!(settings = %self.settings.name, "catalog synchronization finished");
        Ok(())
    }

    async fn provision_host(&self, host: &HostModel) -> Result<ProvisionedHost, BackendError> {
        let interface_parameters = host
            .interface_parameters
            .clone()
            .unwrap_or_else(|| self.options.interface_parameters.clone());
        let host_group_name = if host.host_group_name.is_empty() {
            self.options.host_group_name.clone()
        } else {
            host.host_group_name.clone()
        };

        let template_ids: Vec<String> = host_service::host_templates(self.db.as_ref(), host)
            .await?
            .into_iter()
            .map(|t| t.backend_id)
            .collect();

        let api = self.api().await?;
        let (group_id, _) = api.get_or_create_group(&host_group_name).await?;
        let (backend_id, created) = api
            .get_or_create_host(
                &host.name,
                &host.visible_name,
                &group_id,
                &template_ids,
                &interface_parameters,
            )
            .await?;
        if !created {
            warn!(host = %host.name, "host already exists on the monitoring server");
        }

        Ok(ProvisionedHost {
            backend_id,
            interface_parameters,
            host_group_name,
        })
    }

    async fn destroy_host(&self, host: &HostModel) -> Result<(), BackendError> {
        let backend_id = host.backend_id.as_deref().ok_or_else(|| {
            BackendError::Validation(format!("Host \"{}\" has no remote id", host.name))
        })?;

        // Remove the host's IT services first so the remote side never keeps
        // an SLA object pointing at a deleted host.
        let service_ids: Vec<String> =
            itservice_service::itservices_for_host(self.db.as_ref(), host.id)
                .await?
                .into_iter()
                .filter_map(|s| s.backend_id)
                .collect();
        let api = self.api().await?;
        api.delete_services(&service_ids).await?;
        api.delete_host(backend_id).await?;
        Ok(())
    }

    async fn rename_host(&self, backend_id: &str, visible_name: &str) -> Result<(), BackendError> {
        self.api()
            .await?
            .update_host(backend_id, serde_json::json!({"name": visible_name}))
            .await
    }

    async fn create_itservice(
        &self,
        itservice: &ItserviceModel,
    ) -> Result<CreatedService, BackendError> {
        // Resolve the remote trigger id through the mirror when only the
        // local link is known.
        let backend_trigger_id = match (&itservice.backend_trigger_id, itservice.trigger_id) {
            (Some(id), _) => Some(id.clone()),
            (None, Some(trigger_id)) => Trigger::find_by_id(trigger_id)
                .one(self.db.as_ref())
                .await?
                .map(|t| t.backend_id),
            (None, None) => None,
        };

        let algorithm = itservice.algorithm as i32;
        let backend_id = self
            .api()
            .await?
            .create_service(
                &itservice.name,
                algorithm,
                itservice.sort_order,
                itservice.agreed_sla,
                backend_trigger_id.as_deref(),
            )
            .await?;
        Ok(CreatedService {
            backend_id,
            backend_trigger_id,
        })
    }

    async fn delete_itservice(&self, backend_id: &str) -> Result<(), BackendError> {
        self.api()
            .await?
            .delete_services(&[backend_id.to_string()])
            .await
    }

    async fn get_sla(&self, service_backend_id: &str, from: i64, to: i64) -> Result<f64, BackendError> {
        self.api().await?.get_sla(service_backend_id, from, to).await
    }

    async fn get_trigger_events(
        &self,
        trigger_backend_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<TriggerEvent>, BackendError> {
        let events = self
            .api()
            .await?
            .get_trigger_events(trigger_backend_id, from, to)
            .await?;
        events
            .into_iter()
            .map(|e| {
                let timestamp = e.clock.parse().map_err(|_| {
                    BackendError::malformed("event.get", format!("bad clock \"{}\"", e.clock))
                })?;
                let value = e.value.parse().map_err(|_| {
                    BackendError::malformed("event.get", format!("bad value \"{}\"", e.value))
                })?;
                Ok(TriggerEvent { timestamp, value })
            })
            .collect()
    }

    async fn get_item_stats(
        &self,
        host_backend_id: &str,
        item: &ItemModel,
        points: &[i64],
    ) -> Result<Vec<Option<f64>>, BackendError> {
        let (history_table, trend_table) = match item.value_type {
            ValueType::Float => (SeriesTable::History, SeriesTable::Trends),
            ValueType::Unsigned => (SeriesTable::HistoryUint, SeriesTable::TrendsUint),
            _ => {
                return Err(BackendError::Validation(format!(
                    "Cannot get statistics for non-numerical item {}",
                    item.name
                )))
            }
        };
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let history_delay = if item.delay > 0 {
            item.delay as i64
        } else {
            HISTORY_DELAY_SECONDS
        };
        let history_start = (Utc::now() - Duration::days(item.history as i64)).timestamp();

        let earliest = points[0];
        let latest = points[points.len() - 1];
        let pool = history::pool_for(&self.options.database_parameters)?;
        let history_rows = history::fetch_series(
            &pool,
            history_table,
            &item.key,
            host_backend_id,
            earliest - history_delay,
            latest,
        )
        .await?;
        let trend_rows = history::fetch_series(
            &pool,
            trend_table,
            &item.key,
            host_backend_id,
            earliest - TREND_DELAY_SECONDS,
            latest,
        )
        .await?;

        Ok(history::sample_points(
            points,
            history_rows,
            trend_rows,
            history_start,
            history_delay,
            item.is_byte(),
        ))
    }
}
