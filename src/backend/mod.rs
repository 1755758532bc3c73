//! Adapter layer for the remote monitoring server.
//!
//! `MonitoringBackend` is the seam between this plugin and the server: the
//! real implementation speaks JSON-RPC plus a raw SQL path into the server's
//! time-series tables; the dummy implementation is a first-class no-op used
//! by tests and by settings flagged as `dummy`.

pub mod api;
pub mod dummy;
pub mod history;
pub mod real;

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::db::entities::prelude::*;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request to monitoring server failed during {operation}: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Monitoring server returned an error during {operation}: {message}")]
    Api { operation: String, message: String },
    #[error("Malformed response during {operation}: {detail}")]
    MalformedResponse { operation: String, detail: String },
    #[error("Monitoring database query failed: {0}")]
    TimeSeriesDb(#[from] sqlx::Error),
    #[error("Local database error: {0}")]
    LocalDb(#[from] sea_orm::DbErr),
    #[error("{0}")]
    Validation(String),
    #[error("Synchronization finished with {0} failed sub-pull(s)")]
    SyncIncomplete(usize),
}

impl BackendError {
    pub fn malformed(operation: &str, detail: impl Into<String>) -> Self {
        BackendError::MalformedResponse {
            operation: operation.to_string(),
            detail: detail.into(),
        }
    }
}

/// Options merged from the settings record's `options` JSON over built-in
/// defaults. Cached on the backend for its lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendOptions {
    pub host_group_name: String,
    pub templates_names: Vec<String>,
    pub interface_parameters: serde_json::Value,
    pub database_parameters: DatabaseParameters,
    /// TLS certificate verification for the RPC endpoint. Disabling it is an
    /// explicit trust decision and is logged at startup.
    pub verify_tls: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseParameters {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            host_group_name: "monitor-bridge".to_string(),
            templates_names: vec!["Monitor Bridge".to_string()],
            interface_parameters: json!({
                "dns": "",
                "ip": "0.0.0.0",
                "main": 1,
                "port": "10050",
                "type": 1,
                "useip": 1,
            }),
            database_parameters: DatabaseParameters {
                host: "localhost".to_string(),
                port: 3306,
                name: "zabbix".to_string(),
                user: "admin".to_string(),
                password: String::new(),
            },
            verify_tls: true,
        }
    }
}

impl BackendOptions {
    /// Merge the settings record's options JSON over the defaults. Unknown
    /// keys are ignored; absent keys keep their default.
    pub fn from_settings(settings: &SettingsModel) -> Self {
        let mut options = Self::default();
        let Some(raw) = settings.options.as_ref() else {
            return options;
        };
        if let Some(name) = raw.get("host_group_name").and_then(|v| v.as_str()) {
            options.host_group_name = name.to_string();
        }
        if let Some(names) = raw.get("templates_names").and_then(|v| v.as_array()) {
            options.templates_names = names
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        }
        if let Some(params) = raw.get("interface_parameters") {
            options.interface_parameters = params.clone();
        }
        if let Some(params) = raw.get("database_parameters") {
            if let Ok(parsed) = serde_json::from_value(params.clone()) {
                options.database_parameters = parsed;
            }
        }
        if let Some(verify) = raw.get("verify_tls").and_then(|v| v.as_bool()) {
            options.verify_tls = verify;
        }
        options
    }
}

/// Result of provisioning a host remotely.
#[derive(Debug, Clone)]
pub struct ProvisionedHost {
    pub backend_id: String,
    /// Interface parameters and group actually used, written back onto the
    /// host record so later operations do not depend on settings drift.
    pub interface_parameters: serde_json::Value,
    pub host_group_name: String,
}

/// Result of creating an IT service remotely.
#[derive(Debug, Clone)]
pub struct CreatedService {
    pub backend_id: String,
    pub backend_trigger_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub timestamp: i64,
    /// Remote trigger value: 0 means OK (up), anything else is a problem.
    pub value: i64,
}

#[async_trait]
pub trait MonitoringBackend: Send + Sync {
    /// Full catalog reconciliation: templates, items, triggers, IT services.
    async fn sync(&self) -> Result<(), BackendError>;

    async fn provision_host(&self, host: &HostModel) -> Result<ProvisionedHost, BackendError>;
    async fn destroy_host(&self, host: &HostModel) -> Result<(), BackendError>;
    async fn rename_host(&self, backend_id: &str, visible_name: &str) -> Result<(), BackendError>;

    async fn create_itservice(&self, itservice: &ItserviceModel) -> Result<CreatedService, BackendError>;
    async fn delete_itservice(&self, backend_id: &str) -> Result<(), BackendError>;

    async fn get_sla(&self, service_backend_id: &str, from: i64, to: i64) -> Result<f64, BackendError>;
    async fn get_trigger_events(
        &self,
        trigger_backend_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<TriggerEvent>, BackendError>;

    /// One value per requested timestamp, most recent sample at or before
    /// each point, merged from history and trend tiers. `points` must be
    /// strictly increasing; callers validate before reaching this seam.
    async fn get_item_stats(
        &self,
        host_backend_id: &str,
        item: &ItemModel,
        points: &[i64],
    ) -> Result<Vec<Option<f64>>, BackendError>;
}

/// Strategy selection: the dummy backend is chosen by the settings flag,
/// everything else gets the real JSON-RPC backend.
pub fn backend_for_settings(
    db: Arc<DatabaseConnection>,
    settings: &SettingsModel,
) -> Arc<dyn MonitoringBackend> {
    if settings.dummy {
        Arc::new(dummy::DummyBackend::new())
    } else {
        Arc::new(real::RealBackend::new(db, settings.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn settings_with_options(options: Option<serde_json::Value>) -> SettingsModel {
        SettingsModel {
            id: 1,
            name: "test".to_string(),
            backend_url: "https://monitoring.example.com/api_jsonrpc.php".to_string(),
            username: "admin".to_string(),
            password: "zabbix".to_string(),
            options,
            dummy: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_options_defaults_when_absent() {
        let options = BackendOptions::from_settings(&settings_with_options(None));
        assert_eq!(options.host_group_name, "monitor-bridge");
        assert_eq!(options.database_parameters.port, 3306);
        assert!(options.verify_tls);
    }

    #[test]
    fn test_options_merge_over_defaults() {
        let options = BackendOptions::from_settings(&settings_with_options(Some(json!({
            "host_group_name": "acme",
            "templates_names": ["Linux", "App"],
            "verify_tls": false,
        }))));
        assert_eq!(options.host_group_name, "acme");
        assert_eq!(options.templates_names, vec!["Linux", "App"]);
        assert!(!options.verify_tls);
        // untouched keys keep their defaults
        assert_eq!(options.database_parameters.name, "zabbix");
    }
}
