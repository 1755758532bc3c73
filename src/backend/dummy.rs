//! No-op backend used by settings flagged `dummy` and by tests. A
//! first-class implementation of the backend seam: every mutation succeeds
//! and hands back generated identifiers, every query returns an empty or
//! perfect answer.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{
    BackendError, CreatedService, MonitoringBackend, ProvisionedHost, TriggerEvent,
};
use crate::db::entities::prelude::*;

#[derive(Default)]
pub struct DummyBackend {
    next_id: AtomicU64,
}

impl DummyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&self) -> String {
        format!("dummy-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl MonitoringBackend for DummyBackend {
    async fn sync(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn provision_host(&self, host: &HostModel) -> Result<ProvisionedHost, BackendError> {
        Ok(ProvisionedHost {
            backend_id: self.generate_id(),
            interface_parameters: host
                .interface_parameters
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
            host_group_name: host.host_group_name.clone(),
        })
    }

    async fn destroy_host(&self, _host: &HostModel) -> Result<(), BackendError> {
        Ok(())
    }

    async fn rename_host(&self, _backend_id: &str, _visible_name: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn create_itservice(
        &self,
        itservice: &ItserviceModel,
    ) -> Result<CreatedService, BackendError> {
        Ok(CreatedService {
            backend_id: self.generate_id(),
            backend_trigger_id: itservice.backend_trigger_id.clone(),
        })
    }

    async fn delete_itservice(&self, _backend_id: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get_sla(&self, _service_backend_id: &str, _from: i64, _to: i64) -> Result<f64, BackendError> {
        Ok(100.0)
    }

    async fn get_trigger_events(
        &self,
        _trigger_backend_id: &str,
        _from: i64,
        _to: i64,
    ) -> Result<Vec<TriggerEvent>, BackendError> {
        Ok(Vec::new())
    }

    async fn get_item_stats(
        &self,
        _host_backend_id: &str,
        _item: &ItemModel,
        points: &[i64],
    ) -> Result<Vec<Option<f64>>, BackendError> {
        Ok(vec![None; points.len()])
    }
}
