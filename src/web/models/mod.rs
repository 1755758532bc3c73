//! Request and response shapes for the HTTP surface.

use serde::{Deserialize, Serialize};

use crate::db::entities::prelude::*;
use crate::db::enums::{EventState, ResourceState, SlaAlgorithm, ValueType};
use crate::scope::ScopeRef;

// --- hosts ---

#[derive(Debug, Deserialize)]
pub struct CreateHostRequest {
    pub settings_id: i32,
    pub name: Option<String>,
    /// Required unless a scope is given; then derived from the scope.
    pub visible_name: Option<String>,
    pub scope: Option<ScopeRef>,
    pub host_group_name: Option<String>,
    pub interface_parameters: Option<serde_json::Value>,
    #[serde(default)]
    pub template_ids: Vec<i32>,
}

#[derive(Debug, Serialize)]
pub struct HostResponse {
    pub id: i32,
    pub settings_id: i32,
    pub name: String,
    pub visible_name: String,
    pub backend_id: Option<String>,
    pub host_group_name: String,
    pub scope: Option<ScopeRef>,
    pub state: ResourceState,
    pub error_message: String,
}

impl From<HostModel> for HostResponse {
    fn from(host: HostModel) -> Self {
        let scope = host.scope();
        HostResponse {
            id: host.id,
            settings_id: host.settings_id,
            name: host.name,
            visible_name: host.visible_name,
            backend_id: host.backend_id,
            host_group_name: host.host_group_name,
            scope,
            state: host.state,
            error_message: host.error_message,
        }
    }
}

// --- IT services ---

#[derive(Debug, Deserialize)]
pub struct CreateItserviceRequest {
    pub settings_id: i32,
    pub host_id: Option<i32>,
    pub name: String,
    pub algorithm: Option<i32>,
    #[serde(default)]
    pub sort_order: Option<i32>,
    pub agreed_sla: Option<f64>,
    pub trigger_id: Option<i32>,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Serialize)]
pub struct ItserviceResponse {
    pub id: i32,
    pub settings_id: i32,
    pub host_id: Option<i32>,
    pub name: String,
    pub algorithm: SlaAlgorithm,
    pub agreed_sla: Option<f64>,
    pub trigger_id: Option<i32>,
    pub backend_id: Option<String>,
    pub is_main: bool,
    pub state: ResourceState,
    pub error_message: String,
}

impl From<ItserviceModel> for ItserviceResponse {
    fn from(s: ItserviceModel) -> Self {
        ItserviceResponse {
            id: s.id,
            settings_id: s.settings_id,
            host_id: s.host_id,
            name: s.name,
            algorithm: s.algorithm,
            agreed_sla: s.agreed_sla,
            trigger_id: s.trigger_id,
            backend_id: s.backend_id,
            is_main: s.is_main,
            state: s.state,
            error_message: s.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlaEventsResponse {
    pub period: String,
    pub sla: Option<f64>,
    pub agreed_sla: Option<f64>,
    pub events: Vec<SlaEventResponse>,
}

#[derive(Debug, Serialize)]
pub struct SlaEventResponse {
    pub timestamp: i64,
    pub state: EventState,
}

// --- catalog ---

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub id: i32,
    pub settings_id: i32,
    pub name: String,
    pub backend_id: String,
}

impl From<TemplateModel> for TemplateResponse {
    fn from(t: TemplateModel) -> Self {
        TemplateResponse {
            id: t.id,
            settings_id: t.settings_id,
            name: t.name,
            backend_id: t.backend_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub id: i32,
    pub settings_id: i32,
    pub template_id: i32,
    pub name: String,
    pub backend_id: String,
}

impl From<TriggerModel> for TriggerResponse {
    fn from(t: TriggerModel) -> Self {
        TriggerResponse {
            id: t.id,
            settings_id: t.settings_id,
            template_id: t.template_id,
            name: t.name,
            backend_id: t.backend_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i32,
    pub template_id: i32,
    pub key: String,
    pub value_type: ValueType,
    pub units: String,
}

impl From<ItemModel> for ItemResponse {
    fn from(i: ItemModel) -> Self {
        ItemResponse {
            id: i.id,
            template_id: i.template_id,
            key: i.key,
            value_type: i.value_type,
            units: i.units,
        }
    }
}

// --- time series statistics ---

/// Sampling instants: either listed explicitly or derived by splitting a
/// range into a fixed number of evenly spaced points.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub item_key: String,
    /// Comma-separated unix timestamps.
    pub points: Option<String>,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub datapoints: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AggregateStatsRequest {
    pub host_ids: Vec<i32>,
    pub item_key: String,
    pub points: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub item_key: String,
    pub points: Vec<i64>,
    pub values: Vec<Option<f64>>,
}
