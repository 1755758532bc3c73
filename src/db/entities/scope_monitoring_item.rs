use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Latest harvested metric value for a scope, one row per (scope, item key).
/// Written by the monitoring-item refresh job and the post-provisioning
/// poll; read by the owning platform's generic monitoring view.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_scope_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scope_type: String,
    pub scope_id: String,
    pub item_key: String,
    pub value: f64,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
