use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Simplified per-scope SLA summary visible to the owning platform's generic
/// monitoring view. Written by the aggregator for `is_main` IT services only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_scope_slas")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scope_type: String,
    pub scope_id: String,
    pub period: String,
    pub value: Option<f64>,
    pub agreed_sla: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
