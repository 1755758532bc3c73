use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-scope availability transition visible to the owning platform's
/// generic monitoring view. Inserted idempotently on the full tuple.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_scope_state_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub scope_type: String,
    pub scope_id: String,
    pub period: String,
    pub timestamp: i64,
    pub is_up: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
