use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::EventState;

/// One up/down transition reconstructed from remote trigger events.
/// Inserted idempotently: (history, timestamp, state) is the dedup key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_sla_history_events")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub history_id: i32,
    pub timestamp: i64,
    pub state: EventState,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sla_history::Entity",
        from = "Column::HistoryId",
        to = "super::sla_history::Column::Id",
        on_delete = "Cascade"
    )]
    SlaHistory,
}

impl Related<super::sla_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SlaHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
