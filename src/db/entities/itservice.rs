use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::{ResourceState, SlaAlgorithm};

/// A remote business-service object used to compute aggregate SLA for a
/// host or a business grouping. At most one `is_main` service per host; its
/// SLA is copied onto the owning scope's monitoring summary.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_itservices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub settings_id: i32,
    pub host_id: Option<i32>,
    pub name: String,
    pub algorithm: SlaAlgorithm,
    pub sort_order: i32,
    /// Agreed SLA target in percent, 4 decimal places of precision.
    pub agreed_sla: Option<f64>,
    pub trigger_id: Option<i32>,
    /// Remote id of the linked trigger, kept alongside the local link so the
    /// aggregator can query events even while the mirror is being refreshed.
    pub backend_trigger_id: Option<String>,
    pub backend_id: Option<String>,
    pub is_main: bool,
    pub state: ResourceState,
    pub error_message: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::settings::Entity",
        from = "Column::SettingsId",
        to = "super::settings::Column::Id",
        on_delete = "Cascade"
    )]
    Settings,

    #[sea_orm(
        belongs_to = "super::host::Entity",
        from = "Column::HostId",
        to = "super::host::Column::Id",
        on_delete = "Cascade"
    )]
    Host,

    #[sea_orm(
        belongs_to = "super::trigger::Entity",
        from = "Column::TriggerId",
        to = "super::trigger::Column::Id",
        on_delete = "SetNull"
    )]
    Trigger,

    #[sea_orm(has_many = "super::sla_history::Entity")]
    SlaHistory,
}

impl Related<super::settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settings.def()
    }
}

impl Related<super::host::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Host.def()
    }
}

impl Related<super::trigger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trigger.def()
    }
}

impl Related<super::sla_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SlaHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
