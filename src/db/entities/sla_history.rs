use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Computed SLA attainment for one IT service over one period
/// ("YYYY-MM" for monthly, "YYYY" for yearly). The value is overwritten on
/// every aggregator run for the current period.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_sla_histories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub itservice_id: i32,
    pub period: String,
    pub value: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::itservice::Entity",
        from = "Column::ItserviceId",
        to = "super::itservice::Column::Id",
        on_delete = "Cascade"
    )]
    Itservice,

    #[sea_orm(has_many = "super::sla_history_event::Entity")]
    SlaHistoryEvent,
}

impl Related<super::itservice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Itservice.def()
    }
}

impl Related<super::sla_history_event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SlaHistoryEvent.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
