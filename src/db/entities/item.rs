use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::ValueType;

/// Local mirror of a remote metric definition, child of a template.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub template_id: i32,
    /// Remote primary key. Unique per template.
    pub backend_id: String,
    /// Remote item key, e.g. "system.cpu.util".
    pub key: String,
    pub name: String,
    pub value_type: ValueType,
    pub units: String,
    /// Retention of fine-grained history, in days.
    pub history: i32,
    /// Sample interval, in seconds.
    pub delay: i32,
}

impl Model {
    /// Byte-valued items are reported in megabytes by the stats sampler.
    pub fn is_byte(&self) -> bool {
        self.units == "B"
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::template::Entity",
        from = "Column::TemplateId",
        to = "super::template::Column::Id",
        on_delete = "Cascade"
    )]
    Template,
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
