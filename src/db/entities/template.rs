use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local mirror of a remote monitoring template. Created, updated and
/// deleted by the catalog reconciler only; never created by users.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_templates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub settings_id: i32,
    /// Remote primary key. Unique per settings.
    pub backend_id: String,
    pub name: String,
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

    #[sea_orm(has_many = "super::item::Entity")]
    Item,

    #[sea_orm(has_many = "super::trigger::Entity")]
    Trigger,
}

impl Related<super::settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settings.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::trigger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trigger.def()
    }
}

impl Related<super::host::Entity> for Entity {
    fn to() -> RelationDef {
        super::host_template::Relation::Host.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::host_template::Relation::Template.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
