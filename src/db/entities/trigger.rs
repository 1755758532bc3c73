use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Local mirror of a remote alerting condition, child of a template.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_triggers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub settings_id: i32,
    pub template_id: i32,
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

    #[sea_orm(
        belongs_to = "super::template::Entity",
        from = "Column::TemplateId",
        to = "super::template::Column::Id",
        on_delete = "Cascade"
    )]
    Template,
}

impl Related<super::settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settings.def()
    }
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
