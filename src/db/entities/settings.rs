use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Connection configuration for one remote monitoring server instance.
/// Owned by the platform; this plugin only reads it (and merges cached
/// option defaults, see `crate::backend::BackendOptions`).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub backend_url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Free-form options: host_group_name, templates_names,
    /// interface_parameters, database_parameters, verify_tls.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub options: Option<Json>,
    /// Selects the no-op backend implementation instead of the real one.
    pub dummy: bool,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::template::Entity")]
    Template,
    #[sea_orm(has_many = "super::trigger::Entity")]
    Trigger,
    #[sea_orm(has_many = "super::host::Entity")]
    Host,
    #[sea_orm(has_many = "super::itservice::Entity")]
    Itservice,
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Template.def()
    }
}

impl Related<super::trigger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trigger.def()
    }
}

impl Related<super::host::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Host.def()
    }
}

impl Related<super::itservice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Itservice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
