use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::ResourceState;

/// Remote host names are capped at 64 characters by the monitoring server.
pub const VISIBLE_NAME_MAX_LENGTH: usize = 64;

/// A provisioned monitored endpoint, optionally attached to a platform
/// resource ("scope") via a (scope_type, scope_id) tagged pair.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monitoring_hosts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub settings_id: i32,
    /// Immutable unique key sent to the remote server as the host identifier.
    pub name: String,
    /// Human-readable name shown by the remote server; re-derived when the
    /// scope is renamed. Unique per settings.
    pub visible_name: String,
    pub backend_id: Option<String>,
    pub host_group_name: String,
    /// Structured connection info: dns, ip, port, type, useip, main.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub interface_parameters: Option<Json>,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    pub state: ResourceState,
    pub error_message: String,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

impl Model {
    pub fn scope(&self) -> Option<crate::scope::ScopeRef> {
        match (&self.scope_type, &self.scope_id) {
            (Some(kind), Some(id)) => Some(crate::scope::ScopeRef {
                kind: kind.clone(),
                id: id.clone(),
            }),
            _ => None,
        }
    }
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

    #[sea_orm(has_many = "super::itservice::Entity")]
    Itservice,
}

impl Related<super::settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settings.def()
    }
}

impl Related<super::itservice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Itservice.def()
    }
}

impl Related<super::template::Entity> for Entity {
    fn to() -> RelationDef {
        super::host_template::Relation::Template.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::host_template::Relation::Host.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
