//! SeaORM entities that map to the plugin's database tables.
//!
//! The template/item/trigger tables are read-only mirrors of the remote
//! server's catalog; hosts and IT services are provisioned resources with a
//! lifecycle state; the sla/scope tables are append-mostly history.

pub mod settings;
pub mod template;
pub mod item;
pub mod trigger;
pub mod host;
pub mod host_template;
pub mod itservice;
pub mod sla_history;
pub mod sla_history_event;
pub mod scope_sla;
pub mod scope_state_event;
pub mod scope_monitoring_item;

// Prelude module for easy importing of all entities and their related types
pub mod prelude {
    pub use super::settings::Entity as Settings;
    pub use super::settings::Model as SettingsModel;

    pub use super::template::Entity as Template;
    pub use super::template::Model as TemplateModel;
    pub use super::template::ActiveModel as TemplateActiveModel;
    pub use super::template::Column as TemplateColumn;

    pub use super::item::Entity as Item;
    pub use super::item::Model as ItemModel;
    pub use super::item::ActiveModel as ItemActiveModel;
    pub use super::item::Column as ItemColumn;

    pub use super::trigger::Entity as Trigger;
    pub use super::trigger::Model as TriggerModel;
    pub use super::trigger::ActiveModel as TriggerActiveModel;
    pub use super::trigger::Column as TriggerColumn;

    pub use super::host::Entity as Host;
    pub use super::host::Model as HostModel;
    pub use super::host::ActiveModel as HostActiveModel;
    pub use super::host::Column as HostColumn;

    pub use super::host_template::Entity as HostTemplate;
    pub use super::host_template::ActiveModel as HostTemplateActiveModel;
    pub use super::host_template::Column as HostTemplateColumn;

    pub use super::itservice::Entity as Itservice;
    pub use super::itservice::Model as ItserviceModel;
    pub use super::itservice::ActiveModel as ItserviceActiveModel;
    pub use super::itservice::Column as ItserviceColumn;

    pub use super::sla_history::Entity as SlaHistory;
    pub use super::sla_history::Model as SlaHistoryModel;
    pub use super::sla_history::ActiveModel as SlaHistoryActiveModel;
    pub use super::sla_history::Column as SlaHistoryColumn;

    pub use super::sla_history_event::Entity as SlaHistoryEvent;
    pub use super::sla_history_event::Model as SlaHistoryEventModel;
    pub use super::sla_history_event::ActiveModel as SlaHistoryEventActiveModel;
    pub use super::sla_history_event::Column as SlaHistoryEventColumn;

    pub use super::scope_sla::Entity as ScopeSla;
    pub use super::scope_sla::Model as ScopeSlaModel;
    pub use super::scope_sla::ActiveModel as ScopeSlaActiveModel;
    pub use super::scope_sla::Column as ScopeSlaColumn;

    pub use super::scope_state_event::Entity as ScopeStateEvent;
    pub use super::scope_state_event::Model as ScopeStateEventModel;
    pub use super::scope_state_event::ActiveModel as ScopeStateEventActiveModel;
    pub use super::scope_state_event::Column as ScopeStateEventColumn;

    pub use super::scope_monitoring_item::Entity as ScopeMonitoringItem;
    pub use super::scope_monitoring_item::Model as ScopeMonitoringItemModel;
    pub use super::scope_monitoring_item::ActiveModel as ScopeMonitoringItemActiveModel;
    pub use super::scope_monitoring_item::Column as ScopeMonitoringItemColumn;
}
