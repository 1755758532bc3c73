//! Mirror maintenance for the remote catalog (templates, items, triggers,
//! IT services). All writes here are derived purely from remote server
//! truth, which keeps the reconciler idempotent: running it twice with no
//! remote change performs zero writes the second time.

use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::debug;

use crate::backend::api::{parse_remote_int, RemoteItem, RemoteTemplate, RemoteTrigger};
use crate::db::entities::{item, prelude::*, template, trigger};
use crate::db::enums::ValueType;

/// Ids of local mirror rows whose `backend_id` vanished remotely.
/// A remote disappearance always wins over local staleness.
pub fn stale_row_ids(local: &[(i32, String)], remote_ids: &HashSet<String>) -> Vec<i32> {
    local
        .iter()
        .filter(|(_, backend_id)| !remote_ids.contains(backend_id))
        .map(|(id, _)| *id)
        .collect()
}

/// Upsert the template mirror for one settings instance against the remote
/// list. Returns the number of rows written (created, renamed or deleted).
pub async fn sync_templates<C: ConnectionTrait>(
    db: &C,
    settings_id: i32,
    remote: &[RemoteTemplate],
) -> Result<usize, sea_orm::DbErr> {
    let remote_ids: HashSet<String> = remote.iter().map(|t| t.template_id.clone()).collect();

    let local = Template::find()
        .filter(TemplateColumn::SettingsId.eq(settings_id))
        .all(db)
        .await?;
    let local_pairs: Vec<(i32, String)> =
        local.iter().map(|t| (t.id, t.backend_id.clone())).collect();
    let by_backend_id: HashMap<String, &TemplateModel> =
        local.iter().map(|t| (t.backend_id.clone(), t)).collect();

    let mut writes = 0;

    let stale = stale_row_ids(&local_pairs, &remote_ids);
    if !stale.is_empty() {
        writes += Template::delete_many()
            .filter(TemplateColumn::Id.is_in(stale))
            .exec(db)
            .await?
            .rows_affected as usize;
    }

    for remote_template in remote {
        match by_backend_id.get(&remote_template.template_id) {
            None => {
                template::ActiveModel {
                    settings_id: Set(settings_id),
                    backend_id: Set(remote_template.template_id.clone()),
                    name: Set(remote_template.name.clone()),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                writes += 1;
            }
            // Remote value wins a name collision.
            Some(existing) if existing.name != remote_template.name => {
                let mut active: template::ActiveModel = (*existing).clone().into();
                active.name = Set(remote_template.name.clone());
                active.update(db).await?;
                writes += 1;
            }
            Some(_) => {}
        }
    }

    debug!(settings_id, writes, "template mirror synchronized");
    Ok(writes)
}

/// Mapped fields of an item mirror, extracted once so the upsert can compare
/// every field and only write when at least one differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub key: String,
    pub name: String,
    pub value_type: ValueType,
    pub units: String,
    pub history: i32,
    pub delay: i32,
}

impl ItemFields {
    /// None when the remote payload carries a value type this plugin does
    /// not know; such items are skipped by the caller.
    pub fn from_remote(remote: &RemoteItem) -> Option<Self> {
        let value_type = parse_remote_int(&remote.value_type)
            .and_then(|code| ValueType::from_code(code as i32))?;
        Some(Self {
            key: remote.key.clone(),
            name: if remote.name.is_empty() {
                remote.key.clone()
            } else {
                remote.name.clone()
            },
            value_type,
            units: remote.units.clone(),
            history: parse_remote_int(&remote.history).unwrap_or(0) as i32,
            delay: parse_remote_int(&remote.delay).unwrap_or(0) as i32,
        })
    }

    pub fn differs_from(&self, model: &ItemModel) -> bool {
        self.key != model.key
            || self.name != model.name
            || self.value_type != model.value_type
            || self.units != model.units
            || self.history != model.history
            || self.delay != model.delay
    }
}

/// Upsert one template's item mirror. Returns the number of rows written.
pub async fn sync_items<C: ConnectionTrait>(
    db: &C,
    template_id: i32,
    remote: &[RemoteItem],
) -> Result<usize, sea_orm::DbErr> {
    let remote_ids: HashSet<String> = remote.iter().map(|i| i.item_id.clone()).collect();

    let local = Item::find()
        .filter(ItemColumn::TemplateId.eq(template_id))
        .all(db)
        .await?;
    let local_pairs: Vec<(i32, String)> =
        local.iter().map(|i| (i.id, i.backend_id.clone())).collect();
    let by_backend_id: HashMap<String, &ItemModel> =
        local.iter().map(|i| (i.backend_id.clone(), i)).collect();

    let mut writes = 0;

    let stale = stale_row_ids(&local_pairs, &remote_ids);
    if !stale.is_empty() {
        writes += Item::delete_many()
            .filter(ItemColumn::Id.is_in(stale))
            .exec(db)
            .await?
            .rows_affected as usize;
    }

    for remote_item in remote {
        let Some(fields) = ItemFields::from_remote(remote_item) else {
            debug!(item_id = %remote_item.item_id, "skipping item with unknown value type");
            continue;
        };
        match by_backend_id.get(&remote_item.item_id) {
            None => {
                item::ActiveModel {
                    template_id: Set(template_id),
                    backend_id: Set(remote_item.item_id.clone()),
                    key: Set(fields.key),
                    name: Set(fields.name),
                    value_type: Set(fields.value_type),
                    units: Set(fields.units),
                    history: Set(fields.history),
                    delay: Set(fields.delay),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                writes += 1;
            }
            Some(existing) if fields.differs_from(existing) => {
                let mut active: item::ActiveModel = (*existing).clone().into();
                active.key = Set(fields.key);
                active.name = Set(fields.name);
                active.value_type = Set(fields.value_type);
                active.units = Set(fields.units);
                active.history = Set(fields.history);
                active.delay = Set(fields.delay);
                active.update(db).await?;
                writes += 1;
            }
            Some(_) => {}
        }
    }

    Ok(writes)
}

/// Upsert one template's trigger mirror. Returns the number of rows written.
pub async fn sync_triggers<C: ConnectionTrait>(
    db: &C,
    settings_id: i32,
    template_id: i32,
    remote: &[RemoteTrigger],
) -> Result<usize, sea_orm::DbErr> {
    let remote_ids: HashSet<String> = remote.iter().map(|t| t.trigger_id.clone()).collect();

    let local = Trigger::find()
        .filter(TriggerColumn::TemplateId.eq(template_id))
        .all(db)
        .await?;
    let local_pairs: Vec<(i32, String)> =
        local.iter().map(|t| (t.id, t.backend_id.clone())).collect();
    let by_backend_id: HashMap<String, &TriggerModel> =
        local.iter().map(|t| (t.backend_id.clone(), t)).collect();

    let mut writes = 0;

    let stale = stale_row_ids(&local_pairs, &remote_ids);
    if !stale.is_empty() {
        writes += Trigger::delete_many()
            .filter(TriggerColumn::Id.is_in(stale))
            .exec(db)
            .await?
            .rows_affected as usize;
    }

    for remote_trigger in remote {
        match by_backend_id.get(&remote_trigger.trigger_id) {
            None => {
                trigger::ActiveModel {
                    settings_id: Set(settings_id),
                    template_id: Set(template_id),
                    backend_id: Set(remote_trigger.trigger_id.clone()),
                    name: Set(remote_trigger.description.clone()),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                writes += 1;
            }
            Some(existing) if existing.name != remote_trigger.description => {
                let mut active: trigger::ActiveModel = (*existing).clone().into();
                active.name = Set(remote_trigger.description.clone());
                active.update(db).await?;
                writes += 1;
            }
            Some(_) => {}
        }
    }

    Ok(writes)
}

/// Upsert the IT-service mirror against the remote business-service list.
/// Only rows that were provisioned (carry a `backend_id`) participate:
/// a provisioned service vanishing remotely is deleted locally; remote
/// services with no local record are adopted; tracked fields follow the
/// remote values, with the linked trigger resolved through the trigger
/// mirror (a missing trigger clears the link rather than dangling).
pub async fn sync_itservices<C: ConnectionTrait>(
    db: &C,
    settings_id: i32,
    remote: &[crate::backend::api::RemoteService],
) -> Result<usize, sea_orm::DbErr> {
    use crate::db::entities::itservice;
    use crate::db::enums::{ResourceState, SlaAlgorithm};
    use chrono::Utc;

    let remote_ids: HashSet<String> = remote.iter().map(|s| s.service_id.clone()).collect();

    let local = Itservice::find()
        .filter(ItserviceColumn::SettingsId.eq(settings_id))
        .filter(ItserviceColumn::BackendId.is_not_null())
        .all(db)
        .await?;
    let local_pairs: Vec<(i32, String)> = local
        .iter()
        .filter_map(|s| s.backend_id.clone().map(|bid| (s.id, bid)))
        .collect();
    let by_backend_id: HashMap<String, &ItserviceModel> = local
        .iter()
        .filter_map(|s| s.backend_id.clone().map(|bid| (bid, s)))
        .collect();

    let mut writes = 0;

    let stale = stale_row_ids(&local_pairs, &remote_ids);
    if !stale.is_empty() {
        writes += Itservice::delete_many()
            .filter(ItserviceColumn::Id.is_in(stale))
            .exec(db)
            .await?
            .rows_affected as usize;
    }

    for remote_service in remote {
        let algorithm = parse_remote_int(&remote_service.algorithm)
            .and_then(|code| SlaAlgorithm::from_code(code as i32))
            .unwrap_or(SlaAlgorithm::SkipCalculation);
        let sort_order = parse_remote_int(&remote_service.sort_order).unwrap_or(0) as i32;
        let agreed_sla = remote_service.good_sla.parse::<f64>().ok();

        let linked_trigger = match remote_service.trigger_id.as_deref() {
            Some(backend_trigger_id) if !backend_trigger_id.is_empty() && backend_trigger_id != "0" => {
                find_trigger_by_backend_id(db, settings_id, backend_trigger_id).await?
            }
            _ => None,
        };
        let trigger_id = linked_trigger.as_ref().map(|t| t.id);
        let backend_trigger_id = linked_trigger.as_ref().map(|t| t.backend_id.clone());

        match by_backend_id.get(&remote_service.service_id) {
            None => {
                let now = Utc::now();
                itservice::ActiveModel {
                    settings_id: Set(settings_id),
                    host_id: Set(None),
                    name: Set(remote_service.name.clone()),
                    algorithm: Set(algorithm),
                    sort_order: Set(sort_order),
                    agreed_sla: Set(agreed_sla),
                    trigger_id: Set(trigger_id),
                    backend_trigger_id: Set(backend_trigger_id),
                    backend_id: Set(Some(remote_service.service_id.clone())),
                    is_main: Set(false),
                    state: Set(ResourceState::Ok),
                    error_message: Set(String::new()),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(db)
                .await?;
                writes += 1;
            }
            Some(existing) => {
                let unchanged = existing.name == remote_service.name
                    && existing.algorithm == algorithm
                    && existing.sort_order == sort_order
                    && existing.agreed_sla == agreed_sla
                    && existing.trigger_id == trigger_id
                    && existing.backend_trigger_id == backend_trigger_id;
                if !unchanged {
                    let mut active: itservice::ActiveModel = (*existing).clone().into();
                    active.name = Set(remote_service.name.clone());
                    active.algorithm = Set(algorithm);
                    active.sort_order = Set(sort_order);
                    active.agreed_sla = Set(agreed_sla);
                    active.trigger_id = Set(trigger_id);
                    active.backend_trigger_id = Set(backend_trigger_id);
                    active.updated_at = Set(Utc::now());
                    active.update(db).await?;
                    writes += 1;
                }
            }
        }
    }

    Ok(writes)
}

/// Find a local trigger by its remote id within one settings instance.
pub async fn find_trigger_by_backend_id<C: ConnectionTrait>(
    db: &C,
    settings_id: i32,
    backend_id: &str,
) -> Result<Option<TriggerModel>, sea_orm::DbErr> {
    Trigger::find()
        .filter(TriggerColumn::SettingsId.eq(settings_id))
        .filter(TriggerColumn::BackendId.eq(backend_id))
        .one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_row_ids() {
        let local = vec![
            (1, "100".to_string()),
            (2, "200".to_string()),
            (3, "300".to_string()),
        ];
        let remote: HashSet<String> = ["100".to_string(), "300".to_string()].into();
        assert_eq!(stale_row_ids(&local, &remote), vec![2]);

        let empty_remote = HashSet::new();
        assert_eq!(stale_row_ids(&local, &empty_remote), vec![1, 2, 3]);
    }

    fn remote_item() -> RemoteItem {
        serde_json::from_value(serde_json::json!({
            "itemid": "10",
            "key_": "cpu",
            "name": "CPU utilisation",
            "value_type": "0",
            "units": "%",
            "history": "90",
            "delay": "60",
        }))
        .unwrap()
    }

    fn local_item() -> ItemModel {
        ItemModel {
            id: 1,
            template_id: 1,
            backend_id: "10".to_string(),
            key: "cpu".to_string(),
            name: "CPU utilisation".to_string(),
            value_type: ValueType::Float,
            units: "%".to_string(),
            history: 90,
            delay: 60,
        }
    }

    #[test]
    fn test_item_fields_no_diff_means_no_write() {
        let fields = ItemFields::from_remote(&remote_item()).unwrap();
        assert!(!fields.differs_from(&local_item()));
    }

    #[test]
    fn test_item_fields_detects_single_field_drift() {
        let mut remote = remote_item();
        remote.delay = "120".to_string();
        let fields = ItemFields::from_remote(&remote).unwrap();
        assert!(fields.differs_from(&local_item()));
    }

    #[test]
    fn test_item_fields_rejects_unknown_value_type() {
        let mut remote = remote_item();
        remote.value_type = "7".to_string();
        assert!(ItemFields::from_remote(&remote).is_none());
    }
}
