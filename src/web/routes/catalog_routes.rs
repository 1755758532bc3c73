use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;

use crate::db::entities::prelude::*;
use crate::web::models::{ItemResponse, TemplateResponse, TriggerResponse};
use crate::web::{AppError, AppState};

pub fn catalog_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/templates", get(list_templates_handler))
        .route("/api/items", get(list_items_handler))
        .route("/api/triggers", get(list_triggers_handler))
}

#[derive(Deserialize)]
struct CatalogQuery {
    settings_id: Option<i32>,
    template_id: Option<i32>,
}

async fn list_templates_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    let mut select = Template::find().order_by_asc(TemplateColumn::Name);
    if let Some(settings_id) = query.settings_id {
        select = select.filter(TemplateColumn::SettingsId.eq(settings_id));
    }
    let templates = select.all(app_state.db.as_ref()).await?;
    Ok(Json(templates.into_iter().map(Into::into).collect()))
}

async fn list_items_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<ItemResponse>>, AppError> {
    let mut select = Item::find().order_by_asc(ItemColumn::Key);
    if let Some(template_id) = query.template_id {
        select = select.filter(ItemColumn::TemplateId.eq(template_id));
    }
    let items = select.all(app_state.db.as_ref()).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

async fn list_triggers_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<TriggerResponse>>, AppError> {
    let mut select = Trigger::find().order_by_asc(TriggerColumn::Name);
    if let Some(settings_id) = query.settings_id {
        select = select.filter(TriggerColumn::SettingsId.eq(settings_id));
    }
    if let Some(template_id) = query.template_id {
        select = select.filter(TriggerColumn::TemplateId.eq(template_id));
    }
    let triggers = select.all(app_state.db.as_ref()).await?;
    Ok(Json(triggers.into_iter().map(Into::into).collect()))
}
