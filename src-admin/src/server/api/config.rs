//! Module configuration API:
//!   GET  /api/config           – list registered modules
//!   GET  /api/config/{module}  – metadata + current values (secrets masked)
//!   POST /api/config/{module}  – save an urlencoded form submission

use std::any::Any;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Form, Path, State};
use config_engine::{ArrayField, ConfigError, ConfigResult, Field, FormData, ParsedSpec, Snapshot, Store};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;

use crate::app::SharedState;

use super::{ApiError, err_json};

/// GET /api/config
pub async fn list_modules(State(state): State<SharedState>) -> Json<Value> {
    let modules: Vec<Value> = state
        .store()
        .registry()
        .list()
        .iter()
        .map(|parsed| {
            let spec = &parsed.spec;
            json!({
                "module": spec.module,
                "title": spec.title,
                "description": spec.description,
                "category": spec.category,
                "order": spec.order,
                "read_only": spec.read_only,
                "dev_only": spec.dev_only,
            })
        })
        .collect();
    Json(json!({ "modules": modules }))
}

/// GET /api/config/{module}
pub async fn get_config(
    State(state): State<SharedState>,
    Path(module): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let parsed = lookup(&state, &module)?;
    if parsed.spec.record.is_none() {
        return Ok(Json(module_view(&parsed, None)));
    }

    let snapshot = run_store(&state, move |store, cancel| {
        store.load_snapshot(cancel, &module)
    })
    .await?;
    Ok(Json(module_view(&parsed, Some(&snapshot))))
}

/// POST /api/config/{module}
pub async fn update_config(
    State(state): State<SharedState>,
    Path(module): Path<String>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let parsed = lookup(&state, &module)?;
    if parsed.spec.read_only {
        return Err(err_json(400, &format!("module {module} is read-only")));
    }

    let form = FormData::from_pairs(pairs);
    let target = module.clone();
    let version = run_store(&state, move |store, cancel| {
        let mut config = store.parse_form(&target, &form)?;
        store.save(cancel, &target, &mut config, true)
    })
    .await?;

    tracing::info!(module = %module, version, "Config updated");
    Ok(Json(json!({
        "status": "ok",
        "module": module,
        "version": version,
    })))
}

fn lookup(state: &SharedState, module: &str) -> Result<Arc<ParsedSpec>, ApiError> {
    state
        .store()
        .registry()
        .get(module)
        .ok_or_else(|| err_json(404, &format!("unknown config module: {module}")))
}

/// Run blocking store work off the async runtime. The request token is
/// cancelled if the client goes away before the work finishes.
async fn run_store<F, R>(state: &SharedState, work: F) -> Result<R, ApiError>
where
    F: FnOnce(&Store, &CancellationToken) -> ConfigResult<R> + Send + 'static,
    R: Send + 'static,
{
    let cancel = state.request_token();
    let guard = cancel.clone().drop_guard();
    let store = state.store().clone();

    let result = tokio::task::spawn_blocking(move || work(&store, &cancel))
        .await
        .map_err(|e| err_json(500, &format!("Config task failed: {e}")))?;
    guard.disarm();

    result.map_err(config_err)
}

fn config_err(err: ConfigError) -> ApiError {
    let status = match &err {
        ConfigError::UnknownModule(_) => 404,
        ConfigError::Validation(_) => 400,
        ConfigError::Cancelled => 503,
        _ => 500,
    };
    if status == 500 {
        tracing::error!("Config request failed: {err}");
    }
    err_json(status, &err.to_string())
}

fn module_view(parsed: &ParsedSpec, snapshot: Option<&Snapshot>) -> Value {
    let spec = &parsed.spec;
    let record = snapshot.map(|s| s.config.as_any());

    let sections: Vec<Value> = parsed
        .sections
        .iter()
        .map(|section| {
            json!({
                "name": section.name,
                "title": section.title,
                "description": section.description,
                "fields": section
                    .fields
                    .iter()
                    .map(|f| field_view(f, record))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let array_fields: Vec<Value> = parsed
        .array_fields
        .iter()
        .map(|af| array_view(af, record))
        .collect();

    json!({
        "module": spec.module,
        "title": spec.title,
        "description": spec.description,
        "category": spec.category,
        "order": spec.order,
        "read_only": spec.read_only,
        "dev_only": spec.dev_only,
        "info_content": spec.info_content,
        "version": snapshot.map(|s| s.version),
        "updated_at": snapshot.and_then(|s| s.created).map(|t| t.to_rfc3339()),
        "sections": sections,
        "array_fields": array_fields,
    })
}

/// Field metadata plus its value. Secret values are never sent back; only
/// whether one is stored.
fn field_view(field: &Field, record: Option<&dyn Any>) -> Value {
    let mut view = serde_json::to_value(field).unwrap_or_else(|_| json!({}));
    let current = record.and_then(|r| field.value(r));
    let has_value = current.as_ref().is_some_and(|v| !v.is_zero());
    let value = match current {
        Some(_) if field.secret => Value::String(String::new()),
        Some(v) => v.to_json(),
        None => Value::Null,
    };
    if let Value::Object(obj) = &mut view {
        obj.insert("value".into(), value);
        obj.insert("has_value".into(), Value::Bool(has_value));
    }
    view
}

fn array_view(af: &ArrayField, record: Option<&dyn Any>) -> Value {
    let items: Vec<Value> = match record.map(|r| af.encode_json(r)) {
        Some(Value::Array(items)) => items.into_iter().map(|item| mask_item(af, item)).collect(),
        _ => Vec::new(),
    };
    json!({
        "name": af.name,
        "key": af.json_name,
        "label": af.label,
        "item_label": af.item_label,
        "help": af.help,
        "key_field": af.key_field,
        "min_items": af.min_items,
        "max_items": af.max_items,
        "fields": af.fields,
        "items": items,
    })
}

/// Item values keyed by sub-field, as `{ "value": .., "has_value": .. }`.
fn mask_item(af: &ArrayField, item: Value) -> Value {
    let Value::Object(mut values) = item else {
        return item;
    };
    let mut out = Map::new();
    for field in &af.fields {
        let value = values.remove(&field.json_name).unwrap_or(Value::Null);
        let has_value = match &value {
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => n.as_i64() != Some(0),
            Value::Bool(b) => *b,
            _ => false,
        };
        let value = if field.secret {
            Value::String(String::new())
        } else {
            value
        };
        out.insert(
            field.json_name.clone(),
            json!({ "value": value, "has_value": has_value }),
        );
    }
    Value::Object(out)
}
