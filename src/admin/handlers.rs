use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::admin::error::AdminError;
use crate::gate::{GateEntry, GateSummary};
use crate::hotfix::{file_ids, sections_for_file, serialize_file, OverrideRecord, HOTFIXES_TABLE};
use crate::http::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub hotfixes: usize,
    pub gate_entries: usize,
    pub cache_enabled: bool,
    pub partitions: Vec<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        hotfixes: state.hotfixes.len(),
        gate_entries: state.gate.len(),
        cache_enabled: state.config.cache.enabled,
        partitions: state.cache.partition_ids(),
    })
}

#[derive(Deserialize)]
pub struct HotfixFilter {
    pub file: Option<String>,
}

pub async fn list_hotfixes(
    State(state): State<AppState>,
    Query(filter): Query<HotfixFilter>,
) -> Json<Vec<OverrideRecord>> {
    let records = match filter.file {
        Some(file) => state.hotfixes.for_file(&file),
        None => state.hotfixes.list(),
    };
    Json(records)
}

/// One record or a batch.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum HotfixPayload {
    One(OverrideRecord),
    Many(Vec<OverrideRecord>),
}

pub async fn upsert_hotfixes(
    State(state): State<AppState>,
    Json(payload): Json<HotfixPayload>,
) -> Result<Json<Value>, AdminError> {
    let batch = match payload {
        HotfixPayload::One(record) => vec![record],
        HotfixPayload::Many(records) => records,
    };
    for record in &batch {
        record.validate().map_err(|e| {
            AdminError::BadRequest(format!(
                "invalid hotfix {}/[{}]/{}: {e}",
                record.file.escape_debug(),
                record.section.escape_debug(),
                record.key.escape_debug()
            ))
        })?;
    }

    let upserted = state.hotfixes.upsert_many(batch);
    tracing::info!(records = upserted, "Hotfixes upserted");
    Ok(Json(json!({ "upserted": upserted })))
}

#[derive(Deserialize)]
pub struct HotfixIdentity {
    pub file: String,
    pub section: String,
    pub key: String,
}

pub async fn delete_hotfix(
    State(state): State<AppState>,
    Query(id): Query<HotfixIdentity>,
) -> Result<Json<Value>, AdminError> {
    if !state.hotfixes.remove(&id.file, &id.section, &id.key) {
        return Err(AdminError::NotFound(format!(
            "hotfix {}/[{}]/{}",
            id.file, id.section, id.key
        )));
    }
    tracing::info!(file = %id.file, section = %id.section, key = %id.key, "Hotfix removed");
    Ok(Json(json!({ "removed": true })))
}

#[derive(Deserialize)]
pub struct ImportParams {
    pub unique_file: Option<String>,
}

pub async fn import_hotfixes(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Json<Value> {
    let imported = state
        .hotfixes
        .import(&body, &file, params.unique_file.as_deref());
    tracing::info!(file = %file, records = imported, "Hotfix file imported");
    Json(json!({ "file": file, "imported": imported }))
}

#[derive(Serialize)]
pub struct FileListing {
    pub file: String,
    pub sections: Vec<String>,
}

pub async fn list_hotfix_files(State(state): State<AppState>) -> Json<Vec<FileListing>> {
    let records = state.hotfixes.list();
    let listing = file_ids(&records)
        .into_iter()
        .map(|file| FileListing {
            sections: sections_for_file(&records, &file),
            file,
        })
        .collect();
    Json(listing)
}

#[derive(Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub include_disabled: bool,
    #[serde(default)]
    pub timestamp: bool,
}

pub async fn export_hotfix_file(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AdminError> {
    let records = state.hotfixes.list();
    let content = serialize_file(&records, &file, params.include_disabled, params.timestamp)
        .ok_or_else(|| AdminError::NotFound(format!("no hotfixes for {file}")))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], content).into_response())
}

#[derive(Deserialize, Default)]
pub struct InvalidateRequest {
    #[serde(default)]
    pub tables: Vec<String>,
}

/// Run the mutation hook synchronously in every partition. An empty body
/// invalidates the hotfixes table.
pub async fn invalidate_cache(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AdminError> {
    let request: InvalidateRequest = if body.is_empty() {
        InvalidateRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AdminError::BadRequest(format!("invalid JSON body: {e}")))?
    };
    let mut tables = request.tables;
    if tables.is_empty() {
        tables.push(HOTFIXES_TABLE.to_string());
    }
    let invalidated = state.cache.invalidate_everywhere(&tables).await;
    tracing::info!(tables = ?tables, entries = invalidated, "Cache invalidated by admin");
    Ok(Json(json!({ "tables": tables, "invalidated": invalidated })))
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    let partitions = state.cache.partition_ids();
    state.cache.clear_everywhere().await;
    tracing::warn!(partitions = partitions.len(), "Cache cleared by admin");
    Json(json!({ "cleared": partitions }))
}

#[derive(Deserialize)]
pub struct GateParams {
    pub method: Option<String>,
}

fn gate_key(path: &str, params: &GateParams) -> Result<(String, Method), AdminError> {
    let method = params.method.as_deref().unwrap_or("GET").to_ascii_uppercase();
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| AdminError::BadRequest(format!("invalid method '{method}'")))?;
    Ok((format!("/{}", path.trim_start_matches('/')), method))
}

pub async fn set_override(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<GateParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AdminError> {
    let (path, method) = gate_key(&path, &params)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let replaced = state.gate.set(GateEntry {
        path: path.clone(),
        method: method.clone(),
        body,
        content_type,
    });
    tracing::info!(path = %path, method = %method, replaced, "Gate entry stored");
    Ok(Json(json!({ "path": path, "method": method.as_str(), "replaced": replaced })))
}

pub async fn delete_override(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<GateParams>,
) -> Result<Json<Value>, AdminError> {
    let (path, method) = gate_key(&path, &params)?;
    if !state.gate.remove(&path, &method) {
        return Err(AdminError::NotFound(format!("gate entry {method} {path}")));
    }
    tracing::info!(path = %path, method = %method, "Gate entry removed");
    Ok(Json(json!({ "removed": true })))
}

pub async fn list_overrides(State(state): State<AppState>) -> Json<Vec<GateSummary>> {
    Json(state.gate.list())
}
