use std::io::{self, Read};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use depot_engine::{BlobStore, DynCombinedStore, EngineResult};
use depot_metadata::MetadataStore;
use depot_types::{Blob, BlobId, BlobQuery, RouteResolver};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::state::{AppState, CONTENT_UPLOAD_ROUTE};

/// Version of the HTTP API surface.
pub const API_VERSION: &str = "1.0";

/// Run blocking engine work off the async runtime.
async fn blocking<T, F>(state: &AppState, work: F) -> ServerResult<T>
where
    F: FnOnce(&DynCombinedStore) -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    Ok(task::spawn_blocking(move || work(engine.as_ref())).await??)
}

fn declared_length(headers: &HeaderMap) -> ServerResult<Option<u64>> {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| ServerError::BadRequest("malformed Content-Length".into()))
}

/// Expose a request body as a blocking reader, so uploads flow into the
/// content store as they arrive. Must be called on the runtime.
fn upload_reader(body: Body) -> impl Read + Send + 'static {
    let chunks = body.into_data_stream().map_err(io::Error::other);
    SyncIoBridge::new(StreamReader::new(chunks))
}

fn octet_stream(bytes: Vec<u8>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/octet-stream")], bytes)
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn info_handler(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let managed = blocking(&state, |engine| engine.estimate_size_of_managed_content()).await?;
    Ok(Json(json!({
        "name": "depot",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": API_VERSION,
        "managed_bytes": managed,
        "quota": state.engine.quota(),
    })))
}

pub async fn list_buckets(State(state): State<AppState>) -> ServerResult<Json<Vec<String>>> {
    let buckets = blocking(&state, |engine| Ok(engine.metadata().all_buckets()?)).await?;
    Ok(Json(buckets))
}

pub async fn list_blobs(State(state): State<AppState>) -> ServerResult<Json<Vec<Blob>>> {
    let blobs = blocking(&state, |engine| Ok(engine.metadata().all_blobs()?)).await?;
    Ok(Json(blobs))
}

/// Store a blob description and point the caller at its upload location.
pub async fn describe_new_blob(
    State(state): State<AppState>,
    Json(mut blob): Json<Blob>,
) -> ServerResult<impl IntoResponse> {
    blob.validate().map_err(|e| ServerError::BadRequest(e.to_string()))?;
    blob.id = BlobId::PENDING;
    blob.size = 0;
    blob.checksum.clear();

    let stored = blocking(&state, move |engine| Ok(engine.metadata().store_blob_record(&blob)?)).await?;
    let id = stored.id.to_string();
    let redirect_url = state
        .routes
        .url_for_route(CONTENT_UPLOAD_ROUTE, &[("id", id.as_str())])
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    info!(id = %stored.id, bucket = %stored.bucket, "blob described");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "redirect_url": redirect_url, "blob": stored })),
    ))
}

pub async fn search_blobs(
    State(state): State<AppState>,
    Json(query): Json<BlobQuery>,
) -> ServerResult<Json<Vec<BlobId>>> {
    let ids = blocking(&state, move |engine| Ok(engine.metadata().search(&query)?)).await?;
    Ok(Json(ids))
}

pub async fn get_blob(State(state): State<AppState>, Path(id): Path<BlobId>) -> ServerResult<Json<Blob>> {
    let blob = blocking(&state, move |engine| engine.describe(id)).await?;
    Ok(Json(blob))
}

pub async fn delete_blob(State(state): State<AppState>, Path(id): Path<BlobId>) -> ServerResult<Json<Blob>> {
    let removed = blocking(&state, move |engine| engine.delete(&engine.describe(id)?)).await?;
    Ok(Json(removed))
}

pub async fn get_content(State(state): State<AppState>, Path(id): Path<BlobId>) -> ServerResult<impl IntoResponse> {
    let bytes = blocking(&state, move |engine| {
        let mut buf = Vec::new();
        engine.retrieve_by_id(id, &mut buf)?;
        Ok(buf)
    })
    .await?;
    Ok(octet_stream(bytes))
}

pub async fn put_content(
    State(state): State<AppState>,
    Path(id): Path<BlobId>,
    headers: HeaderMap,
    body: Body,
) -> ServerResult<impl IntoResponse> {
    let declared = declared_length(&headers)?;
    let mut upload = upload_reader(body);
    let (blob, _) = blocking(&state, move |engine| {
        let blob = engine.describe(id)?;
        engine.write(&blob, &mut upload, declared)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(blob)))
}

/// Append under the blob's lock so concurrent appenders serialize.
pub async fn append_content(
    State(state): State<AppState>,
    Path(id): Path<BlobId>,
    headers: HeaderMap,
    body: Body,
) -> ServerResult<impl IntoResponse> {
    let declared = declared_length(&headers)?;
    let appender = Arc::clone(&state.appender);
    let mut upload = upload_reader(body);
    let (blob, _) = task::spawn_blocking(move || {
        let blob = appender.store().describe(id)?;
        appender.append(&blob, &mut upload, declared)
    })
    .await??;
    Ok((StatusCode::ACCEPTED, Json(blob)))
}

#[derive(Debug, Deserialize)]
pub struct InsertParams {
    pub offset: i64,
}

pub async fn insert_content(
    State(state): State<AppState>,
    Path(id): Path<BlobId>,
    Query(params): Query<InsertParams>,
    body: Body,
) -> ServerResult<impl IntoResponse> {
    let mut upload = upload_reader(body);
    let (blob, _) = blocking(&state, move |engine| {
        let blob = engine.describe(id)?;
        engine.insert(&blob, params.offset, &mut upload)
    })
    .await?;
    Ok((StatusCode::ACCEPTED, Json(blob)))
}

pub async fn content_url(State(state): State<AppState>, Path(id): Path<BlobId>) -> ServerResult<Json<Value>> {
    let url = blocking(&state, move |engine| engine.url_for(&engine.describe(id)?)).await?;
    Ok(Json(json!({ "url": url })))
}
