use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use pc_core::{Error, Result, SyncRecord};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// GET /sync
///
/// The stored sync record exactly as persisted, including upstream fields
/// the relay does not model.
pub async fn get_sync(
    State(ctx): State<AppContext>,
    request_id: RequestId,
) -> std::result::Result<impl IntoResponse, AppError> {
    let json = ctx
        .store
        .sync_json()
        .await
        .and_then(|json| json.ok_or_else(missing_sync))
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

/// The stored sync record, `NotFound` before the collector bootstrapped.
pub(crate) async fn stored_sync(ctx: &AppContext) -> Result<SyncRecord> {
    ctx.store.sync().await?.ok_or_else(missing_sync)
}

fn missing_sync() -> Error {
    Error::not_found("sync record", "sync")
}
