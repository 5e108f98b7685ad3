use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;

use pc_core::{Error, FragmentKey, FragmentType, Result};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// GET /{number}/{type}
///
/// Raw fragment bytes as stored by the collector.
pub async fn get_fragment(
    State(ctx): State<AppContext>,
    Path((number, kind)): Path<(String, String)>,
    request_id: RequestId,
) -> std::result::Result<impl IntoResponse, AppError> {
    let payload = load_fragment(&ctx, &number, &kind)
        .await
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))?;

    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], payload))
}

async fn load_fragment(ctx: &AppContext, number: &str, kind: &str) -> Result<Bytes> {
    let key = parse_key(number, kind)?;
    ctx.store
        .get(key)
        .await?
        .ok_or_else(|| Error::not_found("fragment", key))
}

fn parse_key(number: &str, kind: &str) -> Result<FragmentKey> {
    let number = number
        .parse::<u64>()
        .map_err(|_| Error::Validation(format!("invalid fragment number '{number}'")))?;
    let kind = kind.parse::<FragmentType>()?;
    Ok(FragmentKey::new(number, kind))
}
