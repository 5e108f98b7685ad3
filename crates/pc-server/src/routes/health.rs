use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::context::AppContext;

/// GET /health
///
/// Always 200; reports whether the collector has bootstrapped and the
/// newest stored fragment. Store errors read as "not yet".
pub async fn health_check(State(ctx): State<AppContext>) -> Json<Value> {
    let synced = matches!(ctx.store.sync().await, Ok(Some(_)));
    let current = ctx.store.current().await.ok().flatten();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "synced": synced,
        "current": current,
    }))
}
