//! Delayed sync endpoint.
//!
//! A delayed viewer asks `/current/sync` instead of `/sync` and gets a copy
//! of the sync record re-anchored `delay.fragments` behind the live edge,
//! with `token_redirect` pointing its fragment fetches back at the relay
//! root. When the store does not hold enough history yet the request is
//! held for the planned wait before answering.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::Instrument;

use pc_core::{DelayPlan, Error, Result, SyncRecord};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;
use crate::routes::sync::stored_sync;

#[derive(Debug, Default, Deserialize)]
pub struct DelayedSyncQuery {
    /// Client-side stream path; only logged.
    pub path: Option<String>,
}

/// GET /current/sync?path=...
pub async fn delayed_sync(
    State(ctx): State<AppContext>,
    Query(query): Query<DelayedSyncQuery>,
    request_id: RequestId,
) -> std::result::Result<Json<SyncRecord>, AppError> {
    let span = tracing::info_span!(
        "delayed_sync",
        path = query.path.as_deref().unwrap_or_default()
    );

    resolve_delayed_sync(&ctx)
        .instrument(span)
        .await
        .map(Json)
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))
}

/// Plan, wait if the buffer is short, and build the delayed sync record.
pub async fn resolve_delayed_sync(ctx: &AppContext) -> Result<SyncRecord> {
    let sync = stored_sync(ctx).await?;
    let mut plan = ctx.planner.plan(&sync, stored_current(ctx, &sync).await?)?;

    if plan.catch_up {
        tracing::info!(
            deficit = plan.deficit,
            wait_secs = plan.wait.as_secs(),
            "Delay buffer short, holding client"
        );

        tokio::select! {
            _ = tokio::time::sleep(plan.wait) => {}
            _ = ctx.shutdown.cancelled() => {
                return Err(Error::Internal("relay is shutting down".into()));
            }
        }

        if ctx.revalidate() {
            plan = replan(ctx, &sync, plan).await?;
        }
    }

    tracing::debug!(
        resume_fragment = plan.resume_fragment,
        resume_tick = plan.resume_tick,
        catch_up = plan.catch_up,
        "Serving delayed sync"
    );
    Ok(ctx.planner.delayed_sync(&sync, &plan))
}

/// Re-read the pointer after a catch-up wait. Never waits a second time.
async fn replan(ctx: &AppContext, sync: &SyncRecord, waited: DelayPlan) -> Result<DelayPlan> {
    let plan = ctx.planner.plan(sync, stored_current(ctx, sync).await?)?;
    if plan.catch_up {
        tracing::warn!(
            deficit = plan.deficit,
            "Buffer still short after waiting, serving from sync fragment"
        );
        // Same resume point as before; the new wait is not honoured.
        return Ok(DelayPlan {
            wait: waited.wait,
            ..plan
        });
    }
    Ok(plan)
}

/// Current pointer, or the sync fragment itself when nothing is collected.
async fn stored_current(ctx: &AppContext, sync: &SyncRecord) -> Result<u64> {
    match ctx.store.current().await? {
        Some(current) => Ok(current),
        None => Ok(u64::try_from(sync.fragment).unwrap_or(0)),
    }
}
