//! API route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use tracing::{debug, info, warn};

use rfidreg_core::types::{RegistrationRequest, TagRecord, TagUid};

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

// ═══════════════════════════════════════════════════════════════════════════
// Tags
// ═══════════════════════════════════════════════════════════════════════════

/// GET /api/v1/tags
pub async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Json<ListTagsResponse>> {
    let tags = state.service.list_tags().await?;

    Ok(Json(ListTagsResponse {
        total: tags.len(),
        tags,
    }))
}

/// PUT /api/v1/tags
///
/// Arms the reader and holds the request open until a tag is scanned, the
/// scan times out, or the attempt is cancelled. Dropping the connection
/// cancels the attempt. A body that does not parse is rejected before the
/// reader is touched.
pub async fn register_tag(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RegistrationRequest>, JsonRejection>,
) -> Result<Json<RegisterTagResponse>> {
    let Json(req) = payload?;
    let record = state.service.register_tag(&req).await?;

    info!(uid = %record.uid, username = %record.username, "Tag registered");

    Ok(Json(RegisterTagResponse {
        success: true,
        record,
    }))
}

/// DELETE /api/v1/tags?uid=…
///
/// Without `uid`, waits for a tag to be presented and removes that one.
pub async fn remove_tag(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RemoveTagQuery>,
) -> Result<Json<RemoveTagResponse>> {
    match query.uid {
        Some(raw) => {
            let uid = TagUid::new(&raw)?;
            let removed = state.service.remove_tag(&uid).await?;

            debug!(%uid, removed, "Remove by uid");
            Ok(Json(RemoveTagResponse {
                success: removed,
                uid: None,
            }))
        }
        None => {
            let (uid, removed) = state.service.remove_scanned_tag().await?;

            debug!(%uid, removed, "Remove by scan");
            Ok(Json(RemoveTagResponse {
                success: removed,
                uid: Some(uid),
            }))
        }
    }
}

/// GET /api/v1/tags/:uid
pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<TagRecord>> {
    let uid = TagUid::new(&raw)?;

    state
        .service
        .get_tag(&uid)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Tag {} is not registered", uid)))
}

/// GET /api/v1/access/:uid
pub async fn check_access(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Result<Json<AccessResponse>> {
    let uid = TagUid::new(&raw)?;
    let authorized = state.service.is_authorized(&uid).await?;

    Ok(Json(AccessResponse { uid, authorized }))
}

// ═══════════════════════════════════════════════════════════════════════════
// Reader
// ═══════════════════════════════════════════════════════════════════════════

/// GET /api/v1/reader
pub async fn reader_status(State(state): State<Arc<AppState>>) -> Json<ReaderStatusResponse> {
    let status = state.service.reader_status();

    Json(ReaderStatusResponse {
        armed: status.armed,
        state: status.state,
    })
}

/// POST /api/v1/reader/cancel
pub async fn cancel_registration(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    Json(CancelResponse {
        success: state.service.cancel_registration(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Health
// ═══════════════════════════════════════════════════════════════════════════

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, tag_count) = match state.service.tag_count().await {
        Ok(count) => ("ok", count),
        Err(e) => {
            warn!(error = %e, "Tag store unavailable during health check");
            ("degraded", 0)
        }
    };

    Json(HealthResponse {
        status: status.into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        tag_count,
        reader_armed: state.service.reader_status().armed,
    })
}
