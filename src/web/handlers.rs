//! Request handlers.

use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::headers::{IfModifiedSince, LastModified};
use axum_extra::TypedHeader;
use chrono::{DateTime, Utc};

use crate::cache::ContentCache;
use crate::news::{Renderer, RefreshOutcome, RefreshPipeline};
use crate::stats::format_stats;

use super::error::WebError;

/// Request header set by the scheduler on refresh triggers.
const SCHEDULER_HEADER: &str = "x-appengine-cron";

/// Shared application state.
pub struct AppState {
    /// The snapshot cache.
    pub cache: Arc<ContentCache>,
    /// The refresh pipeline, shared with the background updater.
    pub pipeline: Arc<RefreshPipeline>,
    /// Page renderer, for the pre-snapshot loading page.
    pub renderer: Arc<Renderer>,
    /// Process start, truncated to whole seconds to match the precision
    /// of the `Last-Modified` header.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create the state shared by all handlers.
    pub fn new(
        cache: Arc<ContentCache>,
        pipeline: Arc<RefreshPipeline>,
        renderer: Arc<Renderer>,
    ) -> Self {
        let now = Utc::now();
        let started_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        Self {
            cache,
            pipeline,
            renderer,
            started_at,
        }
    }
}

/// The `Last-Modified` value for the snapshot page: the later of the
/// process start and the last snapshot write. A redeploy bumps it even
/// when the content did not change, because the markup may have.
fn last_modified_for(started_at: DateTime<Utc>, updated: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match updated {
        Some(updated) if updated > started_at => updated,
        _ => started_at,
    }
}

/// `GET /` - the snapshot page, with conditional-GET support.
pub async fn index(
    State(state): State<Arc<AppState>>,
    if_modified_since: Option<TypedHeader<IfModifiedSince>>,
) -> Result<Response, WebError> {
    let updated = state.cache.updated().await?;
    let last_modified: SystemTime = last_modified_for(state.started_at, updated).into();

    if let Some(TypedHeader(since)) = if_modified_since {
        if !since.is_modified(last_modified) {
            return Ok((
                StatusCode::NOT_MODIFIED,
                TypedHeader(LastModified::from(last_modified)),
            )
                .into_response());
        }
    }

    let page = match state.cache.page().await? {
        Some(page) => page,
        None => state.renderer.loading_page(),
    };

    Ok((TypedHeader(LastModified::from(last_modified)), Html(page)).into_response())
}

/// `GET /_refresh` - run one refresh invocation.
///
/// The scheduler (identified by its request header) gets an empty `200`,
/// or `423` when another refresh holds the lock. A browser hitting the
/// endpoint by hand is redirected back to the page.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let from_scheduler = headers
        .get(SCHEDULER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let outcome = state.pipeline.run().await?;

    if matches!(outcome, RefreshOutcome::Locked) {
        return Ok(StatusCode::LOCKED.into_response());
    }

    if from_scheduler {
        Ok(StatusCode::OK.into_response())
    } else {
        Ok(Redirect::to("/").into_response())
    }
}

/// `GET /_stats` - operational statistics as plain `key: value` lines.
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Response, WebError> {
    let stats = state.cache.stats().await?;
    Ok(Html(format!("<pre>{}</pre>", format_stats(&stats))).into_response())
}

/// `GET /_data` - the raw cached item collection as JSON.
pub async fn data(State(state): State<Arc<AppState>>) -> Result<Response, WebError> {
    let items = state.cache.get().await?;
    Ok(Json(items).into_response())
}
