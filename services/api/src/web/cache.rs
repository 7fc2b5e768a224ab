//! services/api/src/web/cache.rs
//!
//! Anonymous book discovery backed by the shared response cache, plus the
//! cache administration endpoints, which require a user id.

use crate::error::{ApiError, ErrorBody};
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use readwithme_core::domain::{BookAnswer, CacheEntry, CacheStats, Citation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

const DEFAULT_POPULAR_LIMIT: i64 = 10;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopicRequest {
    pub topic_name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
}

#[derive(Serialize, ToSchema)]
pub struct CitationResponse {
    pub uri: String,
    pub title: String,
}

impl From<Citation> for CitationResponse {
    fn from(c: Citation) -> Self {
        Self { uri: c.uri, title: c.title }
    }
}

/// Generated (or cached) recommendations with their web sources.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BooksResponse {
    pub text: String,
    pub citations: Vec<CitationResponse>,
    pub cached: bool,
}

impl From<BookAnswer> for BooksResponse {
    fn from(answer: BookAnswer) -> Self {
        Self {
            text: answer.text,
            citations: answer.citations.into_iter().map(Into::into).collect(),
            cached: answer.cached,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsResponse {
    pub total_entries: u64,
    pub active_entries: u64,
    pub expired_entries: u64,
    pub total_hits: i64,
    pub average_hits_per_entry: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(s: CacheStats) -> Self {
        Self {
            total_entries: s.total_entries,
            active_entries: s.active_entries,
            expired_entries: s.expired_entries,
            total_hits: s.total_hits,
            average_hits_per_entry: s.average_hits_per_entry,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PopularEntryResponse {
    pub query_type: String,
    pub query_value: String,
    pub hit_count: i32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<CacheEntry> for PopularEntryResponse {
    fn from(e: CacheEntry) -> Self {
        Self {
            query_type: e.query_type.to_string(),
            query_value: e.query_value,
            hit_count: e.hit_count,
            created_at: e.created_at,
            expires_at: e.expires_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct PopularQuery {
    /// Maximum number of entries (default 10).
    pub limit: Option<i64>,
}

#[derive(Serialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: u64,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Recommend books about a topic.
#[utoipa::path(
    post,
    path = "/api/cache/books/topic",
    request_body = TopicRequest,
    responses(
        (status = 200, description = "Recommendations", body = BooksResponse),
        (status = 400, description = "Missing topic", body = ErrorBody),
        (status = 502, description = "Generation failed", body = ErrorBody)
    ),
    tag = "cache"
)]
pub async fn topic_books_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TopicRequest>,
) -> Result<Json<BooksResponse>, ApiError> {
    let answer = state.discovery.by_topic(&req.topic_name).await?;
    Ok(Json(answer.into()))
}

/// Search for a specific book.
#[utoipa::path(
    post,
    path = "/api/cache/books/search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results", body = BooksResponse),
        (status = 400, description = "Missing query", body = ErrorBody),
        (status = 502, description = "Generation failed", body = ErrorBody)
    ),
    tag = "cache"
)]
pub async fn search_books_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<BooksResponse>, ApiError> {
    let answer = state.discovery.search(&req.query).await?;
    Ok(Json(answer.into()))
}

#[utoipa::path(
    get,
    path = "/api/cache/stats",
    responses((status = 200, description = "Cache statistics", body = CacheStatsResponse)),
    tag = "cache"
)]
pub async fn cache_stats_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStatsResponse>, ApiError> {
    Ok(Json(state.cache.stats().await?.into()))
}

/// Live entries with the most hits.
#[utoipa::path(
    get,
    path = "/api/cache/popular",
    params(PopularQuery),
    responses((status = 200, description = "Most requested entries", body = [PopularEntryResponse])),
    tag = "cache"
)]
pub async fn popular_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PopularQuery>,
) -> Result<Json<Vec<PopularEntryResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
    let entries = state.cache.popular(limit).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Delete expired entries now instead of waiting for the periodic sweep.
#[utoipa::path(
    post,
    path = "/api/cache/sweep",
    responses(
        (status = 200, description = "Expired entries removed", body = DeletedResponse),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "cache"
)]
pub async fn sweep_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.cache.sweep().await?;
    Ok(Json(DeletedResponse { deleted }))
}

#[utoipa::path(
    delete,
    path = "/api/cache",
    responses(
        (status = 200, description = "Every entry removed", body = DeletedResponse),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "cache"
)]
pub async fn clear_cache_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.cache.clear().await?;
    Ok(Json(DeletedResponse { deleted }))
}
