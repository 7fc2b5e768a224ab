//! services/api/src/web/reading.rs
//!
//! Per-user reading endpoints: history, reading guides, translations, progress,
//! bookmarks and favourites. Every handler runs behind `require_auth`.

use crate::error::{ApiError, ErrorBody};
use crate::web::{middleware::UserId, state::AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use readwithme_core::content_store::DEFAULT_HISTORY_LIMIT;
use readwithme_core::domain::{BookDetails, BookRef, GuideContent, ReadingRecord, UserBook};
use readwithme_core::languages::SOURCE_LANGUAGE;
use readwithme_core::ports::PortError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Identifies a book in the caller's library.
#[derive(Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BookRequest {
    pub book_title: String,
    pub book_author: String,
}

impl BookRequest {
    pub fn to_book(&self, user_id: &str) -> Result<BookRef, PortError> {
        BookRef::new(user_id, self.book_title.as_str(), self.book_author.as_str())
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub book_title: String,
    pub book_author: String,
    pub published_date: Option<String>,
    pub topic: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum number of records (default 20).
    pub limit: Option<i64>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveGuideRequest {
    pub book_title: String,
    pub book_author: String,
    pub content: String,
    /// Defaults to the source language.
    pub language_code: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub book_title: String,
    pub book_author: String,
    pub target_language_code: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub book_title: String,
    pub book_author: String,
    /// Clamped into 0..=100.
    pub percentage: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuideResponse {
    pub content: String,
    pub language_code: String,
    pub cached: bool,
}

impl From<GuideContent> for GuideResponse {
    fn from(g: GuideContent) -> Self {
        Self {
            content: g.text,
            language_code: g.language_code,
            cached: g.cached,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRecordResponse {
    pub book_title: String,
    pub book_author: String,
    pub last_read_at: DateTime<Utc>,
    pub reading_guide_content: Option<String>,
    pub language_code: String,
    pub progress_percentage: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<ReadingRecord> for ReadingRecordResponse {
    fn from(r: ReadingRecord) -> Self {
        Self {
            book_title: r.book_title,
            book_author: r.book_author,
            last_read_at: r.last_read_at,
            reading_guide_content: r.reading_guide_content,
            language_code: r.language_code,
            progress_percentage: r.progress_percentage,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserBookResponse {
    pub book_title: String,
    pub book_author: String,
    pub published_date: Option<String>,
    pub topic: Option<String>,
    pub is_bookmarked: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserBook> for UserBookResponse {
    fn from(b: UserBook) -> Self {
        Self {
            book_title: b.book_title,
            book_author: b.book_author,
            published_date: b.published_date,
            topic: b.topic,
            is_bookmarked: b.is_bookmarked,
            is_favorite: b.is_favorite,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

fn books_response(books: Vec<UserBook>) -> Json<Vec<UserBookResponse>> {
    Json(books.into_iter().map(Into::into).collect())
}

//=========================================================================================
// History
//=========================================================================================

/// Record that the caller opened a book.
#[utoipa::path(
    post,
    path = "/api/reading/history",
    request_body = HistoryRequest,
    responses(
        (status = 200, description = "Book saved to history", body = UserBookResponse),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn add_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<HistoryRequest>,
) -> Result<Json<UserBookResponse>, ApiError> {
    let book = BookRef::new(user_id, req.book_title, req.book_author)?;
    let details = BookDetails {
        published_date: req.published_date,
        topic: req.topic,
    };
    let row = state.content.upsert_history(&book, details).await?;
    Ok(Json(row.into()))
}

/// Most recently read books first.
#[utoipa::path(
    get,
    path = "/api/reading/history",
    params(
        HistoryQuery,
        ("x-user-id" = String, Header, description = "Verified user id from the auth layer.")
    ),
    responses(
        (status = 200, description = "Reading history", body = [ReadingRecordResponse]),
        (status = 400, description = "Non-positive limit", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    tag = "reading"
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ReadingRecordResponse>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let records = state.content.get_history(&user_id, limit).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

//=========================================================================================
// Guides and translations
//=========================================================================================

/// Return the stored source guide, generating it on first request.
#[utoipa::path(
    post,
    path = "/api/reading/guide",
    request_body = BookRequest,
    responses(
        (status = 200, description = "Source-language reading guide", body = GuideResponse),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody),
        (status = 502, description = "Generation failed", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn guide_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<BookRequest>,
) -> Result<Json<GuideResponse>, ApiError> {
    let book = req.to_book(&user_id)?;
    let guide = state.content.guide_or_generate(&book).await?;
    Ok(Json(guide.into()))
}

/// Store a guide the client already has.
#[utoipa::path(
    put,
    path = "/api/reading/guide",
    request_body = SaveGuideRequest,
    responses(
        (status = 204, description = "Guide stored"),
        (status = 400, description = "Missing fields, empty content or unsupported language", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn save_guide_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<SaveGuideRequest>,
) -> Result<StatusCode, ApiError> {
    let book = BookRef::new(user_id, req.book_title, req.book_author)?;
    let language = req.language_code.as_deref().unwrap_or(SOURCE_LANGUAGE);
    state.content.save_guide(&book, &req.content, language).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The stored guide without generating one.
#[utoipa::path(
    get,
    path = "/api/reading/guide",
    params(
        BookRequest,
        ("x-user-id" = String, Header, description = "Verified user id from the auth layer.")
    ),
    responses(
        (status = 200, description = "Stored reading record", body = ReadingRecordResponse),
        (status = 401, description = "Missing user id", body = ErrorBody),
        (status = 404, description = "No guide stored for this book", body = ErrorBody)
    ),
    tag = "reading"
)]
pub async fn get_guide_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(req): Query<BookRequest>,
) -> Result<Json<ReadingRecordResponse>, ApiError> {
    let book = req.to_book(&user_id)?;
    let record = state
        .content
        .get_guide(&book)
        .await?
        .filter(|r| r.reading_guide_content.is_some())
        .ok_or_else(|| PortError::NotFound(format!("No reading guide for {}", book.title)))?;
    Ok(Json(record.into()))
}

/// Translate the stored source guide.
#[utoipa::path(
    post,
    path = "/api/reading/translate",
    request_body = TranslateRequest,
    responses(
        (status = 200, description = "Translated guide", body = GuideResponse),
        (status = 400, description = "Missing fields or unsupported language", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody),
        (status = 404, description = "Source guide not generated yet", body = ErrorBody),
        (status = 502, description = "Generation failed", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn translate_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<GuideResponse>, ApiError> {
    let book = BookRef::new(user_id, req.book_title, req.book_author)?;
    let guide = state
        .translations
        .translate(&book, &req.target_language_code)
        .await?;
    Ok(Json(guide.into()))
}

//=========================================================================================
// Progress
//=========================================================================================

#[utoipa::path(
    put,
    path = "/api/reading/progress",
    request_body = ProgressRequest,
    responses(
        (status = 204, description = "Progress stored"),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<ProgressRequest>,
) -> Result<StatusCode, ApiError> {
    let book = BookRef::new(user_id, req.book_title, req.book_author)?;
    state.content.update_progress(&book, req.percentage).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Library
//=========================================================================================

#[utoipa::path(
    get,
    path = "/api/reading/books",
    responses(
        (status = 200, description = "Every book the caller has opened", body = [UserBookResponse]),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn books_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<Vec<UserBookResponse>>, ApiError> {
    Ok(books_response(state.content.list_books(&user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/reading/bookmarks",
    responses(
        (status = 200, description = "Bookmarked books", body = [UserBookResponse]),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn bookmarks_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<Vec<UserBookResponse>>, ApiError> {
    Ok(books_response(state.content.list_bookmarks(&user_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/reading/favorites",
    responses(
        (status = 200, description = "Favourite books", body = [UserBookResponse]),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn favorites_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<Vec<UserBookResponse>>, ApiError> {
    Ok(books_response(state.content.list_favorites(&user_id).await?))
}

/// Flip the bookmark flag. A book seen for the first time starts bookmarked.
#[utoipa::path(
    post,
    path = "/api/reading/bookmark",
    request_body = BookRequest,
    responses(
        (status = 200, description = "Updated book", body = UserBookResponse),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn bookmark_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<BookRequest>,
) -> Result<Json<UserBookResponse>, ApiError> {
    let book = req.to_book(&user_id)?;
    Ok(Json(state.content.toggle_bookmark(&book).await?.into()))
}

/// Flip the favourite flag.
#[utoipa::path(
    post,
    path = "/api/reading/favorite",
    request_body = BookRequest,
    responses(
        (status = 200, description = "Updated book", body = UserBookResponse),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "reading"
)]
pub async fn favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<BookRequest>,
) -> Result<Json<UserBookResponse>, ApiError> {
    let book = req.to_book(&user_id)?;
    Ok(Json(state.content.toggle_favorite(&book).await?.into()))
}
